use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cmover_common::Result;
use cmover_common::migration::MigrationTask;

use super::TransportStrategy;
use crate::progress::{NoProgress, ProgressHandle, ProgressReporter};
use crate::runtime::{ExportedImage, RuntimeAdapter};

/// Export piped into import, no intermediate file.
#[derive(Clone)]
pub struct LocalTransport {
    progress: Arc<dyn ProgressReporter>,
}

impl LocalTransport {
    pub fn new(progress: Arc<dyn ProgressReporter>) -> Self {
        Self { progress }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(Arc::new(NoProgress))
    }
}

#[async_trait]
impl TransportStrategy for LocalTransport {
    async fn transfer(&self, task: &MigrationTask, adapter: &RuntimeAdapter) -> Result<String> {
        let ExportedImage { id, archive } = adapter.export(&task.image).await?;
        debug!(image = %task.image, id = %id, "export opened, piping into import");

        let bar: Arc<dyn ProgressHandle> = self.progress.begin(&task.image, archive.size_hint());
        let archive = archive.observe(Arc::clone(&bar));

        // The archive is consumed by the import, so it is closed on both paths.
        let imported = adapter.import(archive, &task.image, &task.namespace).await;
        bar.finish();
        imported
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSink, FakeSource, RecordingProgress};
    use cmover_common::MigrationError;
    use cmover_common::migration::RuntimeKind;

    fn task(image: &str) -> MigrationTask {
        MigrationTask::new(RuntimeKind::Docker, RuntimeKind::Containerd, image, "ns1", None)
    }

    #[tokio::test]
    async fn pipes_export_into_import() {
        let source = Arc::new(FakeSource::new(RuntimeKind::Docker).with_payload(b"layers".to_vec()));
        let sink = Arc::new(FakeSink::new(RuntimeKind::Containerd));
        let adapter = RuntimeAdapter::new(source.clone(), sink.clone());

        let progress = Arc::new(RecordingProgress::default());
        let transport = LocalTransport::new(progress.clone());
        let identity: String = transport.transfer(&task("alpine:latest"), &adapter).await.unwrap();

        assert_eq!(identity, "sha256:alpine:latest");
        assert_eq!(source.exports(), vec!["alpine:latest"]);

        let imports = sink.imports();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].reference, "alpine:latest");
        assert_eq!(imports[0].namespace, "ns1");
        assert_eq!(imports[0].payload, b"layers");

        assert_eq!(progress.positions().last(), Some(&6));
        assert!(progress.finished());
    }

    #[tokio::test]
    async fn export_failure_never_imports() {
        let source = Arc::new(FakeSource::new(RuntimeKind::Docker).failing_on("ghost:1"));
        let sink = Arc::new(FakeSink::new(RuntimeKind::Containerd));
        let adapter = RuntimeAdapter::new(source.clone(), sink.clone());

        let err = LocalTransport::default()
            .transfer(&task("ghost:1"), &adapter)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::ImageNotFound { .. }));
        assert_eq!(source.exports(), vec!["ghost:1"]);
        assert!(sink.imports().is_empty());
    }

    #[tokio::test]
    async fn import_failure_is_reported() {
        let source = Arc::new(FakeSource::new(RuntimeKind::Docker));
        let sink = Arc::new(FakeSink::new(RuntimeKind::Containerd).failing());
        let adapter = RuntimeAdapter::new(source, sink);

        let err = LocalTransport::default()
            .transfer(&task("alpine:latest"), &adapter)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::ImportFailed { .. }));
    }
}
