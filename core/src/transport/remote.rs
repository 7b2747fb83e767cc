//! Remote delivery: `Staging -> Uploading -> RemoteImporting -> Cleanup -> Done`.
//!
//! The staged archive is a [`NamedTempFile`], so it is removed however the
//! task ends. Once connected, cleanup and disconnect run on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use cmover_common::config::DEFAULT_REMOTE_DIR;
use cmover_common::migration::MigrationTask;
use cmover_common::network::host::HostSpec;
use cmover_common::{MigrationError, Result};

use super::TransportStrategy;
use crate::network::{RemoteConnector, RemoteSession, run_checked};
use crate::progress::{NoProgress, ProgressHandle, ProgressReporter};
use crate::runtime::{ExportedImage, RuntimeAdapter, shell_quote};

const STAGE_PREFIX: &str = "cmover-";
const STAGE_SUFFIX: &str = ".tar";

#[derive(Clone)]
pub struct RemoteTransport {
    connector: Arc<dyn RemoteConnector>,
    progress: Arc<dyn ProgressReporter>,
    remote_dir: String,
    staging_dir: Option<PathBuf>,
}

impl RemoteTransport {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            progress: Arc::new(NoProgress),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            staging_dir: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_remote_dir(mut self, dir: impl Into<String>) -> Self {
        self.remote_dir = dir.into();
        self
    }

    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    fn remote_path(&self, image: &str) -> String {
        let suffix: u32 = rand::rng().random();
        let dir: &str = self.remote_dir.trim_end_matches('/');
        format!("{dir}/{STAGE_PREFIX}{}-{suffix:08x}{STAGE_SUFFIX}", file_stem(image))
    }

    /// Drains the export into a local temporary file.
    async fn stage(&self, task: &MigrationTask, adapter: &RuntimeAdapter) -> Result<NamedTempFile> {
        let ExportedImage { id, archive } = adapter.export(&task.image).await?;
        let stage_failed = |reason: String| MigrationError::export_failed(&task.image, reason);

        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGE_PREFIX).suffix(STAGE_SUFFIX);
        let staged: NamedTempFile = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| stage_failed(format!("cannot create staging file: {e}")))?;

        let handle = staged
            .reopen()
            .map_err(|e| stage_failed(format!("cannot open staging file: {e}")))?;
        let mut file = File::from_std(handle);

        let bar: Arc<dyn ProgressHandle> = self
            .progress
            .begin(&format!("{} (staging)", task.image), archive.size_hint());
        let mut archive = archive.observe(Arc::clone(&bar));

        let copied = tokio::io::copy(&mut archive, &mut file).await;
        bar.finish();
        let bytes: u64 = copied.map_err(|e| stage_failed(e.to_string()))?;
        file.flush().await.map_err(|e| stage_failed(e.to_string()))?;

        debug!(image = %task.image, %id, path = %staged.path().display(), bytes, "archive staged");
        Ok(staged)
    }

    async fn upload_and_import(
        &self,
        session: &mut dyn RemoteSession,
        staged: &Path,
        remote_path: &str,
        import_command: &str,
        task: &MigrationTask,
    ) -> Result<String> {
        let host: HostSpec = *session.host();
        let bar: Arc<dyn ProgressHandle> = self.progress.begin(&format!("{} -> {host}", task.image), None);
        let uploaded = session.upload(staged, remote_path, Arc::clone(&bar)).await;
        bar.finish();
        let bytes: u64 = uploaded?;
        debug!(image = %task.image, %host, remote_path, bytes, "archive uploaded");

        let output: String = run_checked(session, import_command).await?;
        debug!(image = %task.image, %host, output = %output.trim(), "remote import finished");
        Ok(task.image.clone())
    }

    async fn cleanup(&self, session: &mut dyn RemoteSession, remote_path: &str) -> Result<()> {
        let command: String = format!("rm -f {}", shell_quote(remote_path));
        run_checked(session, &command)
            .await
            .map(|_| ())
            .map_err(|e| MigrationError::CleanupWarning {
                host: session.host().to_string(),
                path: remote_path.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Keeps a file name portable whatever the reference looks like.
fn file_stem(image: &str) -> String {
    let id: &str = image.strip_prefix("sha256:").unwrap_or(image);
    let stem: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .take(32)
        .collect();
    if stem.is_empty() { String::from("image") } else { stem }
}

#[async_trait]
impl TransportStrategy for RemoteTransport {
    async fn transfer(&self, task: &MigrationTask, adapter: &RuntimeAdapter) -> Result<String> {
        let Some(host) = task.host else {
            return Err(MigrationError::RemoteConnectFailed {
                host: task.target(),
                reason: "task has no destination host".to_string(),
            });
        };

        // The sink may refuse the pair; find out before exporting anything.
        let remote_path: String = self.remote_path(&task.image);
        let import_command: String =
            adapter.remote_import_command(&remote_path, &task.image, &task.namespace)?;
        let staged: NamedTempFile = self.stage(task, adapter).await?;

        let mut session: Box<dyn RemoteSession> = self.connector.connect(&host).await?;
        info!(image = %task.image, %host, "connected, uploading archive");

        let outcome = self
            .upload_and_import(session.as_mut(), staged.path(), &remote_path, &import_command, task)
            .await;

        if let Err(warning) = self.cleanup(session.as_mut(), &remote_path).await {
            warn!(image = %task.image, %host, "{warning}");
        }
        session.close().await;
        drop(staged);

        outcome
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
