//! The central **abstraction** over container runtimes.
//!
//! A runtime contributes up to two capabilities: an [`ImageSource`] that
//! exports images as archive streams, and an [`ImageSink`] that imports them.
//! A [`RuntimeAdapter`] pairs one of each, and the [`AdapterRegistry`] maps
//! `(source, destination)` kinds to the adapter that handles them.
//!
//! **Architectural Note:**
//! Transports and the coordinator only ever talk to [`RuntimeAdapter`]. Adding a
//! runtime pair means registering a new source/sink combination, not editing
//! the transports.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use cmover_common::config::Config;
use cmover_common::migration::RuntimeKind;
use cmover_common::{MigrationError, Result};

use crate::progress::{ProgressHandle, ProgressReader};

pub mod containerd;
pub mod docker;
mod unsupported;

pub use containerd::{ContainerdSink, ContainerdSource, Ctr};
pub use docker::{DockerSink, DockerSource};
pub use unsupported::UnimplementedSink;

/// A single-pass serialized image.
///
/// Owned by whoever holds it; dropping it closes the underlying export
/// (HTTP body, child process pipe, file...).
pub struct ArchiveStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    size_hint: Option<u64>,
}

impl ArchiveStream {
    /// A `size_hint` of `Some(0)` is treated as unknown.
    pub fn new<R>(reader: R, size_hint: Option<u64>) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            size_hint: size_hint.filter(|size| *size > 0),
        }
    }

    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    /// Reports bytes read through this stream to `handle`.
    pub fn observe(self, handle: Arc<dyn ProgressHandle>) -> Self {
        let size_hint: Option<u64> = self.size_hint;
        let reader = ProgressReader::new(self.reader, size_hint.unwrap_or(0), handle);
        Self {
            reader: Box::pin(reader),
            size_hint,
        }
    }
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveStream")
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/// What an export hands back.
#[derive(Debug)]
pub struct ExportedImage {
    /// Identity of the image in the source runtime (id or resolved reference).
    pub id: String,
    pub archive: ArchiveStream,
}

/// The "export" half of a runtime.
#[async_trait]
pub trait ImageSource: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// Resolves `image` and opens an archive stream for it.
    ///
    /// Fails with [`MigrationError::ImageNotFound`] when the runtime does not
    /// know the reference.
    async fn export(&self, image: &str) -> Result<ExportedImage>;

    /// Every tagged image the runtime holds.
    async fn list_images(&self) -> Result<Vec<String>>;
}

/// The "import" half of a runtime.
#[async_trait]
pub trait ImageSink: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// Consumes `archive` and registers it as `reference` in `namespace`.
    ///
    /// Returns the identity the runtime registered the image under.
    async fn import(&self, archive: ArchiveStream, reference: &str, namespace: &str) -> Result<String>;

    /// Shell command importing an archive already sitting at `archive_path`
    /// on a remote host.
    fn remote_import_command(&self, archive_path: &str, reference: &str, namespace: &str) -> Result<String>;
}

/// One source/destination pair.
#[derive(Clone)]
pub struct RuntimeAdapter {
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn ImageSink>,
}

impl RuntimeAdapter {
    pub fn new(source: Arc<dyn ImageSource>, sink: Arc<dyn ImageSink>) -> Self {
        Self { source, sink }
    }

    pub fn source_kind(&self) -> RuntimeKind {
        self.source.kind()
    }

    pub fn destination_kind(&self) -> RuntimeKind {
        self.sink.kind()
    }

    pub async fn export(&self, image: &str) -> Result<ExportedImage> {
        self.source.export(image).await
    }

    pub async fn import(&self, archive: ArchiveStream, reference: &str, namespace: &str) -> Result<String> {
        self.sink.import(archive, reference, namespace).await
    }

    pub async fn list_images(&self) -> Result<Vec<String>> {
        self.source.list_images().await
    }

    pub fn remote_import_command(&self, archive_path: &str, reference: &str, namespace: &str) -> Result<String> {
        self.sink.remote_import_command(archive_path, reference, namespace)
    }
}

impl fmt::Debug for RuntimeAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeAdapter({} -> {})", self.source_kind(), self.destination_kind())
    }
}

/// Maps `(source, destination)` to the adapter moving images between them.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(RuntimeKind, RuntimeKind), RuntimeAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every pair the tool ships with.
    ///
    /// * docker -> containerd
    /// * containerd -> docker
    /// * docker/containerd -> isulad (named, not implemented)
    pub fn with_defaults(cfg: &Config) -> Self {
        let ctr: Ctr = Ctr::new(&cfg.containerd_address);
        let docker_source: Arc<dyn ImageSource> = Arc::new(DockerSource::new());
        let docker_sink: Arc<dyn ImageSink> = Arc::new(DockerSink::new());
        let containerd_source: Arc<dyn ImageSource> =
            Arc::new(ContainerdSource::new(ctr.clone(), cfg.namespace.clone()));
        let containerd_sink: Arc<dyn ImageSink> = Arc::new(ContainerdSink::new(ctr));

        let mut registry = Self::new();
        registry.register(Arc::clone(&docker_source), containerd_sink);
        registry.register(Arc::clone(&containerd_source), docker_sink);
        registry.register(
            docker_source,
            Arc::new(UnimplementedSink::new(RuntimeKind::Docker, RuntimeKind::Isulad)),
        );
        registry.register(
            containerd_source,
            Arc::new(UnimplementedSink::new(RuntimeKind::Containerd, RuntimeKind::Isulad)),
        );
        registry
    }

    /// Replaces any adapter already registered for the same pair.
    pub fn register(&mut self, source: Arc<dyn ImageSource>, sink: Arc<dyn ImageSink>) {
        let key = (source.kind(), sink.kind());
        self.adapters.insert(key, RuntimeAdapter::new(source, sink));
    }

    pub fn get(&self, from: RuntimeKind, to: RuntimeKind) -> Result<&RuntimeAdapter> {
        self.adapters
            .get(&(from, to))
            .ok_or(MigrationError::UnsupportedDestination { from, to })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (RuntimeKind, RuntimeKind)> + '_ {
        self.adapters.keys().copied()
    }
}

/// Single-quotes `value` for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
