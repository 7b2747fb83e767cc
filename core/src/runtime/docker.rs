//! # Docker Engine
//!
//! Source and sink backed by the Docker Engine API through `bollard`.
//!
//! Every call connects on its own and the client goes away with the call
//! (or, for exports, with the returned archive stream).

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as DockerError;
use bollard::image::{ImportImageOptions, ListImagesOptions};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

use cmover_common::migration::RuntimeKind;
use cmover_common::{MigrationError, Result};

use super::{ArchiveStream, ExportedImage, ImageSink, ImageSource, shell_quote};

const DANGLING_TAG: &str = "<none>:<none>";

fn connect() -> std::result::Result<Docker, DockerError> {
    Docker::connect_with_local_defaults()
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(err, DockerError::DockerResponseServerError { status_code: 404, .. })
}

/// Exports images with `GET /images/{name}/get`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerSource;

impl DockerSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageSource for DockerSource {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Docker
    }

    async fn export(&self, image: &str) -> Result<ExportedImage> {
        let docker: Docker = connect().map_err(|e| MigrationError::export_failed(image, e))?;

        let inspect = docker.inspect_image(image).await.map_err(|e| {
            if is_not_found(&e) {
                MigrationError::ImageNotFound {
                    runtime: RuntimeKind::Docker,
                    image: image.to_string(),
                }
            } else {
                MigrationError::export_failed(image, e)
            }
        })?;

        let id: String = inspect.id.unwrap_or_else(|| image.to_string());
        let size_hint: Option<u64> = inspect.size.and_then(|size| u64::try_from(size).ok());
        debug!(image, id = %id, ?size_hint, "resolved docker image");

        let body = docker
            .export_image(image)
            .map(|chunk| chunk.map_err(io::Error::other));
        let archive = ArchiveStream::new(StreamReader::new(body), size_hint);

        Ok(ExportedImage { id, archive })
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        let list_failed = |e: DockerError| MigrationError::ImageListFailed {
            runtime: RuntimeKind::Docker,
            reason: e.to_string(),
        };

        let docker: Docker = connect().map_err(list_failed)?;
        let summaries = docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(list_failed)?;

        let mut tags: Vec<String> = summaries
            .into_iter()
            .flat_map(|summary| summary.repo_tags)
            .filter(|tag| tag != DANGLING_TAG)
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

/// Loads archives with `POST /images/load`.
///
/// Docker has no namespaces; the namespace argument is ignored and the image
/// keeps the tags recorded in the archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerSink;

impl DockerSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageSink for DockerSink {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Docker
    }

    async fn import(&self, archive: ArchiveStream, reference: &str, _namespace: &str) -> Result<String> {
        let docker: Docker = connect().map_err(|e| MigrationError::import_failed(reference, e))?;

        // The load endpoint wants plain bytes, so a read error ends the body
        // early and is parked here to be reported instead of the daemon's error.
        let read_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&read_error);
        let body = ReaderStream::new(archive).filter_map(move |chunk: io::Result<Bytes>| {
            let slot = Arc::clone(&slot);
            async move {
                match chunk {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        *slot.lock().await = Some(e.to_string());
                        None
                    }
                }
            }
        });

        let mut responses =
            Box::pin(docker.import_image_stream(ImportImageOptions { quiet: true }, body, None));

        let mut identity: Option<String> = None;
        let mut daemon_error: Option<String> = None;
        while let Some(response) = responses.next().await {
            match response {
                Ok(info) => {
                    if let Some(error) = info.error {
                        daemon_error.get_or_insert(error);
                    }
                    if let Some(loaded) = info.stream.as_deref().and_then(loaded_identity) {
                        identity = Some(loaded);
                    }
                }
                Err(e) => {
                    daemon_error.get_or_insert(e.to_string());
                    break;
                }
            }
        }

        if let Some(reason) = read_error.lock().await.take() {
            return Err(MigrationError::export_failed(reference, reason));
        }
        if let Some(reason) = daemon_error {
            return Err(MigrationError::import_failed(reference, reason));
        }

        Ok(identity.unwrap_or_else(|| reference.to_string()))
    }

    fn remote_import_command(&self, archive_path: &str, _reference: &str, _namespace: &str) -> Result<String> {
        Ok(format!("docker load -i {}", shell_quote(archive_path)))
    }
}

/// Pulls the image name out of a `docker load` status line.
fn loaded_identity(line: &str) -> Option<String> {
    let line: &str = line.trim();
    line.strip_prefix("Loaded image: ")
        .or_else(|| line.strip_prefix("Loaded image ID: "))
        .map(|rest| rest.trim().to_string())
        .filter(|rest| !rest.is_empty())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
