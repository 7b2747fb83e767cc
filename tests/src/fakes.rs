#![cfg(test)]
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use cmover_common::migration::RuntimeKind;
use cmover_common::network::host::HostSpec;
use cmover_common::{MigrationError, Result};
use cmover_core::network::{CommandOutput, RemoteConnector, RemoteSession};
use cmover_core::progress::ProgressHandle;
use cmover_core::runtime::{ArchiveStream, ExportedImage, ImageSink, ImageSource};

pub const ARCHIVE: &[u8] = b"layer.tar manifest.json repositories";

/// Docker-like exporter that records every reference it was asked for.
#[derive(Default)]
pub struct RecordingExporter {
    pub calls: Mutex<Vec<String>>,
    pub known: Vec<String>,
}

impl RecordingExporter {
    pub fn knowing(images: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            known: images.iter().map(|i| i.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for RecordingExporter {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Docker
    }

    async fn export(&self, image: &str) -> Result<ExportedImage> {
        self.calls.lock().unwrap().push(image.to_string());
        if !self.known.iter().any(|known| known == image) {
            return Err(MigrationError::ImageNotFound {
                runtime: RuntimeKind::Docker,
                image: image.to_string(),
            });
        }
        Ok(ExportedImage {
            id: format!("sha256:{:x}", image.len()),
            archive: ArchiveStream::new(ARCHIVE, Some(ARCHIVE.len() as u64)),
        })
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        Ok(self.known.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCall {
    pub reference: String,
    pub namespace: String,
    pub bytes: Vec<u8>,
}

/// containerd-like importer that drains and records every archive.
#[derive(Default)]
pub struct RecordingImporter {
    pub calls: Mutex<Vec<ImportCall>>,
}

impl RecordingImporter {
    pub fn calls(&self) -> Vec<ImportCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSink for RecordingImporter {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Containerd
    }

    async fn import(&self, mut archive: ArchiveStream, reference: &str, namespace: &str) -> Result<String> {
        let mut bytes: Vec<u8> = Vec::new();
        archive
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| MigrationError::import_failed(reference, e))?;
        self.calls.lock().unwrap().push(ImportCall {
            reference: reference.to_string(),
            namespace: namespace.to_string(),
            bytes,
        });
        Ok(format!("imported:{namespace}/{reference}"))
    }

    fn remote_import_command(&self, archive_path: &str, _reference: &str, namespace: &str) -> Result<String> {
        Ok(format!("ctr --namespace '{namespace}' images import '{archive_path}'"))
    }
}

/// Remote hosts that accept every upload and command, except on `broken`.
#[derive(Default)]
pub struct FakeFleet {
    pub broken: Option<HostSpec>,
    pub log: Arc<Mutex<Vec<(HostSpec, String)>>>,
}

impl FakeFleet {
    pub fn log(&self) -> Vec<(HostSpec, String)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteConnector for FakeFleet {
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn RemoteSession>> {
        if self.broken == Some(*host) {
            return Err(MigrationError::RemoteConnectFailed {
                host: host.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(Box::new(FakeNode {
            host: *host,
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeNode {
    host: HostSpec,
    log: Arc<Mutex<Vec<(HostSpec, String)>>>,
}

#[async_trait]
impl RemoteSession for FakeNode {
    fn host(&self) -> &HostSpec {
        &self.host
    }

    async fn upload(&mut self, local: &Path, remote: &str, progress: Arc<dyn ProgressHandle>) -> Result<u64> {
        let bytes: Vec<u8> = tokio::fs::read(local).await.map_err(|e| MigrationError::UploadFailed {
            host: self.host.to_string(),
            path: remote.to_string(),
            reason: e.to_string(),
        })?;
        assert_eq!(bytes, ARCHIVE, "staged archive must match the export byte-for-byte");
        progress.set_position(bytes.len() as u64);
        self.log.lock().unwrap().push((self.host, format!("upload {remote}")));
        Ok(bytes.len() as u64)
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.log.lock().unwrap().push((self.host, format!("exec {command}")));
        Ok(CommandOutput {
            exit_status: Some(0),
            output: String::new(),
        })
    }

    async fn close(self: Box<Self>) {
        self.log.lock().unwrap().push((self.host, "close".to_string()));
    }
}
