//! Recording fakes shared by the unit tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use cmover_common::migration::RuntimeKind;
use cmover_common::network::host::HostSpec;
use cmover_common::{MigrationError, Result};

use crate::network::{CommandOutput, RemoteConnector, RemoteSession};
use crate::progress::{ProgressHandle, ProgressReporter};
use crate::runtime::{ArchiveStream, ExportedImage, ImageSink, ImageSource};

/// Hands out in-memory archives and remembers what was asked for.
pub struct FakeSource {
    kind: RuntimeKind,
    payload: Vec<u8>,
    missing: HashSet<String>,
    panics: HashSet<String>,
    delay: Option<Duration>,
    exports: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    pub fn new(kind: RuntimeKind) -> Self {
        Self {
            kind,
            payload: b"fake image archive".to_vec(),
            missing: HashSet::new(),
            panics: HashSet::new(),
            delay: None,
            exports: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Exporting `image` fails with `ImageNotFound`.
    pub fn failing_on(mut self, image: &str) -> Self {
        self.missing.insert(image.to_string());
        self
    }

    pub fn panicking_on(mut self, image: &str) -> Self {
        self.panics.insert(image.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn exports(&self) -> Vec<String> {
        self.exports.lock().unwrap().clone()
    }

    pub fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for FakeSource {
    fn kind(&self) -> RuntimeKind {
        self.kind
    }

    async fn export(&self, image: &str) -> Result<ExportedImage> {
        self.exports.lock().unwrap().push(image.to_string());

        let now: usize = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.contains(image) {
            panic!("scripted panic exporting {image}");
        }
        if self.missing.contains(image) {
            return Err(MigrationError::ImageNotFound {
                runtime: self.kind,
                image: image.to_string(),
            });
        }

        let size: u64 = self.payload.len() as u64;
        Ok(ExportedImage {
            id: format!("sha256:{image}"),
            archive: ArchiveStream::new(std::io::Cursor::new(self.payload.clone()), Some(size)),
        })
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedImport {
    pub reference: String,
    pub namespace: String,
    pub payload: Vec<u8>,
}

/// Drains archives into memory.
pub struct FakeSink {
    kind: RuntimeKind,
    fail: bool,
    imports: Mutex<Vec<RecordedImport>>,
}

impl FakeSink {
    pub fn new(kind: RuntimeKind) -> Self {
        Self {
            kind,
            fail: false,
            imports: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn imports(&self) -> Vec<RecordedImport> {
        self.imports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSink for FakeSink {
    fn kind(&self) -> RuntimeKind {
        self.kind
    }

    async fn import(&self, mut archive: ArchiveStream, reference: &str, namespace: &str) -> Result<String> {
        let mut payload: Vec<u8> = Vec::new();
        archive
            .read_to_end(&mut payload)
            .await
            .map_err(|e| MigrationError::import_failed(reference, e))?;

        if self.fail {
            return Err(MigrationError::import_failed(reference, "scripted import failure"));
        }

        self.imports.lock().unwrap().push(RecordedImport {
            reference: reference.to_string(),
            namespace: namespace.to_string(),
            payload,
        });
        Ok(format!("sha256:{reference}"))
    }

    fn remote_import_command(&self, archive_path: &str, reference: &str, namespace: &str) -> Result<String> {
        Ok(format!("import {archive_path} as {reference} into {namespace}"))
    }
}

/// Remembers every position it was told about.
#[derive(Clone, Default)]
pub struct RecordingProgress {
    positions: Arc<Mutex<Vec<u64>>>,
    finished: Arc<Mutex<bool>>,
}

impl RecordingProgress {
    pub fn positions(&self) -> Vec<u64> {
        self.positions.lock().unwrap().clone()
    }

    pub fn finished(&self) -> bool {
        *self.finished.lock().unwrap()
    }
}

impl ProgressReporter for RecordingProgress {
    fn begin(&self, _label: &str, _total: Option<u64>) -> Arc<dyn ProgressHandle> {
        Arc::new(self.clone())
    }
}

impl ProgressHandle for RecordingProgress {
    fn set_position(&self, position: u64) {
        self.positions.lock().unwrap().push(position);
    }

    fn finish(&self) {
        *self.finished.lock().unwrap() = true;
    }
}

/// Which steps of a remote session should fail.
#[derive(Debug, Clone, Default)]
pub struct RemoteScript {
    pub fail_connect: bool,
    pub fail_upload: bool,
    /// Commands containing any of these exit with status 1.
    pub fail_commands_containing: Vec<String>,
}

#[derive(Default)]
struct RemoteLog {
    ops: Vec<String>,
    uploaded: Vec<Vec<u8>>,
}

/// Connector whose sessions follow a [`RemoteScript`] and log every call.
pub struct ScriptedConnector {
    script: RemoteScript,
    log: Arc<Mutex<RemoteLog>>,
}

impl ScriptedConnector {
    pub fn new(script: RemoteScript) -> Self {
        Self {
            script,
            log: Arc::new(Mutex::new(RemoteLog::default())),
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.log.lock().unwrap().ops.clone()
    }

    pub fn uploaded(&self) -> Vec<Vec<u8>> {
        self.log.lock().unwrap().uploaded.clone()
    }
}

#[async_trait]
impl RemoteConnector for ScriptedConnector {
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn RemoteSession>> {
        self.log.lock().unwrap().ops.push(format!("connect {host}"));
        if self.script.fail_connect {
            return Err(MigrationError::RemoteConnectFailed {
                host: host.to_string(),
                reason: "scripted connect failure".into(),
            });
        }
        Ok(Box::new(ScriptedSession {
            host: *host,
            script: self.script.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedSession {
    host: HostSpec,
    script: RemoteScript,
    log: Arc<Mutex<RemoteLog>>,
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    fn host(&self) -> &HostSpec {
        &self.host
    }

    async fn upload(&mut self, local: &Path, remote: &str, progress: Arc<dyn ProgressHandle>) -> Result<u64> {
        self.log.lock().unwrap().ops.push(format!("upload {remote}"));
        if self.script.fail_upload {
            return Err(MigrationError::UploadFailed {
                host: self.host.to_string(),
                path: remote.to_string(),
                reason: "scripted upload failure".into(),
            });
        }

        let bytes: Vec<u8> = tokio::fs::read(local).await.map_err(|e| MigrationError::UploadFailed {
            host: self.host.to_string(),
            path: remote.to_string(),
            reason: e.to_string(),
        })?;
        let len: u64 = bytes.len() as u64;
        progress.set_position(len);
        self.log.lock().unwrap().uploaded.push(bytes);
        Ok(len)
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.log.lock().unwrap().ops.push(format!("exec {command}"));
        let fails: bool = self
            .script
            .fail_commands_containing
            .iter()
            .any(|needle| command.contains(needle.as_str()));

        Ok(if fails {
            CommandOutput {
                exit_status: Some(1),
                output: "scripted failure".into(),
            }
        } else {
            CommandOutput {
                exit_status: Some(0),
                output: "ok".into(),
            }
        })
    }

    async fn close(self: Box<Self>) {
        self.log.lock().unwrap().ops.push("close".into());
    }
}
