//! # containerd
//!
//! Source and sink driven through the `ctr` client.
//!
//! Archives flow over the child's stdin/stdout, so nothing touches the disk.
//! Each call spawns its own `ctr` process which is killed if the call (or the
//! archive it returned) is dropped early.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Output, Stdio};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::debug;

use cmover_common::migration::RuntimeKind;
use cmover_common::{MigrationError, Result};

use super::{ArchiveStream, ExportedImage, ImageSink, ImageSource, shell_quote};

const CTR: &str = "ctr";
const DEFAULT_REGISTRY: &str = "docker.io";
const OFFICIAL_REPO: &str = "library";

/// Builds `ctr` invocations against one containerd socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctr {
    program: OsString,
    program_args: Vec<OsString>,
    address: PathBuf,
}

impl Ctr {
    pub fn new(address: impl AsRef<Path>) -> Self {
        Self {
            program: OsString::from(CTR),
            program_args: Vec::new(),
            address: address.as_ref().to_path_buf(),
        }
    }

    /// Runs `program args...` in place of `ctr`; the usual `ctr` arguments
    /// follow `args`.
    pub fn with_program<P, I, S>(mut self, program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn address(&self) -> &Path {
        &self.address
    }

    fn command(&self, namespace: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.program_args)
            .arg("--address")
            .arg(&self.address)
            .arg("--namespace")
            .arg(namespace)
            .args(args)
            .kill_on_drop(true);
        cmd
    }

    async fn output(&self, namespace: &str, args: &[&str]) -> io::Result<Output> {
        self.command(namespace, args)
            .stdin(Stdio::null())
            .output()
            .await
    }

    async fn list(&self, namespace: &str) -> std::result::Result<Vec<String>, String> {
        let output: Output = self
            .output(namespace, &list_args())
            .await
            .map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(failure_text(output.status, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("sha256:"))
            .map(str::to_string)
            .collect())
    }
}

fn list_args() -> [&'static str; 3] {
    ["images", "ls", "-q"]
}

fn import_args(index_name: &str) -> [&str; 5] {
    ["images", "import", "--index-name", index_name, "-"]
}

fn export_args(reference: &str) -> [&str; 4] {
    ["images", "export", "-", reference]
}

fn failure_text(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr: &str = stderr.trim();
    if stderr.is_empty() {
        format!("ctr exited with {status}")
    } else {
        format!("ctr exited with {status}: {stderr}")
    }
}

/// Expands a short reference the way the docker CLI does.
///
/// `alpine` becomes `docker.io/library/alpine:latest`.
fn normalize_reference(reference: &str) -> String {
    let reference: &str = reference.trim();
    let mut full: String = match reference.split_once('/') {
        None => format!("{DEFAULT_REGISTRY}/{OFFICIAL_REPO}/{reference}"),
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            reference.to_string()
        }
        Some(_) => format!("{DEFAULT_REGISTRY}/{reference}"),
    };

    let name: &str = full.rsplit('/').next().unwrap_or_default();
    if !name.contains(':') && !full.contains('@') {
        full.push_str(":latest");
    }
    full
}

pub(crate) fn matches_reference(candidate: &str, wanted: &str) -> bool {
    candidate == wanted || normalize_reference(candidate) == normalize_reference(wanted)
}

/// Exit status of the export child and everything it wrote to stderr.
type ExportExit = Pin<Box<dyn Future<Output = io::Result<(ExitStatus, Vec<u8>)>> + Send>>;

/// Streams `ctr images export` output and surfaces the exit status at EOF.
struct ChildArchive {
    stdout: ChildStdout,
    exit: Option<ExportExit>,
}

impl AsyncRead for ChildArchive {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before: usize = buf.filled().len();
        match Pin::new(&mut self.stdout).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before && buf.remaining() > 0 => {}
            other => return other,
        }

        let Some(exit) = self.exit.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let (status, stderr) = match exit.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(exited) => exited?,
        };
        self.exit = None;

        if status.success() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Ready(Err(io::Error::other(failure_text(status, &stderr))))
        }
    }
}

/// Exports images from one containerd namespace.
#[derive(Debug, Clone)]
pub struct ContainerdSource {
    ctr: Ctr,
    namespace: String,
}

impl ContainerdSource {
    pub fn new(ctr: Ctr, namespace: impl Into<String>) -> Self {
        Self {
            ctr,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl ImageSource for ContainerdSource {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Containerd
    }

    async fn export(&self, image: &str) -> Result<ExportedImage> {
        let known: Vec<String> = self
            .ctr
            .list(&self.namespace)
            .await
            .map_err(|reason| MigrationError::export_failed(image, reason))?;

        let Some(resolved) = known.into_iter().find(|name| matches_reference(name, image)) else {
            return Err(MigrationError::ImageNotFound {
                runtime: RuntimeKind::Containerd,
                image: image.to_string(),
            });
        };
        debug!(image, resolved = %resolved, "resolved containerd image");

        let mut child = self
            .ctr
            .command(&self.namespace, &export_args(&resolved))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MigrationError::export_failed(image, e))?;

        let stdout: ChildStdout = child
            .stdout
            .take()
            .ok_or_else(|| MigrationError::export_failed(image, "ctr stdout was not captured"))?;
        let mut stderr: ChildStderr = child
            .stderr
            .take()
            .ok_or_else(|| MigrationError::export_failed(image, "ctr stderr was not captured"))?;
        let exit: ExportExit = Box::pin(async move {
            let mut text: Vec<u8> = Vec::new();
            let (status, _) = tokio::join!(child.wait(), stderr.read_to_end(&mut text));
            status.map(|status| (status, text))
        });

        let archive = ArchiveStream::new(
            ChildArchive {
                stdout,
                exit: Some(exit),
            },
            None,
        );
        Ok(ExportedImage {
            id: resolved,
            archive,
        })
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> =
            self.ctr
                .list(&self.namespace)
                .await
                .map_err(|reason| MigrationError::ImageListFailed {
                    runtime: RuntimeKind::Containerd,
                    reason,
                })?;
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Imports archives with `ctr images import`, keeping the index under the
/// requested reference.
#[derive(Debug, Clone)]
pub struct ContainerdSink {
    ctr: Ctr,
}

impl ContainerdSink {
    pub fn new(ctr: Ctr) -> Self {
        Self { ctr }
    }
}

#[async_trait]
impl ImageSink for ContainerdSink {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Containerd
    }

    async fn import(&self, mut archive: ArchiveStream, reference: &str, namespace: &str) -> Result<String> {
        // CRI looks images up by their fully qualified name.
        let index_name: String = normalize_reference(reference);
        let mut child = self
            .ctr
            .command(namespace, &import_args(&index_name))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MigrationError::import_failed(reference, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MigrationError::import_failed(reference, "ctr stdin was not captured"))?;

        let feed = async move {
            let copied = tokio::io::copy(&mut archive, &mut stdin).await;
            drop(stdin);
            copied
        };
        let (copied, output) = tokio::join!(feed, child.wait_with_output());

        let output: Output = output.map_err(|e| MigrationError::import_failed(reference, e))?;
        if !output.status.success() {
            return Err(MigrationError::import_failed(
                reference,
                failure_text(output.status, &output.stderr),
            ));
        }
        let bytes: u64 = copied.map_err(|e| MigrationError::import_failed(reference, e))?;
        debug!(reference, namespace, bytes, "ctr import finished");

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(unpacked_digest(&stdout).unwrap_or_else(|| reference.to_string()))
    }

    fn remote_import_command(&self, archive_path: &str, _reference: &str, namespace: &str) -> Result<String> {
        Ok(format!(
            "{CTR} --namespace {} images import {}",
            shell_quote(namespace),
            shell_quote(archive_path)
        ))
    }
}

/// Finds the digest in `unpacking NAME (sha256:...)...done`.
fn unpacked_digest(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let start: usize = line.find("(sha256:")? + 1;
        let len: usize = line[start..].find(')')?;
        Some(line[start..start + len].to_string())
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
