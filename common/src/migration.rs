//! # Migration Model
//!
//! Request-scoped values describing one migration run: which runtimes are
//! involved, the per-(image, host) tasks, their results and the aggregate report.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::MigrationError;
use crate::network::host::HostSpec;

/// A container runtime the tool knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeKind {
    Docker,
    Containerd,
    Isulad,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Containerd => "containerd",
            RuntimeKind::Isulad => "isulad",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "containerd" => Ok(RuntimeKind::Containerd),
            "isulad" => Ok(RuntimeKind::Isulad),
            other => Err(format!("unknown runtime: {other}")),
        }
    }
}

/// Moves one image to one destination. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTask {
    pub source: RuntimeKind,
    pub destination: RuntimeKind,
    pub image: String,
    pub namespace: String,
    /// `None` means import on this machine.
    pub host: Option<HostSpec>,
}

impl MigrationTask {
    pub fn new(
        source: RuntimeKind,
        destination: RuntimeKind,
        image: impl Into<String>,
        namespace: impl Into<String>,
        host: Option<HostSpec>,
    ) -> Self {
        Self {
            source,
            destination,
            image: image.into(),
            namespace: namespace.into(),
            host,
        }
    }

    pub fn is_local(&self) -> bool {
        self.host.is_none()
    }

    /// Human readable destination, `local` or `address:port`.
    pub fn target(&self) -> String {
        match &self.host {
            Some(host) => host.to_string(),
            None => String::from("local"),
        }
    }
}

impl fmt::Display for MigrationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {} @ {})",
            self.image,
            self.source,
            self.destination,
            self.target()
        )
    }
}

/// Builds one task per (image, host) pair.
///
/// With no hosts every image is migrated locally. Hosts are the outer loop so
/// tasks for the same host sit next to each other.
pub fn build_tasks<S: AsRef<str>>(
    source: RuntimeKind,
    destination: RuntimeKind,
    namespace: &str,
    images: &[S],
    hosts: &[HostSpec],
) -> Vec<MigrationTask> {
    if hosts.is_empty() {
        return images
            .iter()
            .map(|image| MigrationTask::new(source, destination, image.as_ref(), namespace, None))
            .collect();
    }

    hosts
        .iter()
        .flat_map(|host| {
            images.iter().map(move |image| {
                MigrationTask::new(source, destination, image.as_ref(), namespace, Some(*host))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `identity` is what the destination registered the image as.
    Success { identity: String },
    Failure(MigrationError),
}

/// The final word on one task.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub task: MigrationTask,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

impl MigrationResult {
    pub fn new(task: MigrationTask, outcome: Outcome, elapsed: Duration) -> Self {
        Self {
            task,
            outcome,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn error(&self) -> Option<&MigrationError> {
        match &self.outcome {
            Outcome::Failure(err) => Some(err),
            Outcome::Success { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    AllSucceeded,
    FirstFailureEncountered,
}

/// Every result of a run, in completion order.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    results: Vec<MigrationResult>,
    status: ReportStatus,
}

impl AggregateReport {
    pub fn new(results: Vec<MigrationResult>) -> Self {
        let status: ReportStatus = if results.iter().all(MigrationResult::is_success) {
            ReportStatus::AllSucceeded
        } else {
            ReportStatus::FirstFailureEncountered
        };
        Self { results, status }
    }

    pub fn status(&self) -> ReportStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::AllSucceeded
    }

    pub fn results(&self) -> &[MigrationResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &MigrationResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &MigrationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// The earliest failure to complete, if any.
    pub fn first_failure(&self) -> Option<&MigrationError> {
        self.results.iter().find_map(MigrationResult::error)
    }

    pub fn into_results(self) -> Vec<MigrationResult> {
        self.results
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
