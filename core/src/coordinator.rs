//! # Coordinator
//!
//! Fans a set of [`MigrationTask`]s out into independent tokio tasks and
//! gathers what each one reports.
//!
//! Workers push their [`MigrationResult`] into an unbounded channel; the
//! coordinator drains it once every worker has finished. A failing task never
//! stops its siblings. The optional concurrency limit is a [`Semaphore`] each
//! worker holds a permit of while it runs.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};

use cmover_common::config::Config;
use cmover_common::migration::{
    AggregateReport, MigrationResult, MigrationTask, Outcome, RuntimeKind,
};
use cmover_common::{MigrationError, Result};

use crate::network::SshConnector;
use crate::progress::ProgressReporter;
use crate::runtime::AdapterRegistry;
use crate::transport::{LocalTransport, RemoteTransport, Transports};

pub struct Coordinator {
    registry: Arc<AdapterRegistry>,
    transports: Transports,
    max_concurrency: Option<usize>,
}

impl Coordinator {
    pub fn new(registry: AdapterRegistry, transports: Transports) -> Self {
        Self {
            registry: Arc::new(registry),
            transports,
            max_concurrency: None,
        }
    }

    /// `None` or `Some(0)` means one worker per task with no limit. Larger
    /// limits are capped at [`Semaphore::MAX_PERMITS`].
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit
            .filter(|n| *n > 0)
            .map(|n| n.min(Semaphore::MAX_PERMITS));
        self
    }

    /// Wires the shipped runtimes, SSH and the given progress sink.
    pub fn from_config(cfg: &Config, progress: Arc<dyn ProgressReporter>) -> Self {
        let connector = Arc::new(SshConnector::new(cfg.ssh.clone()));
        let local = LocalTransport::new(Arc::clone(&progress));
        let remote = RemoteTransport::new(connector)
            .with_progress(progress)
            .with_remote_dir(cfg.remote_dir.clone())
            .with_staging_dir(cfg.staging_dir.clone());

        Self::new(
            AdapterRegistry::with_defaults(cfg),
            Transports::new(Arc::new(local), Arc::new(remote)),
        )
        .with_max_concurrency(cfg.max_concurrency)
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }

    /// Every tagged image the source side of `from -> to` holds.
    pub async fn list_images(&self, from: RuntimeKind, to: RuntimeKind) -> Result<Vec<String>> {
        self.registry.get(from, to)?.list_images().await
    }

    /// Drain-all mode: runs every task and reports each one.
    ///
    /// The report always holds exactly one result per task, in completion
    /// order.
    pub async fn migrate(&self, tasks: Vec<MigrationTask>) -> AggregateReport {
        let total: usize = tasks.len();
        info!(tasks = total, limit = ?self.max_concurrency, "dispatching migrations");

        let (tx, mut rx) = mpsc::unbounded_channel::<MigrationResult>();
        let limit: Option<Arc<Semaphore>> = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let mut workers: Vec<(MigrationTask, JoinHandle<()>)> = Vec::with_capacity(total);
        for task in tasks {
            let registry = Arc::clone(&self.registry);
            let transports = self.transports.clone();
            let limit = limit.clone();
            let tx = tx.clone();
            let span = info_span!("migrate", image = %task.image, target = %task.target());
            let worker_task = task.clone();

            let handle = tokio::spawn(
                async move {
                    let _permit = match limit {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    let result = execute(&registry, &transports, worker_task).await;
                    // The receiver outlives every worker.
                    let _ = tx.send(result);
                }
                .instrument(span),
            );
            workers.push((task, handle));
        }

        for (task, handle) in workers {
            if let Err(e) = handle.await {
                error!(image = %task.image, target = %task.target(), "worker died: {e}");
                let reason: String = e.to_string();
                let aborted = MigrationError::TaskAborted {
                    image: task.image.clone(),
                    reason,
                };
                let _ = tx.send(MigrationResult::new(task, Outcome::Failure(aborted), Default::default()));
            }
        }
        drop(tx);

        let mut results: Vec<MigrationResult> = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        let report = AggregateReport::new(results);
        info!(
            succeeded = report.successes().count(),
            failed = report.failures().count(),
            "migrations finished"
        );
        report
    }

    /// Fail-visible mode: runs every task, then surfaces only the first
    /// failure to complete.
    pub async fn migrate_fail_visible(&self, tasks: Vec<MigrationTask>) -> Result<()> {
        match self.migrate(tasks).await.first_failure() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

async fn execute(registry: &AdapterRegistry, transports: &Transports, task: MigrationTask) -> MigrationResult {
    let started: Instant = Instant::now();

    let transferred: Result<String> = match registry.get(task.source, task.destination) {
        Ok(adapter) => transports.select(&task).transfer(&task, adapter).await,
        Err(e) => Err(e),
    };
    let elapsed = started.elapsed();

    let outcome: Outcome = match transferred {
        Ok(identity) => {
            info!(elapsed = ?elapsed, identity = %identity, "migrated");
            Outcome::Success { identity }
        }
        Err(e) => {
            error!(elapsed = ?elapsed, "migration failed: {e}");
            Outcome::Failure(e)
        }
    };
    debug!(task = %task, "result recorded");
    MigrationResult::new(task, outcome, elapsed)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
