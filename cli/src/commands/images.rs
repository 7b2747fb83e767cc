//! The `images` subcommand: builds the run's [`Config`], expands the task list
//! and hands it to the coordinator.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use tracing::{error, info, warn};

use cmover_common::config::{Config, DispatchMode, SshCredentials};
use cmover_common::migration::MigrationTask;
use cmover_common::network::host::{self, HostSpec};
use cmover_core::Coordinator;
use cmover_core::progress::{NoProgress, ProgressReporter};

use super::ImagesArgs;
use crate::settings::{self, Settings};
use crate::terminal::print;
use crate::terminal::progress::BarReporter;

pub async fn images(args: ImagesArgs, settings: Settings) -> anyhow::Result<ExitCode> {
    let cfg: Config = build_config(&args, settings)?;

    let progress: Arc<dyn ProgressReporter> = if cfg.show_progress {
        Arc::new(BarReporter)
    } else {
        Arc::new(NoProgress)
    };
    let coordinator = Coordinator::from_config(&cfg, progress);

    let mut images: Vec<String> = args.images.clone();
    if let Some(path) = &args.image_list {
        images.extend(read_image_list(path)?);
    }
    if args.all {
        let listed: Vec<String> = coordinator
            .list_images(cfg.source, cfg.destination)
            .await
            .context("cannot list source images")?;
        info!("found {} images in {}", listed.len(), cfg.source);
        images.extend(listed);
    }
    dedup_preserving_order(&mut images);

    if images.is_empty() {
        bail!("nothing to migrate: name images, pass --image-list or use --all");
    }

    let tasks: Vec<MigrationTask> = cfg.tasks_for(&images);
    print::header(&format!("migrating {} -> {}", cfg.source, cfg.destination));
    info!(
        "{} images to {} target(s), {} tasks",
        images.len(),
        cfg.hosts.len().max(1),
        tasks.len()
    );

    let start_time: Instant = Instant::now();
    match cfg.mode {
        DispatchMode::DrainAll => {
            let report = coordinator.migrate(tasks).await;
            print::report(&report, start_time.elapsed());
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        DispatchMode::FailVisible => match coordinator.migrate_fail_visible(tasks).await {
            Ok(()) => {
                info!("all migrations finished in {:.2}s", start_time.elapsed().as_secs_f64());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!("{e}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

/// Flags over settings over defaults.
fn build_config(args: &ImagesArgs, settings: Settings) -> anyhow::Result<Config> {
    let defaults = Config::default();

    let host_tokens: &[String] = if args.hosts.is_empty() { &settings.nodes } else { &args.hosts };
    let hosts: Vec<HostSpec> = host::resolve(host_tokens).context("invalid host list")?;
    if !host_tokens.is_empty() && hosts.is_empty() {
        warn!("host list expanded to nothing, migrating locally");
    }

    let ssh = SshCredentials {
        user: args
            .username
            .clone()
            .or(settings.user)
            .unwrap_or_else(|| String::from("root")),
        password: args.password.clone().or(settings.password),
        private_key: args
            .private_key
            .clone()
            .or(settings.private_key)
            .or_else(settings::default_private_key),
        key_passphrase: args.key_passphrase.clone().or(settings.key_passphrase),
    };

    // Enumerating everything is always reported in full.
    let mode: DispatchMode = if args.first_error && !args.all {
        DispatchMode::FailVisible
    } else {
        DispatchMode::DrainAll
    };

    Ok(Config {
        source: args.source,
        destination: args.destination,
        namespace: args
            .namespace
            .clone()
            .or(settings.namespace)
            .unwrap_or(defaults.namespace),
        hosts,
        ssh,
        max_concurrency: args.concurrency.or(settings.concurrency),
        mode,
        containerd_address: args
            .containerd_address
            .clone()
            .or(settings.containerd_address)
            .unwrap_or(defaults.containerd_address),
        remote_dir: args
            .remote_dir
            .clone()
            .or(settings.remote_dir)
            .unwrap_or(defaults.remote_dir),
        staging_dir: args.staging_dir.clone().or(settings.staging_dir),
        show_progress: !args.no_progress,
    })
}

fn read_image_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let content: String = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read image list {}", path.display()))?;
    Ok(parse_image_list(&content))
}

/// One reference per line; blank lines and `#` comments are skipped.
fn parse_image_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_preserving_order(images: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    images.retain(|image| seen.insert(image.clone()));
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
