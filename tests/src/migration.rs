#![cfg(test)]
use std::collections::HashSet;
use std::sync::Arc;

use cmover_common::config::Config;
use cmover_common::migration::{build_tasks, MigrationTask, Outcome, RuntimeKind};
use cmover_common::network::host::{self, HostSpec};
use cmover_common::MigrationError;
use cmover_core::progress::NoProgress;
use cmover_core::runtime::AdapterRegistry;
use cmover_core::transport::{LocalTransport, RemoteTransport, Transports};
use cmover_core::Coordinator;

use crate::fakes::{FakeFleet, RecordingExporter, RecordingImporter, ARCHIVE};

fn coordinator(
    exporter: Arc<RecordingExporter>,
    importer: Arc<RecordingImporter>,
    fleet: Arc<FakeFleet>,
    staging: &tempfile::TempDir,
) -> Coordinator {
    let mut registry = AdapterRegistry::new();
    registry.register(exporter, importer);

    let remote = RemoteTransport::new(fleet)
        .with_progress(Arc::new(NoProgress))
        .with_staging_dir(Some(staging.path().to_path_buf()));
    Coordinator::new(
        registry,
        Transports::new(Arc::new(LocalTransport::default()), Arc::new(remote)),
    )
}

/*************************************************************
                       Local migrations
**************************************************************/

#[tokio::test]
async fn docker_to_containerd_locally() {
    let staging = tempfile::tempdir().unwrap();
    let exporter = Arc::new(RecordingExporter::knowing(&["alpine:latest"]));
    let importer = Arc::new(RecordingImporter::default());
    let coordinator = coordinator(exporter.clone(), importer.clone(), Arc::default(), &staging);

    let task = MigrationTask::new(RuntimeKind::Docker, RuntimeKind::Containerd, "alpine:latest", "ns1", None);
    let report = coordinator.migrate(vec![task]).await;

    assert!(report.is_success(), "{:?}", report.first_failure());
    assert_eq!(exporter.calls(), vec!["alpine:latest"]);

    let imports = importer.calls();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].reference, "alpine:latest");
    assert_eq!(imports[0].namespace, "ns1");
    assert_eq!(imports[0].bytes, ARCHIVE);

    match &report.results()[0].outcome {
        Outcome::Success { identity } => assert_eq!(identity, "imported:ns1/alpine:latest"),
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_image_fails_only_its_own_task() {
    let staging = tempfile::tempdir().unwrap();
    let exporter = Arc::new(RecordingExporter::knowing(&["alpine:latest", "busybox:1.36"]));
    let importer = Arc::new(RecordingImporter::default());
    let coordinator = coordinator(exporter.clone(), importer.clone(), Arc::default(), &staging);

    let tasks = build_tasks(
        RuntimeKind::Docker,
        RuntimeKind::Containerd,
        "k8s.io",
        &["alpine:latest", "ghost:0", "busybox:1.36"],
        &[],
    );
    let report = coordinator.migrate(tasks).await;

    assert_eq!(report.len(), 3);
    assert_eq!(report.successes().count(), 2);
    assert_eq!(
        report.first_failure(),
        Some(&MigrationError::ImageNotFound {
            runtime: RuntimeKind::Docker,
            image: "ghost:0".into(),
        })
    );
    assert_eq!(importer.calls().len(), 2);
}

/*************************************************************
                      Remote migrations
**************************************************************/

#[tokio::test]
async fn images_times_hosts_cross_product() {
    let staging = tempfile::tempdir().unwrap();
    let exporter = Arc::new(RecordingExporter::knowing(&["alpine:latest", "nginx:1.25"]));
    let importer = Arc::new(RecordingImporter::default());
    let fleet = Arc::new(FakeFleet::default());
    let coordinator = coordinator(exporter.clone(), importer.clone(), fleet.clone(), &staging)
        .with_max_concurrency(Some(2));

    let cfg = Config {
        hosts: host::resolve(&["10.0.0.1-3"]).unwrap(),
        ..Default::default()
    };
    let tasks = cfg.tasks_for(&["alpine:latest", "nginx:1.25"]);
    assert_eq!(tasks.len(), 6);

    let report = coordinator.migrate(tasks).await;
    assert!(report.is_success(), "{:?}", report.first_failure());
    assert_eq!(report.len(), 6);
    assert_eq!(exporter.calls().len(), 6);
    assert!(importer.calls().is_empty(), "remote imports run on the host");

    let log = fleet.log();
    let imported_on: HashSet<HostSpec> = log
        .iter()
        .filter(|(_, op)| op.starts_with("exec ctr --namespace 'k8s.io' images import"))
        .map(|(host, _)| *host)
        .collect();
    assert_eq!(imported_on.len(), 3);
    assert_eq!(log.iter().filter(|(_, op)| op.starts_with("exec rm -f")).count(), 6);
    assert_eq!(log.iter().filter(|(_, op)| op == "close").count(), 6);

    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unreachable_host_does_not_stop_the_others() {
    let staging = tempfile::tempdir().unwrap();
    let broken = HostSpec::new("10.0.0.2".parse().unwrap(), 22);
    let fleet = Arc::new(FakeFleet {
        broken: Some(broken),
        ..Default::default()
    });
    let exporter = Arc::new(RecordingExporter::knowing(&["alpine:latest"]));
    let coordinator = coordinator(exporter, Arc::default(), fleet, &staging);

    let hosts: Vec<HostSpec> = host::resolve(&["10.0.0.1-10.0.0.3"]).unwrap();
    let tasks = build_tasks(RuntimeKind::Docker, RuntimeKind::Containerd, "k8s.io", &["alpine:latest"], &hosts);

    let err = coordinator.migrate_fail_visible(tasks).await.unwrap_err();
    assert_eq!(
        err,
        MigrationError::RemoteConnectFailed {
            host: "10.0.0.2:22".into(),
            reason: "connection refused".into(),
        }
    );
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn shipped_registry_rejects_unknown_pairs() {
    let cfg = Config {
        source: RuntimeKind::Isulad,
        destination: RuntimeKind::Docker,
        ..Default::default()
    };
    let coordinator = Coordinator::from_config(&cfg, Arc::new(NoProgress));

    let report = coordinator.migrate(cfg.tasks_for(&["alpine:latest"])).await;
    assert_eq!(
        report.first_failure(),
        Some(&MigrationError::UnsupportedDestination {
            from: RuntimeKind::Isulad,
            to: RuntimeKind::Docker,
        })
    );
}
