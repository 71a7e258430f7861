//! Registry integration tests against real listeners

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use api_models::{FileContent, FileSet};
use deployd::app::state::AppState;
use deployd::deploy::fsm::DeploymentStatus;
use deployd::filesys::dir::Dir;
use tokio_test::{assert_err, assert_ok};

use crate::common::{fetch, options, spawn_worker, wait_until_settled, Harness};

fn files(entries: &[(&str, &str)]) -> FileSet {
    entries
        .iter()
        .map(|(name, content)| (name.to_string(), FileContent::from(*content)))
        .collect()
}

#[tokio::test]
async fn test_record_is_listed_before_provisioning() {
    let temp = tempfile::tempdir().unwrap();
    let options = options(temp.path(), 21000);

    // Worker not started yet, so nothing can leave `deploying`
    let (state, jobs) = AppState::init(&options).await.unwrap();
    let registry = state.registry.clone();

    let created = registry.create("site", None, None).await.unwrap();
    assert_eq!(created.status, DeploymentStatus::Deploying);
    assert_eq!(created.port, 21000);
    assert_eq!(created.url, "http://localhost:21000/");

    let listed = registry.get_all().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[&created.id].status, DeploymentStatus::Deploying);

    let (shutdown_tx, worker) = spawn_worker(registry.clone(), jobs);
    let settled = wait_until_settled(&registry, &created.id).await;
    assert_eq!(settled.status, DeploymentStatus::Live);

    let _ = shutdown_tx.send(());
    worker.await.unwrap();
    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_default_page_without_files() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21100)).await;
    let registry = harness.registry();

    let created = registry
        .create("site", Some(FileSet::new()), None)
        .await
        .unwrap();
    let live = wait_until_settled(registry, &created.id).await;

    assert_eq!(live.status, DeploymentStatus::Live);
    assert!(live.deployed_at.is_some());
    assert!(live.error.is_none());

    let root = Dir::new(temp.path().join("deployments").join(&created.id));
    let on_disk = root.list_files_recursive().await.unwrap();
    assert_eq!(on_disk, vec![PathBuf::from("index.html")]);

    let body = fetch(live.port, "/").await.text().await.unwrap();
    assert!(body.contains("site"));

    harness.stop().await;
}

#[tokio::test]
async fn test_serves_supplied_files() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21200)).await;
    let registry = harness.registry();

    let mut payload = files(&[("index.html", "<h1>hi</h1>"), ("css/site.css", "h1 {}")]);
    payload.insert("img/dot.bin".into(), FileContent::from(vec![0u8, 1, 2, 254]));

    let created = registry
        .create("site", Some(payload), Some("octo/site".into()))
        .await
        .unwrap();
    let live = wait_until_settled(registry, &created.id).await;
    assert_eq!(live.status, DeploymentStatus::Live);
    assert_eq!(live.github_repo.as_deref(), Some("octo/site"));

    let index = fetch(live.port, "/").await;
    assert!(index.status().is_success());
    assert_eq!(index.bytes().await.unwrap().as_ref(), b"<h1>hi</h1>");

    let css = fetch(live.port, "/css/site.css").await.text().await.unwrap();
    assert_eq!(css, "h1 {}");

    let binary = fetch(live.port, "/img/dot.bin").await.bytes().await.unwrap();
    assert_eq!(binary.as_ref(), &[0u8, 1, 2, 254]);

    let missing = fetch(live.port, "/nope.html").await;
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    harness.stop().await;
}

#[tokio::test]
async fn test_deployments_are_isolated() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21300)).await;
    let registry = harness.registry();

    let a = registry
        .create("a", Some(files(&[("index.html", "A"), ("only-a.txt", "a")])), None)
        .await
        .unwrap();
    let b = registry
        .create("b", Some(files(&[("index.html", "B")])), None)
        .await
        .unwrap();
    let a = wait_until_settled(registry, &a.id).await;
    let b = wait_until_settled(registry, &b.id).await;

    assert_eq!(fetch(a.port, "/").await.text().await.unwrap(), "A");
    assert_eq!(fetch(b.port, "/").await.text().await.unwrap(), "B");
    assert_eq!(
        fetch(b.port, "/only-a.txt").await.status(),
        reqwest::StatusCode::NOT_FOUND
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_provisioning_failure_marks_failed() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21400)).await;
    let registry = harness.registry();

    // "page" becomes a file, so "page/index.html" cannot be written
    let created = registry
        .create(
            "broken",
            Some(files(&[("page", "x"), ("page/index.html", "y")])),
            None,
        )
        .await
        .unwrap();
    let failed = wait_until_settled(registry, &created.id).await;

    assert_eq!(failed.status, DeploymentStatus::Failed);
    assert!(!failed.error.as_deref().unwrap_or_default().is_empty());
    assert!(failed.deployed_at.is_none());
    assert!(!registry.supervisor().is_serving(&created.id).await);
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", failed.port))
        .await
        .is_err());

    // Other deployments are unaffected
    let next = registry.create("fine", None, None).await.unwrap();
    assert!(next.port > failed.port);
    let next = wait_until_settled(registry, &next.id).await;
    assert_eq!(next.status, DeploymentStatus::Live);

    harness.stop().await;
}

#[tokio::test]
async fn test_bind_failure_marks_failed() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21500)).await;
    let registry = harness.registry();

    let _squatter = std::net::TcpListener::bind(("127.0.0.1", 21500)).unwrap();

    let created = registry.create("site", None, None).await.unwrap();
    assert_eq!(created.port, 21500);
    let failed = wait_until_settled(registry, &created.id).await;

    assert_eq!(failed.status, DeploymentStatus::Failed);
    assert!(failed.error.unwrap().contains("could not bind port 21500"));

    harness.stop().await;
}

#[tokio::test]
async fn test_provisioning_timeout_marks_failed() {
    let temp = tempfile::tempdir().unwrap();
    let mut options = options(temp.path(), 21600);
    options.deployments.provision_timeout = Duration::ZERO;
    let harness = Harness::start(&options).await;
    let registry = harness.registry();

    let created = registry.create("slow", None, None).await.unwrap();
    let failed = wait_until_settled(registry, &created.id).await;

    assert_eq!(failed.status, DeploymentStatus::Failed);
    assert!(failed.error.unwrap().starts_with("Timed out"));

    harness.stop().await;
}

#[tokio::test]
async fn test_concurrent_creates_get_unique_ids_and_ports() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21700)).await;
    let registry = harness.registry();

    let creations = (0..20).map(|i| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.create(&format!("p{}", i), None, None).await })
    });
    let created: Vec<_> = futures::future::join_all(creations)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let ids: HashSet<_> = created.iter().map(|d| d.id.clone()).collect();
    let ports: HashSet<_> = created.iter().map(|d| d.port).collect();
    assert_eq!(ids.len(), 20);
    assert_eq!(ports, (21700..21720).collect::<HashSet<u16>>());

    for d in &created {
        let settled = wait_until_settled(registry, &d.id).await;
        assert_eq!(settled.status, DeploymentStatus::Live);
    }

    harness.stop().await;
}

#[tokio::test]
async fn test_ports_strictly_increase_in_creation_order() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21800)).await;
    let registry = harness.registry();

    let d1 = registry.create("one", None, None).await.unwrap();
    let d2 = registry.create("two", None, None).await.unwrap();
    let d3 = registry.create("three", None, None).await.unwrap();

    assert!(d1.port < d2.port && d2.port < d3.port);

    for d in [&d1, &d2, &d3] {
        wait_until_settled(registry, &d.id).await;
    }
    harness.stop().await;
}

#[tokio::test]
async fn test_validation_errors_create_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 21900)).await;
    let registry = harness.registry();

    let err = assert_err!(registry.create("   ", None, None).await);
    assert!(err.is_validation());

    let err = assert_err!(
        registry
            .create("site", Some(files(&[("../escape.html", "x")])), None)
            .await
    );
    assert!(err.is_validation());

    let err = assert_err!(
        registry
            .create("site", Some(files(&[("/etc/passwd", "x")])), None)
            .await
    );
    assert!(err.is_validation());

    assert!(registry.get_all().await.is_empty());
    assert!(!temp.path().join("escape.html").exists());

    // No port was consumed by the rejected requests
    let ok = assert_ok!(registry.create("site", None, None).await);
    assert_eq!(ok.port, 21900);
    wait_until_settled(registry, &ok.id).await;

    harness.stop().await;
}

#[tokio::test]
async fn test_closed_queue_fails_deployment() {
    let temp = tempfile::tempdir().unwrap();
    let (state, jobs) = AppState::init(&options(temp.path(), 22000)).await.unwrap();
    drop(jobs);

    let created = state.registry.create("orphan", None, None).await.unwrap();
    assert_eq!(created.status, DeploymentStatus::Failed);
    assert!(created.error.unwrap().contains("queue is closed"));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let temp = tempfile::tempdir().unwrap();
    let options = options(temp.path(), 22100);

    let harness = Harness::start(&options).await;
    let registry = harness.registry();
    let live = registry.create("kept", None, None).await.unwrap();
    let broken = registry
        .create("broken", Some(files(&[("a", "x"), ("a/b", "y")])), None)
        .await
        .unwrap();
    wait_until_settled(registry, &live.id).await;
    wait_until_settled(registry, &broken.id).await;
    let before = registry.get_all().await;
    harness.stop().await;

    let (state, _jobs) = AppState::init(&options).await.unwrap();
    let after = state.registry.get_all().await;
    assert_eq!(after, before);

    // Listeners are not restarted unless asked to
    assert!(!state.supervisor.is_serving(&live.id).await);

    // Ports keep increasing across the restart
    let next = state.registry.create("next", None, None).await.unwrap();
    assert_eq!(next.port, 22102);
}

#[tokio::test]
async fn test_restore_listeners_after_restart() {
    let temp = tempfile::tempdir().unwrap();
    let options = options(temp.path(), 22200);

    let harness = Harness::start(&options).await;
    let created = harness
        .registry()
        .create("again", Some(files(&[("index.html", "back")])), None)
        .await
        .unwrap();
    wait_until_settled(harness.registry(), &created.id).await;
    harness.stop().await;

    let harness = Harness::start(&options).await;
    assert_eq!(harness.registry().restore_listeners().await, 1);
    assert_eq!(fetch(created.port, "/").await.text().await.unwrap(), "back");
    harness.stop().await;
}

#[tokio::test]
async fn test_last_port_is_not_reused_after_restart() {
    let temp = tempfile::tempdir().unwrap();
    let options = options(temp.path(), u16::MAX);

    let (state, _jobs) = AppState::init(&options).await.unwrap();
    let first = assert_ok!(state.registry.create("one", None, None).await);
    assert_eq!(first.port, u16::MAX);
    drop(state);

    let (state, _jobs) = AppState::init(&options).await.unwrap();
    let err = assert_err!(state.registry.create("two", None, None).await);
    assert!(err.is_validation());
    assert_eq!(state.registry.get_all().await.len(), 1);
}
