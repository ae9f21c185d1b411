// tests/engine_network.rs

mod common;
use crate::common::{
    Harness, NetworkCall, Op, RuntimeCall, TaskBuilder, container_change, take_changes,
    task_change, wait_until,
};

use std::error::Error;

use taskengine::api::{ContainerKind, ContainerStatus, NETWORK_SETUP_CONTAINER_NAME, TaskStatus};

type TestResult = Result<(), Box<dyn Error>>;

const MAC: &str = "0A:1B:2C:3D:4E:5F";

#[tokio::test]
async fn attached_task_runs_behind_a_network_setup_container() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/eni").simple("app", "nginx").eni(MAC).build();
    h.engine.add_task(task).await?;

    // The setup container is never reported.
    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(container_change(&changes[0]), Some(("app", "RUNNING".to_string())));
    assert_eq!(task_change(&changes[1]), Some("RUNNING".to_string()));

    let stored = h.task("arn:task/eni");
    let pause = stored.network_setup_container().unwrap();
    assert_eq!(pause.name, NETWORK_SETUP_CONTAINER_NAME);
    assert_eq!(pause.kind, ContainerKind::NetworkSetup);
    assert_eq!(pause.known_status, ContainerStatus::ResourcesProvisioned);

    // Only the user image is pulled.
    assert_eq!(h.runtime.pulled_images(), vec!["nginx".to_string()]);

    let created = h.runtime.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].image, "taskengine/pause:latest");
    assert_eq!(created[0].network_mode.as_deref(), Some("none"));
    assert_eq!(created[1].image, "nginx");
    assert_eq!(created[1].network_mode.as_deref(), Some("container:rt-1"));

    // The namespace is configured from the inspected setup container.
    let calls = h.network.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        NetworkCall::Setup(cfg) => {
            assert_eq!(cfg.task_arn, "arn:task/eni");
            assert_eq!(cfg.container_id, "rt-1");
            assert_eq!(cfg.container_pid, 4242);
            assert_eq!(cfg.mac_address, "0a:1b:2c:3d:4e:5f");
            assert_eq!(cfg.ipv4_addresses, vec!["10.0.0.10".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn network_is_torn_down_after_the_task_stops() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/eni-stop")
        .simple("app", "nginx")
        .eni(MAC)
        .build();
    h.engine.add_task(task.clone()).await?;
    take_changes(&mut h.events, 2).await;

    let mut stop = task;
    stop.desired_status = TaskStatus::Stopped;
    h.engine.add_task(stop).await?;
    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));

    // The app stops before the container holding its namespace.
    let stops: Vec<_> = h
        .runtime
        .calls()
        .into_iter()
        .filter(|c| c.op() == Op::Stop)
        .collect();
    assert_eq!(
        stops,
        vec![
            RuntimeCall::Stop("rt-2".to_string()),
            RuntimeCall::Stop("rt-1".to_string()),
        ]
    );

    h.wait_removed("arn:task/eni-stop").await;
    let kinds: Vec<&str> = h
        .network
        .calls()
        .iter()
        .map(|c| match c {
            NetworkCall::Setup(_) => "setup",
            NetworkCall::Cleanup(_) => "cleanup",
            NetworkCall::Release(_) => "release",
        })
        .collect();
    assert_eq!(kinds, vec!["setup", "cleanup", "release"]);
    assert_eq!(h.runtime.count(Op::Remove), 2);
    Ok(())
}

#[tokio::test]
async fn failed_namespace_setup_is_retried() -> TestResult {
    let mut h = Harness::start().await;
    h.network.fail_next_setup("plugin not ready");

    let task = TaskBuilder::new("arn:task/eni-retry")
        .simple("app", "nginx")
        .eni(MAC)
        .build();
    h.engine.add_task(task).await?;
    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(task_change(&changes[1]), Some("RUNNING".to_string()));

    wait_until(|| {
        h.network
            .calls()
            .iter()
            .filter(|c| matches!(c, NetworkCall::Setup(_)))
            .count()
            == 2
    })
    .await;
    Ok(())
}

#[tokio::test]
async fn attachment_is_indexed_by_mac() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/eni-index")
        .simple("app", "nginx")
        .eni(MAC)
        .build();
    h.engine.add_task(task).await?;
    take_changes(&mut h.events, 2).await;

    let state = h.engine.state();
    let attachment = state.attachment_by_mac("0a:1b:2c:3d:4e:5f").unwrap();
    assert_eq!(attachment.task_arn, "arn:task/eni-index");
    assert!(!attachment.sent);
    assert!(state.attachment_by_mac(MAC).is_some());
    Ok(())
}
