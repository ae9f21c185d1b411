// tests/engine_lifecycle.rs

mod common;
use crate::common::{
    ContainerBuilder, FakeRuntime, Harness, Op, RecordingSaver, RuntimeCall, SaveKind,
    TaskBuilder, assert_no_change, container_change, fast_config, take_changes, task_change,
    wait_until,
};

use std::error::Error;
use std::time::Duration;

use taskengine::api::{ContainerStatus, StateChange, TaskStatus};
use taskengine::runtime::ContainerChangeEvent;

type TestResult = Result<(), Box<dyn Error>>;

const QUIET: Duration = Duration::from_millis(100);

#[tokio::test]
async fn task_runs_with_exactly_two_events() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/web").simple("app", "nginx:1.27").build();

    h.engine.add_task(task).await?;

    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(container_change(&changes[0]), Some(("app", "RUNNING".to_string())));
    assert_eq!(task_change(&changes[1]), Some("RUNNING".to_string()));
    assert_no_change(&mut h.events, QUIET).await;

    let calls = h.runtime.calls();
    assert_eq!(calls.len(), 3, "{calls:?}");
    assert_eq!(calls[0], RuntimeCall::Pull("nginx:1.27".to_string()));
    assert!(matches!(&calls[1], RuntimeCall::Create(spec) if spec.image == "nginx:1.27"));
    assert_eq!(calls[2], RuntimeCall::Start("rt-1".to_string()));

    let task = h.task("arn:task/web");
    assert_eq!(task.known_status, TaskStatus::Running);
    assert_eq!(task.sent_status, TaskStatus::Running);
    assert!(h.engine.is_managed("arn:task/web"));
    Ok(())
}

#[tokio::test]
async fn duplicate_and_stale_runtime_events_are_dropped() -> TestResult {
    let runtime = FakeRuntime::new().with_auto_events();
    let mut h = Harness::start_with(fast_config(), runtime, RecordingSaver::new()).await;
    h.engine
        .add_task(TaskBuilder::new("arn:task/dup").simple("app", "nginx").build())
        .await?;
    take_changes(&mut h.events, 2).await;

    let id = h.runtime_id("arn:task/dup", "app").await;
    h.runtime.emit(ContainerChangeEvent::new(&id, ContainerStatus::Running)).await;
    h.runtime.emit(ContainerChangeEvent::new(&id, ContainerStatus::Created)).await;
    h.runtime.emit(ContainerChangeEvent::new("rt-unknown", ContainerStatus::Stopped)).await;

    assert_no_change(&mut h.events, QUIET).await;
    assert_eq!(h.container("arn:task/dup", "app").known_status, ContainerStatus::Running);
    Ok(())
}

#[tokio::test]
async fn stop_then_cleanup_purges_the_task() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/stop").simple("app", "nginx").build();
    h.engine.add_task(task.clone()).await?;
    take_changes(&mut h.events, 2).await;

    let mut stop = task;
    stop.desired_status = TaskStatus::Stopped;
    h.engine.add_task(stop).await?;

    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(container_change(&changes[0]), Some(("app", "STOPPED".to_string())));
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));

    // Late duplicates while the cleanup delay runs are swallowed.
    for _ in 0..5 {
        h.runtime.emit(ContainerChangeEvent::new("rt-1", ContainerStatus::Stopped)).await;
    }

    h.wait_removed("arn:task/stop").await;
    assert!(h.engine.list_tasks().is_empty());
    assert!(!h.engine.is_managed("arn:task/stop"));
    assert_eq!(h.runtime.count(Op::Stop), 1);
    assert_eq!(h.runtime.count(Op::Remove), 1);
    assert_no_change(&mut h.events, QUIET).await;

    // Events for the purged container are dropped by the dispatcher.
    h.runtime.emit(ContainerChangeEvent::new("rt-1", ContainerStatus::Dead)).await;
    assert_no_change(&mut h.events, QUIET).await;
    Ok(())
}

#[tokio::test]
async fn containers_stop_before_their_dependencies() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/ordered")
        .container(ContainerBuilder::new("web", "nginx").after("db").build())
        .simple("db", "postgres")
        .build();
    h.engine.add_task(task.clone()).await?;
    let changes = take_changes(&mut h.events, 3).await;
    assert_eq!(container_change(&changes[0]), Some(("db", "RUNNING".to_string())));
    assert_eq!(container_change(&changes[1]), Some(("web", "RUNNING".to_string())));
    assert_eq!(task_change(&changes[2]), Some("RUNNING".to_string()));

    let db = h.container("arn:task/ordered", "db").runtime_id.unwrap();
    let web = h.container("arn:task/ordered", "web").runtime_id.unwrap();

    let mut stop = task;
    stop.desired_status = TaskStatus::Stopped;
    h.engine.add_task(stop).await?;
    take_changes(&mut h.events, 3).await;

    let stops: Vec<RuntimeCall> = h
        .runtime
        .calls()
        .into_iter()
        .filter(|c| c.op() == Op::Stop)
        .collect();
    assert_eq!(stops, vec![RuntimeCall::Stop(web), RuntimeCall::Stop(db)]);
    Ok(())
}

#[tokio::test]
async fn essential_exit_stops_the_rest_of_the_task() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/essential")
        .simple("db", "postgres")
        .simple("web", "nginx")
        .build();
    h.engine.add_task(task).await?;
    let changes = take_changes(&mut h.events, 3).await;
    assert_eq!(task_change(&changes[2]), Some("RUNNING".to_string()));

    let db = h.runtime_id("arn:task/essential", "db").await;
    h.runtime
        .emit(ContainerChangeEvent::new(&db, ContainerStatus::Stopped).with_exit_code(1))
        .await;

    let changes = take_changes(&mut h.events, 3).await;
    match &changes[0] {
        StateChange::Container(c) => {
            assert_eq!(c.container_name, "db");
            assert_eq!(c.status, ContainerStatus::Stopped);
            assert_eq!(c.exit_code, Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(container_change(&changes[1]), Some(("web", "STOPPED".to_string())));
    assert_eq!(task_change(&changes[2]), Some("STOPPED".to_string()));

    // The exited container is not stopped again.
    assert_eq!(h.runtime.count(Op::Stop), 1);
    Ok(())
}

#[tokio::test]
async fn adding_the_same_task_twice_is_idempotent() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/twice").simple("app", "nginx").build();

    h.engine.add_task(task.clone()).await?;
    h.engine.add_task(task.clone()).await?;
    take_changes(&mut h.events, 2).await;
    h.engine.add_task(task).await?;

    assert_no_change(&mut h.events, QUIET).await;
    assert_eq!(h.runtime.count(Op::Pull), 1);
    assert_eq!(h.runtime.count(Op::Create), 1);
    assert_eq!(h.runtime.count(Op::Start), 1);
    assert_eq!(h.engine.list_tasks().len(), 1);
    Ok(())
}

#[tokio::test]
async fn name_is_saved_before_the_container_is_created() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/labels")
        .family("web", "7")
        .container(ContainerBuilder::new("app", "nginx").label("team", "edge").build())
        .build();
    h.engine.add_task(task).await?;
    take_changes(&mut h.events, 2).await;

    let forced: Vec<_> = h
        .saver
        .saves()
        .into_iter()
        .filter(|(kind, _)| *kind == SaveKind::Force)
        .collect();
    assert_eq!(forced.len(), 1);
    let saved = &forced[0].1.tasks[0];
    let app = saved.container("app").unwrap();
    assert!(app.runtime_id.is_none());
    let saved_name = app.runtime_name.clone().unwrap();

    let spec = &h.runtime.created()[0];
    assert_eq!(spec.name, saved_name);
    assert!(spec.name.starts_with("te-web-7-app-"), "{}", spec.name);
    assert_eq!(spec.labels["io.taskengine.task-arn"], "arn:task/labels");
    assert_eq!(spec.labels["io.taskengine.container-name"], "app");
    assert_eq!(spec.labels["io.taskengine.task-definition-family"], "web");
    assert_eq!(spec.labels["io.taskengine.task-definition-version"], "7");
    assert_eq!(spec.labels["io.taskengine.cluster"], "default");
    assert_eq!(spec.labels["team"], "edge");

    // The runtime id is persisted once create returns.
    wait_until(|| {
        h.saver
            .last()
            .and_then(|s| s.tasks.first().cloned())
            .and_then(|t| t.container("app").and_then(|c| c.runtime_id.clone()))
            .is_some()
    })
    .await;
    Ok(())
}

#[tokio::test]
async fn steady_state_check_catches_a_silent_exit() -> TestResult {
    let mut config = fast_config();
    config.steady_state_verify_interval = Duration::from_millis(30);
    let mut h = Harness::start_with(config, FakeRuntime::new(), RecordingSaver::new()).await;
    h.engine
        .add_task(TaskBuilder::new("arn:task/drift").simple("app", "nginx").build())
        .await?;
    take_changes(&mut h.events, 2).await;

    // Dies without the runtime emitting an event.
    h.runtime.set_status("rt-1", ContainerStatus::Stopped);

    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(container_change(&changes[0]), Some(("app", "STOPPED".to_string())));
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));
    assert!(h.runtime.count(Op::Describe) >= 1);
    assert_eq!(h.runtime.count(Op::Stop), 0);
    Ok(())
}

#[tokio::test]
async fn task_queries_reflect_progress() -> TestResult {
    let mut h = Harness::start().await;
    assert!(h.engine.get_task_by_arn("arn:task/none").is_none());
    assert!(h.engine.task("arn:task/none").is_err());

    h.engine
        .add_task(TaskBuilder::new("arn:task/q").simple("app", "nginx").build())
        .await?;
    take_changes(&mut h.events, 2).await;

    let listed = h.engine.list_tasks();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].arn, "arn:task/q");
    let owner = h.engine.state().container_owner("rt-1").unwrap();
    assert_eq!(owner.task_arn, "arn:task/q");
    assert_eq!(owner.container_name, "app");
    Ok(())
}

#[tokio::test]
async fn state_change_receiver_is_handed_out_once() -> TestResult {
    let h = Harness::start().await;
    assert!(h.engine.state_change_events().is_none());
    Ok(())
}
