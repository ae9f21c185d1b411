// tests/engine_failures.rs

mod common;
use crate::common::{
    ContainerBuilder, FakeRuntime, Harness, Op, RecordingSaver, TaskBuilder, assert_no_change,
    container_change, fast_config, next_change, take_changes, task_change,
};

use std::error::Error;
use std::time::Duration;

use taskengine::api::{ContainerStatus, StateChange, TaskStatus};
use taskengine::runtime::{ContainerChangeEvent, RuntimeError};

type TestResult = Result<(), Box<dyn Error>>;

const QUIET: Duration = Duration::from_millis(100);

async fn running(h: &mut Harness, arn: &str) -> TestResult {
    h.engine
        .add_task(TaskBuilder::new(arn).simple("app", "nginx").build())
        .await?;
    take_changes(&mut h.events, 2).await;
    Ok(())
}

async fn request_stop(h: &Harness, arn: &str) -> TestResult {
    let mut task = TaskBuilder::new(arn).simple("app", "nginx").build();
    task.desired_status = TaskStatus::Stopped;
    h.engine.add_task(task).await?;
    Ok(())
}

#[tokio::test]
async fn circular_task_is_stopped_but_queryable() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/circle")
        .container(ContainerBuilder::new("a", "img").after("b").build())
        .container(ContainerBuilder::new("b", "img").after("a").build())
        .build();

    h.engine.add_task(task.clone()).await?;

    match next_change(&mut h.events).await {
        StateChange::Task(t) => {
            assert_eq!(t.task_arn, "arn:task/circle");
            assert_eq!(t.status, TaskStatus::Stopped);
            assert!(t.reason.unwrap().contains("cycle"));
        }
        other => panic!("unexpected {other:?}"),
    }

    let stored = h.task("arn:task/circle");
    assert_eq!(stored.known_status, TaskStatus::Stopped);
    assert_eq!(stored.desired_status, TaskStatus::Stopped);
    assert!(!h.engine.is_managed("arn:task/circle"));
    assert!(h.runtime.calls().is_empty());

    // Re-sending it changes nothing.
    h.engine.add_task(task).await?;
    assert_no_change(&mut h.events, QUIET).await;
    Ok(())
}

#[tokio::test]
async fn unknown_dependency_rejects_the_task() -> TestResult {
    let mut h = Harness::start().await;
    let task = TaskBuilder::new("arn:task/orphan")
        .container(ContainerBuilder::new("web", "nginx").link("missing").build())
        .build();

    h.engine.add_task(task).await?;
    let change = next_change(&mut h.events).await;
    assert_eq!(task_change(&change), Some("STOPPED".to_string()));
    assert!(h.runtime.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn start_failure_stops_the_task_with_a_reason() -> TestResult {
    let mut h = Harness::start().await;
    h.runtime.fail_next(Op::Start, RuntimeError::fatal("exec format error"));

    h.engine
        .add_task(TaskBuilder::new("arn:task/broken").simple("app", "nginx").build())
        .await?;

    let changes = take_changes(&mut h.events, 2).await;
    match &changes[0] {
        StateChange::Container(c) => {
            assert_eq!(c.status, ContainerStatus::Stopped);
            assert!(c.reason.as_deref().unwrap().contains("exec format error"));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &changes[1] {
        StateChange::Task(t) => {
            assert_eq!(t.status, TaskStatus::Stopped);
            assert!(t.reason.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }

    // Never started, so never stopped; removed during cleanup.
    assert_eq!(h.runtime.count(Op::Start), 1);
    assert_eq!(h.runtime.count(Op::Stop), 0);
    h.wait_removed("arn:task/broken").await;
    assert_eq!(h.runtime.count(Op::Remove), 1);
    Ok(())
}

#[tokio::test]
async fn transient_pull_failure_is_retried() -> TestResult {
    let mut h = Harness::start().await;
    h.runtime.fail_times(Op::Pull, RuntimeError::transient("registry timeout"), 2);

    running(&mut h, "arn:task/flaky-pull").await?;
    assert_eq!(h.runtime.count(Op::Pull), 3);
    Ok(())
}

#[tokio::test]
async fn pull_giving_up_stops_the_task() -> TestResult {
    let mut h = Harness::start().await;
    h.runtime.fail_times(Op::Pull, RuntimeError::transient("registry down"), 10);

    h.engine
        .add_task(TaskBuilder::new("arn:task/no-image").simple("app", "nginx").build())
        .await?;

    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(container_change(&changes[0]), Some(("app", "STOPPED".to_string())));
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));
    assert_eq!(h.runtime.count(Op::Pull), 3);
    assert_eq!(h.runtime.count(Op::Create), 0);
    Ok(())
}

#[tokio::test]
async fn transient_stop_failure_is_retried_until_it_works() -> TestResult {
    let mut h = Harness::start().await;
    running(&mut h, "arn:task/flaky-stop").await?;
    h.runtime.fail_times(Op::Stop, RuntimeError::transient("daemon busy"), 4);

    request_stop(&h, "arn:task/flaky-stop").await?;

    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));
    // Stops are not bounded by the attempt budget.
    assert_eq!(h.runtime.count(Op::Stop), 5);
    Ok(())
}

#[tokio::test]
async fn stop_of_not_running_container_is_confirmed_not_retried() -> TestResult {
    let mut h = Harness::start().await;
    running(&mut h, "arn:task/gone").await?;
    h.runtime.set_status("rt-1", ContainerStatus::Stopped);
    h.runtime.fail_next(Op::Stop, RuntimeError::not_running("container already stopped"));

    request_stop(&h, "arn:task/gone").await?;

    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(container_change(&changes[0]), Some(("app", "STOPPED".to_string())));
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));
    assert_eq!(h.runtime.count(Op::Stop), 1);
    assert_eq!(h.runtime.count(Op::Describe), 1);
    Ok(())
}

#[tokio::test]
async fn unconfirmed_stop_waits_for_the_runtime_event() -> TestResult {
    let mut h = Harness::start().await;
    running(&mut h, "arn:task/stubborn").await?;
    h.runtime.fail_next(Op::Stop, RuntimeError::not_running("container is restarting"));

    request_stop(&h, "arn:task/stubborn").await?;

    // The runtime still reports it running: status is not forced forward.
    assert_no_change(&mut h.events, QUIET).await;
    assert_eq!(h.runtime.count(Op::Stop), 1);
    assert_eq!(h.container("arn:task/stubborn", "app").known_status, ContainerStatus::Running);

    h.runtime
        .emit(ContainerChangeEvent::new("rt-1", ContainerStatus::Stopped).with_exit_code(137))
        .await;
    let changes = take_changes(&mut h.events, 2).await;
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));
    assert_eq!(h.runtime.count(Op::Stop), 1);
    Ok(())
}

#[tokio::test]
async fn timed_out_start_is_abandoned_and_retried() -> TestResult {
    let mut config = fast_config();
    config.timeouts.start = Duration::from_millis(50);
    let mut h = Harness::start_with(config, FakeRuntime::new(), RecordingSaver::new()).await;
    h.runtime.delay(Op::Start, Duration::from_millis(200));

    h.engine
        .add_task(TaskBuilder::new("arn:task/slow").simple("app", "nginx").build())
        .await?;

    // Every attempt times out; the container is given up on.
    let changes = take_changes(&mut h.events, 2).await;
    match &changes[0] {
        StateChange::Container(c) => {
            assert_eq!(c.status, ContainerStatus::Stopped);
            assert!(c.reason.as_deref().unwrap().contains("did not complete"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(task_change(&changes[1]), Some("STOPPED".to_string()));
    assert_eq!(h.runtime.count(Op::Start), 3);
    Ok(())
}
