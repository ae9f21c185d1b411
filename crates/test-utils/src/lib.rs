pub mod builders;
pub mod fake_network;
pub mod fake_runtime;
pub mod recording_saver;

use std::sync::Once;
use std::time::Duration;

use taskengine::api::StateChange;
use taskengine::config::{EngineConfig, Timeouts};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ContainerBuilder, TaskBuilder};
pub use fake_network::{FakeLinkLister, NetworkCall, RecordingNetwork};
pub use fake_runtime::{FakeRuntime, Op, RuntimeCall};
pub use recording_saver::{RecordingSaver, SaveKind};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Engine config with short timeouts and delays.
///
/// Steady-state verification is effectively off; tests exercising it set
/// `steady_state_verify_interval` themselves.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        timeouts: Timeouts {
            pull: Duration::from_secs(2),
            create: Duration::from_secs(2),
            start: Duration::from_secs(2),
            stop: Duration::from_secs(2),
            provision: Duration::from_secs(2),
            remove: Duration::from_secs(2),
            inspect: Duration::from_secs(2),
        },
        steady_state_verify_interval: Duration::from_secs(3600),
        task_cleanup_wait: Duration::from_millis(20),
        transition_retry_delay: Duration::from_millis(10),
        attachment_reconcile_interval: Duration::from_millis(20),
        ..EngineConfig::default()
    }
}

/// Receive the next outbound state change, failing the test after 5 seconds.
pub async fn next_change(rx: &mut mpsc::Receiver<StateChange>) -> StateChange {
    with_timeout(rx.recv())
        .await
        .expect("state change channel closed")
}

/// Collect exactly `n` state changes.
pub async fn take_changes(rx: &mut mpsc::Receiver<StateChange>, n: usize) -> Vec<StateChange> {
    let mut changes = Vec::with_capacity(n);
    for _ in 0..n {
        changes.push(next_change(rx).await);
    }
    changes
}

/// Assert that nothing else arrives within `quiet`.
pub async fn assert_no_change(rx: &mut mpsc::Receiver<StateChange>, quiet: Duration) {
    if let Ok(Some(change)) = tokio::time::timeout(quiet, rx.recv()).await {
        panic!("unexpected state change: {change:?}");
    }
}

/// Poll `cond` every few milliseconds until it holds, for up to 5 seconds.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}
