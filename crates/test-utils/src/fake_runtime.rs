use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use taskengine::api::ContainerStatus;
use taskengine::runtime::{
    BoxFuture, ContainerChangeEvent, ContainerDetails, ContainerMetadata, ContainerRuntime,
    CreateSpec, RuntimeError, RuntimeResult,
};
use tokio::sync::mpsc;

/// Runtime operations that can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Pull,
    Create,
    Start,
    Stop,
    Remove,
    Inspect,
    Describe,
}

/// One call the engine made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Pull(String),
    Create(CreateSpec),
    Start(String),
    Stop(String),
    Remove(String),
    Inspect(String),
    Describe(String),
}

impl RuntimeCall {
    pub fn op(&self) -> Op {
        match self {
            RuntimeCall::Pull(_) => Op::Pull,
            RuntimeCall::Create(_) => Op::Create,
            RuntimeCall::Start(_) => Op::Start,
            RuntimeCall::Stop(_) => Op::Stop,
            RuntimeCall::Remove(_) => Op::Remove,
            RuntimeCall::Inspect(_) => Op::Inspect,
            RuntimeCall::Describe(_) => Op::Describe,
        }
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RuntimeCall>,
    errors: HashMap<Op, VecDeque<RuntimeError>>,
    delays: HashMap<Op, Duration>,
    statuses: HashMap<String, ContainerStatus>,
    next_id: u64,
    version: Option<RuntimeResult<String>>,
    subscribe_error: Option<RuntimeError>,
    events_tx: Option<mpsc::Sender<ContainerChangeEvent>>,
    auto_events: bool,
}

/// A scriptable in-memory container runtime.
///
/// - records every call in order
/// - hands out ids `rt-1`, `rt-2`, ... on create
/// - fails the next call of an operation with a queued error
/// - delays operations to widen race windows
/// - pushes events into the subscribed stream on demand, or after every
///   successful start/stop with `auto_events`
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
    active_pulls: Arc<AtomicUsize>,
    max_active_pulls: Arc<AtomicUsize>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Also report successful starts and stops on the event stream.
    pub fn with_auto_events(self) -> Self {
        self.lock().auto_events = true;
        self
    }

    pub fn set_version(&self, version: &str) {
        self.lock().version = Some(Ok(version.to_string()));
    }

    pub fn fail_version(&self, err: RuntimeError) {
        self.lock().version = Some(Err(err));
    }

    pub fn fail_subscribe(&self, err: RuntimeError) {
        self.lock().subscribe_error = Some(err);
    }

    /// Queue an error for the next call of `op`.
    pub fn fail_next(&self, op: Op, err: RuntimeError) {
        self.lock().errors.entry(op).or_default().push_back(err);
    }

    /// Queue `times` copies of an error for `op`.
    pub fn fail_times(&self, op: Op, err: RuntimeError, times: usize) {
        for _ in 0..times {
            self.fail_next(op, err.clone());
        }
    }

    pub fn delay(&self, op: Op, by: Duration) {
        self.lock().delays.insert(op, by);
    }

    /// Set what `describe_status` reports for `id`.
    pub fn set_status(&self, id: &str, status: ContainerStatus) {
        self.lock().statuses.insert(id.to_string(), status);
    }

    /// Push an event into the subscribed stream.
    pub async fn emit(&self, event: ContainerChangeEvent) {
        let tx = self.lock().events_tx.clone();
        if let Some(tx) = tx {
            tx.send(event).await.expect("event stream closed");
        } else {
            panic!("emit before the engine subscribed");
        }
    }

    /// Close the event stream as a daemon restart would.
    pub fn close_events(&self) {
        self.lock().events_tx = None;
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn created(&self) -> Vec<CreateSpec> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Create(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Pull(image) => Some(image.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of pulls that were in progress at once.
    pub fn max_concurrent_pulls(&self) -> usize {
        self.max_active_pulls.load(Ordering::SeqCst)
    }

    /// Record the call, then apply the scripted delay and error.
    async fn enter(&self, call: RuntimeCall) -> RuntimeResult<()> {
        let op = call.op();
        let (delay, error) = {
            let mut state = self.lock();
            state.calls.push(call);
            let delay = state.delays.get(&op).copied();
            let error = state.errors.get_mut(&op).and_then(VecDeque::pop_front);
            (delay, error)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn transition(&self, id: &str, status: ContainerStatus) {
        let (tx, auto) = {
            let mut state = self.lock();
            state.statuses.insert(id.to_string(), status);
            (state.events_tx.clone(), state.auto_events)
        };
        if let (Some(tx), true) = (tx, auto) {
            let _ = tx.send(ContainerChangeEvent::new(id, status)).await;
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    fn pull_image<'a>(&'a self, image: &'a str) -> BoxFuture<'a, RuntimeResult<()>> {
        Box::pin(async move {
            let now = self.active_pulls.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active_pulls.fetch_max(now, Ordering::SeqCst);
            let result = self.enter(RuntimeCall::Pull(image.to_string())).await;
            self.active_pulls.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn create_container<'a>(&'a self, spec: &'a CreateSpec) -> BoxFuture<'a, RuntimeResult<String>> {
        Box::pin(async move {
            self.enter(RuntimeCall::Create(spec.clone())).await?;
            let id = {
                let mut state = self.lock();
                state.next_id += 1;
                let id = format!("rt-{}", state.next_id);
                state.statuses.insert(id.clone(), ContainerStatus::Created);
                id
            };
            Ok(id)
        })
    }

    fn start_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<ContainerMetadata>> {
        Box::pin(async move {
            self.enter(RuntimeCall::Start(id.to_string())).await?;
            self.transition(id, ContainerStatus::Running).await;
            Ok(ContainerMetadata {
                runtime_id: Some(id.to_string()),
                ..ContainerMetadata::default()
            })
        })
    }

    fn stop_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<ContainerMetadata>> {
        Box::pin(async move {
            self.enter(RuntimeCall::Stop(id.to_string())).await?;
            self.transition(id, ContainerStatus::Stopped).await;
            Ok(ContainerMetadata {
                runtime_id: Some(id.to_string()),
                exit_code: Some(0),
                error: None,
            })
        })
    }

    fn remove_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<()>> {
        Box::pin(async move {
            self.enter(RuntimeCall::Remove(id.to_string())).await?;
            self.lock().statuses.remove(id);
            Ok(())
        })
    }

    fn inspect_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<ContainerDetails>> {
        Box::pin(async move {
            self.enter(RuntimeCall::Inspect(id.to_string())).await?;
            let status = self
                .lock()
                .statuses
                .get(id)
                .copied()
                .unwrap_or_default();
            Ok(ContainerDetails {
                runtime_id: id.to_string(),
                pid: 4242,
                status,
            })
        })
    }

    fn describe_status<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, (ContainerStatus, ContainerMetadata)> {
        Box::pin(async move {
            let mut metadata = ContainerMetadata {
                runtime_id: Some(id.to_string()),
                ..ContainerMetadata::default()
            };
            if let Err(err) = self.enter(RuntimeCall::Describe(id.to_string())).await {
                metadata.error = Some(err.to_string());
                return (ContainerStatus::None, metadata);
            }
            match self.lock().statuses.get(id).copied() {
                Some(status) => (status, metadata),
                None => {
                    metadata.error = Some(format!("no such container: {id}"));
                    (ContainerStatus::Stopped, metadata)
                }
            }
        })
    }

    fn subscribe_events(&self) -> BoxFuture<'_, RuntimeResult<mpsc::Receiver<ContainerChangeEvent>>> {
        Box::pin(async move {
            let mut state = self.lock();
            if let Some(err) = state.subscribe_error.clone() {
                return Err(err);
            }
            let (tx, rx) = mpsc::channel(64);
            state.events_tx = Some(tx);
            Ok(rx)
        })
    }

    fn version(&self) -> BoxFuture<'_, RuntimeResult<String>> {
        Box::pin(async move {
            self.lock()
                .version
                .clone()
                .unwrap_or_else(|| Ok("1.12.0".to_string()))
        })
    }
}
