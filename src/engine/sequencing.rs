// src/engine/sequencing.rs

//! Stop-before-start sequencing.
//!
//! Stops carrying a sequence number are registered here until the task they
//! stop has fully stopped. A task started with sequence number `N` waits
//! until no registered stop with a sequence number `<= N` is outstanding.

use std::collections::BTreeMap;

use tokio::sync::watch;

/// A wait group keyed by sequence number.
#[derive(Debug)]
pub struct SequentialWaitGroup {
    pending: watch::Sender<BTreeMap<u64, usize>>,
}

impl Default for SequentialWaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl SequentialWaitGroup {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(BTreeMap::new());
        Self { pending }
    }

    pub fn add(&self, sequence: u64) {
        self.pending.send_modify(|pending| {
            *pending.entry(sequence).or_default() += 1;
        });
    }

    pub fn done(&self, sequence: u64) {
        self.pending.send_modify(|pending| {
            if let Some(count) = pending.get_mut(&sequence) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    pending.remove(&sequence);
                }
            }
        });
    }

    /// Whether any registered sequence number `<= sequence` is outstanding.
    pub fn is_blocked(&self, sequence: u64) -> bool {
        self.pending.borrow().range(..=sequence).next().is_some()
    }

    /// Wait until nothing `<= sequence` is outstanding.
    pub async fn wait(&self, sequence: u64) {
        let mut rx = self.pending.subscribe();
        loop {
            let blocked = rx.borrow_and_update().range(..=sequence).next().is_some();
            if !blocked {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
