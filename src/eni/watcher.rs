// src/eni/watcher.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{AttachmentStateChange, AttachmentStatus, StateChange};
use crate::engine::EngineState;
use crate::errors::{EngineError, Result};

use super::link::{LinkEvent, LinkLister, NetworkLink};

/// Reports attachments once their interface shows up on the host.
///
/// Two paths lead to a report: a periodic pass over every link
/// ([`EniWatcher::reconcile_once`]) and hot-plug notifications
/// ([`EniWatcher::handle_link_added`]). Either way an attachment is reported
/// at most once.
pub struct EniWatcher {
    lister: Arc<dyn LinkLister>,
    state: Arc<EngineState>,
    events_tx: mpsc::Sender<StateChange>,
}

impl EniWatcher {
    pub fn new(
        lister: Arc<dyn LinkLister>,
        state: Arc<EngineState>,
        events_tx: mpsc::Sender<StateChange>,
    ) -> Self {
        Self {
            lister,
            state,
            events_tx,
        }
    }

    /// Startup pass. Unlike later passes, failing to list links is an error.
    pub async fn init(&self) -> Result<()> {
        let links = self
            .lister
            .list_links()
            .await
            .map_err(|e| EngineError::LinkList(format!("{e:#}")))?;
        self.report_links(&links).await;
        Ok(())
    }

    /// Compare the host's links against known attachments and report any
    /// not reported yet. Returns how many were reported.
    ///
    /// If the links cannot be listed nothing is reported.
    pub async fn reconcile_once(&self) -> usize {
        match self.lister.list_links().await {
            Ok(links) => self.report_links(&links).await,
            Err(err) => {
                warn!(error = %err, "listing links failed; skipping reconciliation");
                0
            }
        }
    }

    /// A link named `name` appeared on the host.
    pub async fn handle_link_added(&self, name: &str) -> bool {
        match self.lister.link_by_name(name).await {
            Ok(link) => self.report_link(&link).await,
            Err(err) => {
                warn!(link = name, error = %err, "cannot resolve added link");
                false
            }
        }
    }

    pub async fn handle_link_event(&self, event: &LinkEvent) -> bool {
        if !event.is_add() {
            return false;
        }
        match event.interface_name() {
            Some(name) => self.handle_link_added(name).await,
            None => {
                debug!(?event, "ignoring non-network device event");
                false
            }
        }
    }

    async fn report_links(&self, links: &[NetworkLink]) -> usize {
        let mut reported = 0;
        for link in links {
            if self.report_link(link).await {
                reported += 1;
            }
        }
        reported
    }

    async fn report_link(&self, link: &NetworkLink) -> bool {
        let Some(attachment) = self.state.attachment_by_mac(&link.mac_address) else {
            debug!(link = %link.name, mac = %link.mac_address, "no attachment for link");
            return false;
        };
        if attachment.sent {
            return false;
        }

        let change = StateChange::Attachment(AttachmentStateChange {
            task_arn: attachment.task_arn.clone(),
            attachment_arn: attachment.attachment_arn.clone(),
            mac_address: attachment.mac_address.clone(),
            status: AttachmentStatus::Attached,
        });
        if self.events_tx.send(change).await.is_err() {
            warn!(mac = %attachment.mac_address, "state change channel closed");
            return false;
        }

        self.state.mark_attachment_sent(&attachment.mac_address);
        info!(
            task = %attachment.task_arn,
            attachment = %attachment.attachment_arn,
            link = %link.name,
            "attachment reported"
        );
        true
    }

    /// Reconcile every `interval` and handle hot-plug events until shutdown.
    pub async fn run(
        self,
        interval: Duration,
        mut link_events: Option<mpsc::Receiver<LinkEvent>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?interval, "attachment watcher started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let reported = self.reconcile_once().await;
                    debug!(reported, "periodic reconciliation done");
                }
                event = next_event(&mut link_events) => match event {
                    Some(event) => {
                        self.handle_link_event(&event).await;
                    }
                    None => {
                        debug!("link event stream closed");
                        link_events = None;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        info!("attachment watcher stopped");
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<LinkEvent>>) -> Option<LinkEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
