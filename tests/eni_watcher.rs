// tests/eni_watcher.rs

mod common;
use crate::common::{FakeLinkLister, init_tracing, next_change, wait_until, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use taskengine::api::{AttachmentStatus, EniAttachment, StateChange};
use taskengine::engine::EngineState;
use taskengine::eni::{EniWatcher, LinkEvent};
use taskengine::errors::EngineError;
use tokio::sync::{mpsc, watch};

type TestResult = Result<(), Box<dyn Error>>;

const MAC: &str = "0e:11:22:33:44:55";

struct Setup {
    watcher: EniWatcher,
    lister: FakeLinkLister,
    state: Arc<EngineState>,
    events: mpsc::Receiver<StateChange>,
}

fn setup() -> Setup {
    init_tracing();
    let lister = FakeLinkLister::new();
    let state = Arc::new(EngineState::new());
    state.add_attachment(EniAttachment::new("arn:task/eni", "arn:attachment/eni", MAC));
    let (tx, events) = mpsc::channel(16);
    let watcher = EniWatcher::new(Arc::new(lister.clone()), Arc::clone(&state), tx);
    Setup {
        watcher,
        lister,
        state,
        events,
    }
}

#[tokio::test]
async fn visible_interface_is_reported_once() -> TestResult {
    let mut s = setup();
    s.lister.add_link("eth0", "02:00:00:00:00:01");
    s.lister.add_link("eth1", "0E:11:22:33:44:55");

    assert_eq!(s.watcher.reconcile_once().await, 1);
    match next_change(&mut s.events).await {
        StateChange::Attachment(change) => {
            assert_eq!(change.task_arn, "arn:task/eni");
            assert_eq!(change.attachment_arn, "arn:attachment/eni");
            assert_eq!(change.mac_address, MAC);
            assert_eq!(change.status, AttachmentStatus::Attached);
        }
        other => panic!("unexpected {other:?}"),
    }

    let stored = s.state.attachment_by_mac(MAC).unwrap();
    assert!(stored.sent);
    assert_eq!(stored.status, AttachmentStatus::Attached);

    assert_eq!(s.watcher.reconcile_once().await, 0);
    assert!(s.events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn listing_failure_reports_nothing() -> TestResult {
    let mut s = setup();
    s.lister.add_link("eth1", MAC);
    s.lister.set_failing(true);

    assert_eq!(s.watcher.reconcile_once().await, 0);
    assert!(s.events.try_recv().is_err());
    assert!(!s.state.attachment_by_mac(MAC).unwrap().sent);

    let err = s.watcher.init().await.unwrap_err();
    assert!(matches!(err, EngineError::LinkList(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn init_reports_links_present_at_startup() -> TestResult {
    let mut s = setup();
    s.lister.add_link("eth1", MAC);

    s.watcher.init().await?;
    assert!(matches!(
        next_change(&mut s.events).await,
        StateChange::Attachment(_)
    ));
    Ok(())
}

#[tokio::test]
async fn hot_plug_events_are_filtered() -> TestResult {
    let mut s = setup();
    s.lister.add_link("eth1", MAC);
    s.lister.add_link("eth2", "02:00:00:00:00:02");

    let block = LinkEvent::new("add", "block", "/devices/virtual/block/loop0");
    assert!(!s.watcher.handle_link_event(&block).await);

    let removed = LinkEvent::new("remove", "net", "/devices/pci0000:00/0000:00:05.0/net/eth1");
    assert!(!s.watcher.handle_link_event(&removed).await);

    let unrelated = LinkEvent::new("add", "net", "/devices/pci0000:00/0000:00:06.0/net/eth2");
    assert!(!s.watcher.handle_link_event(&unrelated).await);

    let missing = LinkEvent::new("add", "net", "/devices/pci0000:00/0000:00:07.0/net/eth9");
    assert!(!s.watcher.handle_link_event(&missing).await);

    assert!(s.events.try_recv().is_err());

    let added = LinkEvent::new("add", "net", "/devices/pci0000:00/0000:00:05.0/net/eth1");
    assert!(s.watcher.handle_link_event(&added).await);
    assert!(matches!(
        next_change(&mut s.events).await,
        StateChange::Attachment(_)
    ));
    Ok(())
}

#[test]
fn interface_name_comes_from_net_device_paths() {
    let event = LinkEvent::new("add", "net", "/devices/pci0000:00/0000:00:05.0/net/eth1");
    assert_eq!(event.interface_name(), Some("eth1"));

    let trailing = LinkEvent::new("add", "net", "/devices/virtual/net/veth0/");
    assert_eq!(trailing.interface_name(), Some("veth0"));

    let not_net = LinkEvent::new("add", "net", "/devices/virtual/block/loop0");
    assert_eq!(not_net.interface_name(), None);

    let other_subsystem = LinkEvent::new("add", "block", "/devices/virtual/net/eth1");
    assert_eq!(other_subsystem.interface_name(), None);
}

#[tokio::test]
async fn run_loop_reports_late_links_and_stops_on_shutdown() -> TestResult {
    let s = setup();
    let mut events = s.events;
    let lister = s.lister.clone();
    let (link_tx, link_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(s.watcher.run(
        Duration::from_millis(20),
        Some(link_rx),
        shutdown_rx,
    ));

    // Not there yet: periodic passes find nothing.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(events.try_recv().is_err());

    lister.add_link("eth1", MAC);
    link_tx
        .send(LinkEvent::new("add", "net", "/devices/virtual/net/eth1"))
        .await?;
    assert!(matches!(
        next_change(&mut events).await,
        StateChange::Attachment(_)
    ));

    wait_until(|| s.state.attachment_by_mac(MAC).is_some_and(|a| a.sent)).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(events.try_recv().is_err());

    shutdown_tx.send(true)?;
    with_timeout(handle).await?;
    Ok(())
}
