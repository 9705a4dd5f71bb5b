//! End-to-end behavior of the discovery service with in-memory collaborators
//! and a paused clock.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use devwatch_core::error::{RelayError, ResolveError};
use devwatch_core::prober::{AddressWatcher, NameResolver};
use devwatch_core::protocol::{ProbeCommand, ProbeKind};
use devwatch_core::registry::normalize_by_name;
use devwatch_core::relay::RelayClient;
use devwatch_core::storage::{KeyValueStore, MemoryStore};
use devwatch_core::transport::ProbeSink;
use devwatch_core::{
    DeviceRecord, DeviceReport, DiscoveryService, RegistryConfig, RegistryHandle, RelayListing,
    ServiceParts,
};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

#[derive(Default)]
struct RecordingSink {
    commands: Mutex<Vec<ProbeCommand>>,
    closed: AtomicBool,
}

impl RecordingSink {
    fn sent(&self) -> Vec<(ProbeKind, String)> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.cmd, c.ipaddr.clone()))
            .collect()
    }
}

impl ProbeSink for RecordingSink {
    fn send(&self, command: ProbeCommand) {
        self.commands.lock().unwrap().push(command);
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedRelay {
    listings: Mutex<VecDeque<Vec<DeviceRecord>>>,
}

impl ScriptedRelay {
    fn new(listings: Vec<Vec<DeviceRecord>>) -> Self {
        Self {
            listings: Mutex::new(listings.into()),
        }
    }
}

#[async_trait]
impl RelayClient for ScriptedRelay {
    async fn list_devices(&self) -> Result<RelayListing, RelayError> {
        let devices = self.listings.lock().unwrap().pop_front().unwrap_or_default();
        Ok(RelayListing { devices })
    }
}

struct FixedResolver(Result<Vec<Ipv4Addr>, ResolveError>);

#[async_trait]
impl NameResolver for FixedResolver {
    async fn resolve_ipv4(&self, _host: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingWatcher {
    watched: Mutex<Vec<String>>,
    stopped: AtomicBool,
}

impl AddressWatcher for RecordingWatcher {
    fn watch(&self, ip: &str) {
        self.watched.lock().unwrap().push(ip.to_string());
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Deliveries seen by one subscriber: offset from start and uuids delivered.
type Deliveries = Arc<Mutex<Vec<(Duration, Vec<String>)>>>;

struct Harness {
    handle: RegistryHandle,
    reports: mpsc::Sender<DeviceReport>,
    sink: Arc<RecordingSink>,
    watcher: Arc<RecordingWatcher>,
    store: Arc<MemoryStore>,
    start: Instant,
}

impl Harness {
    async fn report(&self, uuid: &str, ip: &str, alive: bool) {
        let record = DeviceRecord::new(uuid).with_ipaddr(ip);
        self.reports
            .send(DeviceReport { record, alive })
            .await
            .unwrap();
        settle().await;
    }

    fn subscribe(&self, id: &str) -> Deliveries {
        let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&deliveries);
        let start = self.start;
        self.handle.register(id, move |devices: &[DeviceRecord]| {
            let uuids = devices.iter().map(|d| d.uuid.clone()).collect();
            sink.lock().unwrap().push((start.elapsed(), uuids));
        });
        deliveries
    }

    fn uuids(&self) -> Vec<String> {
        self.handle
            .snapshot()
            .into_iter()
            .map(|d| d.uuid)
            .collect()
    }
}

fn quiet_config() -> RegistryConfig {
    RegistryConfig {
        guessing_poke: false,
        ..RegistryConfig::default()
    }
}

fn start(
    config: RegistryConfig,
    relay: Option<Arc<dyn RelayClient>>,
    resolver: Option<Arc<dyn NameResolver>>,
    store: MemoryStore,
) -> Harness {
    let (reports, reports_rx) = mpsc::channel(16);
    let sink = Arc::new(RecordingSink::default());
    let watcher = Arc::new(RecordingWatcher::default());
    let store = Arc::new(store);

    let parts = ServiceParts {
        probes: sink.clone(),
        reports: reports_rx,
        relay,
        resolver,
        watcher: watcher.clone(),
        store: store.clone(),
        normalize: normalize_by_name,
    };

    Harness {
        handle: DiscoveryService::start(config, parts),
        reports,
        sink,
        watcher,
        store,
        start: Instant::now(),
    }
}

/// Let the owner task drain whatever is queued without moving the clock.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_alive_report_upserts_and_gone_report_removes() {
    let h = start(quiet_config(), None, None, MemoryStore::new());

    h.report("A", "10.0.0.5", true).await;
    assert_eq!(h.uuids(), vec!["A"]);
    assert_eq!(
        h.handle.lookup("A").and_then(|d| d.ipaddr),
        Some("10.0.0.5".to_string())
    );
    assert_eq!(h.handle.direct_count(), 1);

    h.report("A", "10.0.0.5", false).await;
    assert!(h.uuids().is_empty());
    assert!(h.handle.lookup("A").is_none());
    assert_eq!(h.handle.direct_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unrefreshed_device_is_swept() {
    let h = start(quiet_config(), None, None, MemoryStore::new());

    h.report("A", "10.0.0.5", true).await;
    sleep(Duration::from_secs(10)).await;
    h.report("B", "10.0.0.6", true).await;
    assert_eq!(h.uuids(), vec!["A", "B"]);

    sleep(Duration::from_secs(6)).await;
    settle().await;
    assert_eq!(h.uuids(), vec!["B"]);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_waits_for_next_heartbeat() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let deliveries = h.subscribe("panel");
    settle().await;

    h.report("A", "10.0.0.5", true).await;
    sleep(Duration::from_secs(12)).await;
    h.report("B", "10.0.0.6", true).await;

    // A is evicted by the sweep at 15s; nothing is sent until the heartbeat at 17s.
    sleep(Duration::from_secs(4)).await;
    settle().await;
    assert_eq!(h.uuids(), vec!["B"]);
    let times: Vec<Duration> = deliveries.lock().unwrap().iter().map(|(t, _)| *t).collect();
    assert_eq!(
        times,
        vec![
            Duration::ZERO,
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(12)
        ]
    );
    assert_eq!(
        deliveries.lock().unwrap()[3].1,
        vec!["A".to_string(), "B".to_string()]
    );

    sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(
        deliveries.lock().unwrap().last(),
        Some(&(Duration::from_secs(17), vec!["B".to_string()]))
    );
}

#[tokio::test(start_paused = true)]
async fn test_burst_collapses_into_one_trailing_broadcast() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let deliveries = h.subscribe("panel");
    settle().await;

    // Opens the debounce window.
    h.report("P", "10.0.0.1", true).await;
    assert_eq!(deliveries.lock().unwrap().len(), 1);

    for (i, uuid) in ["B1", "B2", "B3", "B4", "B5"].iter().enumerate() {
        if i > 0 {
            sleep(Duration::from_millis(10)).await;
        }
        h.report(uuid, "10.0.0.2", true).await;
    }
    assert_eq!(deliveries.lock().unwrap().len(), 1);

    sleep(Duration::from_millis(300)).await;
    settle().await;

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 2);
    let (at, uuids) = &deliveries[1];
    assert_eq!(*at, Duration::from_millis(140));
    assert_eq!(uuids.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_without_changes() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let deliveries = h.subscribe("panel");
    settle().await;

    h.report("A", "10.0.0.5", true).await;
    sleep(Duration::from_secs(12)).await;
    settle().await;

    let times: Vec<Duration> = deliveries.lock().unwrap().iter().map(|(t, _)| *t).collect();
    assert_eq!(
        times,
        vec![
            Duration::ZERO,
            Duration::from_secs(5),
            Duration::from_secs(10)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_gets_current_snapshot() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    h.report("A", "10.0.0.5", true).await;

    let deliveries = h.subscribe("late");
    settle().await;

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0], (Duration::ZERO, vec!["A".to_string()]));
}

#[tokio::test(start_paused = true)]
async fn test_empty_snapshot_skips_late_delivery() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let deliveries = h.subscribe("late");
    settle().await;

    assert!(deliveries.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reregistering_id_replaces_callback() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let first = h.subscribe("panel");
    let second = h.subscribe("panel");
    settle().await;

    h.report("A", "10.0.0.5", true).await;

    assert!(first.lock().unwrap().is_empty());
    assert_eq!(second.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_subscription_unregister_keeps_successor() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let first = h.handle.register("panel", |_: &[DeviceRecord]| {});
    let second = h.subscribe("panel");
    settle().await;

    first.unregister();
    settle().await;
    h.report("A", "10.0.0.5", true).await;
    assert_eq!(second.lock().unwrap().len(), 1);

    h.handle.unregister("panel");
    h.handle.unregister("never-registered");
    settle().await;
    sleep(Duration::from_secs(6)).await;
    settle().await;
    assert_eq!(second.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_direct_report_wins_over_relay() {
    let relay = ScriptedRelay::new(vec![vec![
        DeviceRecord::new("A")
            .with_ipaddr("10.9.9.9")
            .with_attribute("name", "Relay copy"),
        DeviceRecord::new("B").with_ipaddr("10.9.9.10"),
    ]]);
    let h = start(quiet_config(), Some(Arc::new(relay)), None, MemoryStore::new());

    h.report("A", "10.0.0.5", true).await;
    sleep(Duration::from_millis(5100)).await;
    settle().await;

    assert_eq!(h.uuids(), vec!["A", "B"]);
    assert_eq!(
        h.handle.lookup("A").and_then(|d| d.ipaddr),
        Some("10.0.0.5".to_string())
    );
    assert_eq!(h.handle.direct_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_relay_listing_replaces_table_wholesale() {
    let relay = ScriptedRelay::new(vec![vec![DeviceRecord::new("B")], vec![]]);
    let h = start(quiet_config(), Some(Arc::new(relay)), None, MemoryStore::new());
    let deliveries = h.subscribe("panel");
    settle().await;

    sleep(Duration::from_secs(6)).await;
    settle().await;
    assert_eq!(h.uuids(), vec!["B"]);
    // Relay updates go out immediately.
    assert!(deliveries
        .lock()
        .unwrap()
        .contains(&(Duration::from_secs(5), vec!["B".to_string()])));

    sleep(Duration::from_secs(15)).await;
    settle().await;
    assert!(h.uuids().is_empty());
    assert!(deliveries
        .lock()
        .unwrap()
        .contains(&(Duration::from_secs(20), Vec::new())));
}

#[tokio::test(start_paused = true)]
async fn test_probe_rotation_and_history() {
    let config = RegistryConfig::default();
    let h = start(
        config,
        None,
        None,
        MemoryStore::with_entry("poke-ip-addr", "10.0.0.1, 10.0.0.2"),
    );

    sleep(Duration::from_millis(3500)).await;
    settle().await;
    assert_eq!(
        h.sink.sent(),
        vec![
            (ProbeKind::Tcp, "10.0.0.1".to_string()),
            (ProbeKind::Tcp, "10.0.0.2".to_string()),
            (ProbeKind::Tcp, "10.0.0.1".to_string()),
        ]
    );

    h.report("A", "10.0.0.7", true).await;
    h.report("R", "192.168.1.1", true).await;
    assert_eq!(
        h.store.get("poke-ip-addr").unwrap(),
        Some("10.0.0.1,10.0.0.2,10.0.0.7".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_resolved_addresses_become_targets() {
    let resolver = FixedResolver(Ok(vec![
        Ipv4Addr::new(10, 0, 0, 42),
        Ipv4Addr::new(192, 168, 1, 1),
    ]));
    let h = start(
        quiet_config(),
        None,
        Some(Arc::new(resolver)),
        MemoryStore::new(),
    );
    settle().await;

    // The seeded default is already a target, so only the new address is watched.
    assert_eq!(*h.watcher.watched.lock().unwrap(), vec!["10.0.0.42"]);
    assert_eq!(
        h.store.get("poke-ip-addr").unwrap(),
        Some("192.168.1.1,10.0.0.42".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_host_is_ignored() {
    let resolver = FixedResolver(Err(ResolveError::NotFound("raspberrypi.local".to_string())));
    let h = start(
        quiet_config(),
        None,
        Some(Arc::new(resolver)),
        MemoryStore::new(),
    );
    settle().await;

    assert!(h.watcher.watched.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let relay = ScriptedRelay::new(vec![vec![DeviceRecord::new("B")]]);
    let h = start(
        RegistryConfig::default(),
        Some(Arc::new(relay)),
        None,
        MemoryStore::new(),
    );
    let deliveries = h.subscribe("panel");
    settle().await;
    assert!(h.handle.is_connected());

    h.handle.shutdown().await;
    assert!(!h.handle.is_connected());
    assert!(h.watcher.stopped.load(Ordering::SeqCst));

    sleep(Duration::from_secs(30)).await;
    settle().await;
    assert!(deliveries.lock().unwrap().is_empty());
    assert!(h.sink.sent().is_empty());

    // Commands after shutdown are ignored.
    h.handle.unregister("panel");
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscription_probes_go_to_transport() {
    let h = start(quiet_config(), None, None, MemoryStore::new());
    let subscription = h.handle.register("panel", |_: &[DeviceRecord]| {});

    assert_eq!(subscription.id(), "panel");
    assert!(subscription.connection());
    subscription.probe_udp("10.0.0.5");
    subscription.test_tcp("10.0.0.5");
    subscription.probe_tcp(" ");

    assert_eq!(
        h.sink.sent(),
        vec![
            (ProbeKind::Udp, "10.0.0.5".to_string()),
            (ProbeKind::TestTcp, "10.0.0.5".to_string()),
        ]
    );
    assert_eq!(subscription.direct_count(), 0);
}
