//! The discovery service: one task owning the registry, the broadcast
//! scheduler, the subscriber directory and the prober.
//!
//! All mutation happens on that task. Reports, relay listings, resolved
//! addresses and subscriber commands reach it over channels; readers see the
//! latest merged view through a `watch` channel without touching the tables.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::config::RegistryConfig;
use crate::error::{ResolveError, Result, StorageError};
use crate::prober::{
    ActiveProber, AddressWatcher, NameResolver, ProbeTargets, ProbingWatcher, SystemResolver,
};
use crate::registry::{normalize_by_name, DeviceRegistry, Normalizer};
use crate::relay::{run_relay_poller, HttpRelayClient, RelayClient};
use crate::scheduler::{Decision, NotificationScheduler};
use crate::storage::{default_data_dir, FileStore, KeyValueStore};
use crate::subscribers::{Callback, SubscriberDirectory};
use crate::transport::{ProbeSink, TransportAdapter};
use crate::types::{DeviceRecord, DeviceReport};

/// Re-probe period for addresses handed to the zero-configuration watcher.
const WATCH_INTERVAL: Duration = Duration::from_secs(3);

/// Queue depth between the transport and the owner task.
const REPORT_QUEUE: usize = 256;

/// Read-only view published after every recompute.
#[derive(Debug, Default)]
pub struct RegistryView {
    pub devices: Vec<DeviceRecord>,
    pub by_uuid: HashMap<String, DeviceRecord>,
    pub direct_count: usize,
}

/// Collaborators the service is assembled from.
pub struct ServiceParts {
    pub probes: Arc<dyn ProbeSink>,
    pub reports: mpsc::Receiver<DeviceReport>,
    pub relay: Option<Arc<dyn RelayClient>>,
    pub resolver: Option<Arc<dyn NameResolver>>,
    pub watcher: Arc<dyn AddressWatcher>,
    pub store: Arc<dyn KeyValueStore>,
    pub normalize: Normalizer,
}

enum Command {
    Register {
        id: String,
        token: u64,
        callback: Callback,
    },
    Unregister {
        id: String,
        token: Option<u64>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

pub struct DiscoveryService;

impl DiscoveryService {
    /// Wire up the WebSocket transport, HTTP relay client (when configured),
    /// system resolver and file store, then start the service.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: RegistryConfig, data_dir: Option<PathBuf>) -> Result<RegistryHandle> {
        config.validate()?;

        let dir = data_dir.or_else(default_data_dir).ok_or_else(|| {
            StorageError::DirectoryAccess("no platform data directory".to_string())
        })?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir)?);

        let (reports_tx, reports_rx) = mpsc::channel(REPORT_QUEUE);
        let transport: Arc<dyn ProbeSink> = Arc::new(TransportAdapter::spawn(
            config.agent_url.clone(),
            config.connect_timeout(),
            config.reconnect_delay(),
            reports_tx,
        ));

        let relay: Option<Arc<dyn RelayClient>> = match &config.relay_url {
            Some(url) => Some(Arc::new(HttpRelayClient::new(url, config.relay_timeout())?)),
            None => None,
        };

        let parts = ServiceParts {
            probes: Arc::clone(&transport),
            reports: reports_rx,
            relay,
            resolver: Some(Arc::new(SystemResolver::new())),
            watcher: Arc::new(ProbingWatcher::new(transport, WATCH_INTERVAL)),
            store,
            normalize: normalize_by_name,
        };

        Ok(Self::start(config, parts))
    }

    /// Start the owner task over the given collaborators.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: RegistryConfig, parts: ServiceParts) -> RegistryHandle {
        let now = Instant::now();
        let targets = ProbeTargets::load(Arc::clone(&parts.store), &config);
        info!(
            "Starting discovery with {} probe target(s)",
            targets.addresses().len()
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(RegistryView::default()));
        let mut background = Vec::new();

        let (relay_tx, relay_rx) = mpsc::channel(4);
        if let Some(client) = parts.relay {
            background.push(tokio::spawn(run_relay_poller(
                client,
                config.relay_initial_delay(),
                config.relay_poll_interval(),
                relay_tx,
            )));
        }

        let (learned_tx, learned_rx) = mpsc::channel(1);
        if let Some(resolver) = parts.resolver {
            let host = config.lookup_hostname.clone();
            background.push(tokio::spawn(async move {
                match resolver.resolve_ipv4(&host).await {
                    Ok(addresses) => {
                        let _ = learned_tx.send(addresses).await;
                    }
                    Err(ResolveError::NotFound(host)) => info!("{} not found", host),
                    Err(e) => warn!("{}", e),
                }
            }));
        }

        let owner = Owner {
            registry: DeviceRegistry::new(parts.normalize),
            scheduler: NotificationScheduler::new(
                config.debounce_window(),
                config.heartbeat_interval(),
                now,
            ),
            subscribers: SubscriberDirectory::new(),
            prober: ActiveProber::new(targets, Arc::clone(&parts.probes)),
            probes: Arc::clone(&parts.probes),
            watcher: parts.watcher,
            view: view_tx,
            background,
            config,
        };

        tokio::spawn(owner.run(commands_rx, parts.reports, relay_rx, learned_rx));

        RegistryHandle {
            commands: commands_tx,
            view: view_rx,
            probes: parts.probes,
            tokens: Arc::new(AtomicU64::new(0)),
        }
    }
}

struct Owner {
    config: RegistryConfig,
    registry: DeviceRegistry,
    scheduler: NotificationScheduler,
    subscribers: SubscriberDirectory,
    prober: ActiveProber,
    probes: Arc<dyn ProbeSink>,
    watcher: Arc<dyn AddressWatcher>,
    view: watch::Sender<Arc<RegistryView>>,
    background: Vec<JoinHandle<()>>,
}

impl Owner {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::Receiver<DeviceReport>,
        mut relay: mpsc::Receiver<Vec<DeviceRecord>>,
        mut learned: mpsc::Receiver<Vec<Ipv4Addr>>,
    ) {
        let start = Instant::now();
        let ttl = self.config.sweep_interval();
        let mut sweep = interval_at(start + ttl, ttl);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let probe_every = self.config.probe_interval();
        let mut probe = interval_at(start + probe_every, probe_every);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let guessing_poke = self.config.guessing_poke;

        loop {
            let deadline = self.scheduler.next_deadline();

            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Shutdown { done }) => {
                            self.teardown();
                            let _ = done.send(());
                            return;
                        }
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
                Some(report) = reports.recv() => self.on_report(report),
                Some(devices) = relay.recv() => self.on_relay(devices),
                Some(addresses) = learned.recv() => {
                    self.prober.learn(&addresses, self.watcher.as_ref());
                }
                _ = sweep.tick() => self.on_sweep(),
                _ = probe.tick(), if guessing_poke => {
                    self.prober.tick();
                }
                _ = sleep_until(deadline) => self.on_deadline(),
            }
        }

        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Register {
                id,
                token,
                callback,
            } => {
                debug!("Registering subscriber {}", id);
                self.subscribers.register(&id, token, callback);
                // A late subscriber gets the current list without waiting for the next change.
                if !self.registry.snapshot().is_empty() {
                    self.subscribers.deliver(&id, self.registry.snapshot());
                }
            }
            Command::Unregister { id, token } => {
                let removed = match token {
                    Some(token) => self.subscribers.unregister_token(&id, token),
                    None => self.subscribers.unregister(&id),
                };
                debug!("Unregister {}: removed={}", id, removed);
            }
            Command::Shutdown { .. } => {}
        }
    }

    fn on_report(&mut self, report: DeviceReport) {
        let now = Instant::now();
        if report.alive {
            if let Some(ip) = report.record.ipaddr.as_deref() {
                self.prober.remember(ip);
            }
        }

        self.registry.apply_direct(report.record, report.alive, now);
        self.publish();

        if self.scheduler.on_change(now) == Decision::Now {
            self.broadcast(now);
        }
    }

    fn on_relay(&mut self, devices: Vec<DeviceRecord>) {
        let now = Instant::now();
        self.registry.apply_relay(devices, now);
        self.publish();
        self.broadcast(now);
    }

    fn on_sweep(&mut self) {
        let now = Instant::now();
        if self.registry.sweep_stale(now, self.config.sweep_interval()) {
            debug!("Swept stale devices, {} remain", self.registry.snapshot().len());
        }
        self.publish();
    }

    fn on_deadline(&mut self) {
        let now = Instant::now();
        if self.scheduler.is_due(now) {
            self.broadcast(now);
        }
    }

    fn broadcast(&mut self, now: Instant) {
        self.subscribers.broadcast(self.registry.snapshot());
        self.scheduler.mark_broadcast(now);
    }

    fn publish(&self) {
        let view = RegistryView {
            devices: self.registry.snapshot().to_vec(),
            by_uuid: self.registry.merged_map(),
            direct_count: self.registry.direct_count(),
        };
        self.view.send_replace(Arc::new(view));
    }

    fn teardown(&mut self) {
        for task in self.background.drain(..) {
            task.abort();
        }
        self.watcher.stop();
        self.probes.close();
        info!("Discovery service stopped");
    }
}

/// Public entry point to a running service. Cheap to clone.
#[derive(Clone)]
pub struct RegistryHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Arc<RegistryView>>,
    probes: Arc<dyn ProbeSink>,
    tokens: Arc<AtomicU64>,
}

impl RegistryHandle {
    /// Register `callback` under `id`, replacing any earlier registration for that id.
    ///
    /// If devices are already known, the subscriber receives the current list
    /// shortly after this call returns.
    pub fn register<F>(&self, id: &str, callback: F) -> Subscription
    where
        F: FnMut(&[DeviceRecord]) + Send + 'static,
    {
        let token = self.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(Command::Register {
            id: id.to_string(),
            token,
            callback: Box::new(callback),
        });

        Subscription {
            id: id.to_string(),
            token,
            handle: self.clone(),
        }
    }

    /// Remove whatever is registered under `id`. Unknown ids are ignored.
    pub fn unregister(&self, id: &str) {
        self.send(Command::Unregister {
            id: id.to_string(),
            token: None,
        });
    }

    pub fn is_connected(&self) -> bool {
        self.probes.is_connected()
    }

    /// Point lookup, direct reports preferred over relay entries.
    pub fn lookup(&self, uuid: &str) -> Option<DeviceRecord> {
        self.view.borrow().by_uuid.get(uuid).cloned()
    }

    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.view.borrow().devices.clone()
    }

    pub fn direct_count(&self) -> usize {
        self.view.borrow().direct_count
    }

    pub fn probe_udp(&self, ip: &str) {
        self.probes.probe_udp(ip);
    }

    pub fn probe_tcp(&self, ip: &str) {
        self.probes.probe_tcp(ip);
    }

    pub fn test_tcp(&self, ip: &str) {
        self.probes.test_tcp(ip);
    }

    /// Stop all timers and background tasks and close the transport.
    pub async fn shutdown(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).is_ok() {
            let _ = wait.await;
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Discovery service stopped, ignoring command");
        }
    }
}

/// A registered subscriber.
pub struct Subscription {
    id: String,
    token: u64,
    handle: RegistryHandle,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the discovery agent channel is open.
    pub fn connection(&self) -> bool {
        self.handle.is_connected()
    }

    pub fn probe_udp(&self, ip: &str) {
        self.handle.probe_udp(ip);
    }

    pub fn probe_tcp(&self, ip: &str) {
        self.handle.probe_tcp(ip);
    }

    pub fn test_tcp(&self, ip: &str) {
        self.handle.test_tcp(ip);
    }

    pub fn direct_count(&self) -> usize {
        self.handle.direct_count()
    }

    /// Remove this registration. A no-op if the id has since been re-registered.
    pub fn unregister(self) {
        self.handle.send(Command::Unregister {
            id: self.id,
            token: Some(self.token),
        });
    }
}
