//! Active probing of candidate addresses.
//!
//! The probe target list is persisted under a single store key as a
//! delimiter-separated string. It doubles as the recent-IP history: alive
//! reports append their address, and the oldest entries fall off once the
//! list reaches its cap.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use log::{debug, info, warn};
use regex::Regex;
use tokio::task::JoinHandle;

use crate::config::RegistryConfig;
use crate::error::{AddressError, ResolveError};
use crate::storage::KeyValueStore;
use crate::transport::ProbeSink;

/// Separator accepted in persisted lists: `,` or `;`, optionally followed by a space.
const SEPARATOR_PATTERN: &str = r"[,;] ?";

fn separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(SEPARATOR_PATTERN).expect("valid separator pattern"))
}

/// Split, trim and de-duplicate a persisted address list, keeping first occurrences.
pub fn split_addresses(raw: &str) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    for part in separator().split(raw) {
        let part = part.trim();
        if !part.is_empty() && !addresses.iter().any(|a| a == part) {
            addresses.push(part.to_string());
        }
    }
    addresses
}

/// Check a manually entered probe address.
pub fn validate_probe_address(ip: &str) -> Result<Ipv4Addr, AddressError> {
    let trimmed = ip.trim();
    let addr: Ipv4Addr = trimmed
        .parse()
        .map_err(|_| AddressError::InvalidFormat(trimmed.to_string()))?;

    if addr.is_link_local() {
        return Err(AddressError::LinkLocal(trimmed.to_string()));
    }

    Ok(addr)
}

/// Ordered, de-duplicated, capped list of probe targets.
pub struct ProbeTargets {
    addresses: Vec<String>,
    cursor: usize,
    cap: usize,
    excluded_host: String,
    key: String,
    store: Arc<dyn KeyValueStore>,
}

impl ProbeTargets {
    /// Load from the store, seed with the default address if empty, and
    /// write the normalized list back.
    pub fn load(store: Arc<dyn KeyValueStore>, config: &RegistryConfig) -> Self {
        let raw = match store.get(&config.probe_targets_key) {
            Ok(raw) => raw.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read probe targets: {}", e);
                String::new()
            }
        };

        let mut addresses = split_addresses(&raw);
        if addresses.is_empty() {
            addresses.push(config.default_probe_target.clone());
        }
        let cap = config.max_probe_targets.max(1);
        if addresses.len() > cap {
            addresses.drain(..addresses.len() - cap);
        }

        let targets = Self {
            addresses,
            cursor: 0,
            cap,
            excluded_host: config.history_excluded_host.clone(),
            key: config.probe_targets_key.clone(),
            store,
        };
        targets.persist();
        targets
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.addresses.iter().any(|a| a == ip)
    }

    /// Record the address of an alive device. Skips empties, duplicates and
    /// the placeholder host.
    pub fn remember(&mut self, ip: &str) -> bool {
        if ip.trim() == self.excluded_host {
            return false;
        }
        self.append(ip)
    }

    /// Append a new address, evicting the oldest entries past the cap.
    pub fn append(&mut self, ip: &str) -> bool {
        let ip = ip.trim();
        if ip.is_empty() || self.contains(ip) {
            return false;
        }

        self.addresses.push(ip.to_string());
        while self.addresses.len() > self.cap {
            self.addresses.remove(0);
            self.cursor = self.cursor.saturating_sub(1);
        }
        self.persist();
        true
    }

    /// Empty the list. The next load seeds the default address again.
    pub fn clear(&mut self) {
        self.addresses.clear();
        self.cursor = 0;
        self.persist();
    }

    /// Next address in round-robin order.
    pub fn next_target(&mut self) -> Option<String> {
        if self.addresses.is_empty() {
            return None;
        }
        if self.cursor >= self.addresses.len() {
            self.cursor = 0;
        }
        let ip = self.addresses[self.cursor].clone();
        self.cursor += 1;
        Some(ip)
    }

    fn persist(&self) {
        if let Err(e) = self.store.set(&self.key, &self.addresses.join(",")) {
            warn!("Failed to persist probe targets: {}", e);
        }
    }
}

/// Looks up IPv4 addresses for a host name.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>, ResolveError>;
}

/// Resolver backed by the system DNS configuration.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!(
                "Failed to load system resolver config: {}. Falling back to defaults.",
                e
            );
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        let lookup = self.resolver.lookup_ip(host).await.map_err(|e| {
            if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
                ResolveError::NotFound(host.to_string())
            } else {
                ResolveError::Lookup {
                    host: host.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(lookup
            .iter()
            .filter_map(|ip| match ip {
                std::net::IpAddr::V4(v4) => Some(v4),
                std::net::IpAddr::V6(_) => None,
            })
            .collect())
    }
}

/// Zero-configuration helper notified of newly learned addresses.
pub trait AddressWatcher: Send + Sync {
    fn watch(&self, ip: &str);

    /// Stop any per-address work.
    fn stop(&self) {}
}

/// Watcher that ignores everything.
pub struct NoopWatcher;

impl AddressWatcher for NoopWatcher {
    fn watch(&self, _ip: &str) {}
}

/// Watcher that pokes each learned address on its own schedule.
pub struct ProbingWatcher {
    sink: Arc<dyn ProbeSink>,
    interval: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProbingWatcher {
    pub fn new(sink: Arc<dyn ProbeSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl AddressWatcher for ProbingWatcher {
    fn watch(&self, ip: &str) {
        let sink = Arc::clone(&self.sink);
        let interval = self.interval;
        let ip = ip.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sink.probe_udp(&ip);
                sink.test_tcp(&ip);
            }
        });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }

    fn stop(&self) {
        for task in self.tasks.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            task.abort();
        }
    }
}

/// Round-robin prober over the persisted target list.
pub struct ActiveProber {
    targets: ProbeTargets,
    sink: Arc<dyn ProbeSink>,
}

impl ActiveProber {
    pub fn new(targets: ProbeTargets, sink: Arc<dyn ProbeSink>) -> Self {
        Self { targets, sink }
    }

    pub fn targets(&self) -> &ProbeTargets {
        &self.targets
    }

    /// Probe the next target. Returns the address probed.
    pub fn tick(&mut self) -> Option<String> {
        let ip = self.targets.next_target()?;
        debug!("Probing {}", ip);
        self.sink.probe_tcp(&ip);
        Some(ip)
    }

    /// Record the address of an alive report.
    pub fn remember(&mut self, ip: &str) -> bool {
        self.targets.remember(ip)
    }

    /// Add resolved addresses not yet known and hand them to the watcher.
    pub fn learn(&mut self, addresses: &[Ipv4Addr], watcher: &dyn AddressWatcher) -> Vec<String> {
        let mut learned = Vec::new();
        for addr in addresses {
            let ip = addr.to_string();
            if self.targets.append(&ip) {
                info!("Learned probe target {}", ip);
                watcher.watch(&ip);
                learned.push(ip);
            }
        }
        learned
    }
}
