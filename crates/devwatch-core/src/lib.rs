//! Device discovery registry.
//!
//! Merges live reports from a local discovery agent with listings polled from
//! a remote relay, keeps the merged set fresh, and fans it out to subscribers.
//! Also drives active probing of likely device addresses.

pub mod config;
pub mod error;
pub mod prober;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod subscribers;
pub mod transport;
pub mod types;

pub use config::RegistryConfig;
pub use error::{CoreError, Result};
pub use registry::{DeviceRegistry, Precedence};
pub use service::{DiscoveryService, RegistryHandle, ServiceParts, Subscription};
pub use types::{DeviceRecord, DeviceReport, RelayListing};
