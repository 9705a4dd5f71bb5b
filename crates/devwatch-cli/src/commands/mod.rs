//! Command implementations.

pub mod discover;
pub mod probe;
pub mod targets;
pub mod watch;

pub use discover::run_discover;
pub use probe::run_probe;
pub use targets::run_targets;
pub use watch::run_watch;
