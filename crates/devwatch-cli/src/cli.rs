//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use devwatch_core::protocol::ProbeKind;
use devwatch_core::RegistryConfig;

use crate::error::CliError;

/// devwatch - device liveness and discovery from the command line
#[derive(Parser, Debug)]
#[command(name = "devwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted probe target list
    #[arg(long, global = true, env = "DEVWATCH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Discovery agent WebSocket URL
    #[arg(long, global = true, env = "DEVWATCH_AGENT_URL")]
    pub agent_url: Option<String>,

    /// Relay service base URL
    #[arg(long, global = true, env = "DEVWATCH_RELAY_URL")]
    pub relay_url: Option<String>,

    /// Disable the round-robin probe rotation
    #[arg(long, global = true)]
    pub no_guess: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config file (or defaults) with flag and environment overrides applied.
    pub fn registry_config(&self) -> Result<RegistryConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => RegistryConfig::load(path)?,
            None => RegistryConfig::default(),
        };

        if let Some(url) = &self.agent_url {
            config.agent_url = url.clone();
        }
        if let Some(url) = &self.relay_url {
            config.relay_url = Some(url.clone());
        }
        if self.no_guess {
            config.guessing_poke = false;
        }

        config
            .validate()
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Continuously display the device list until Ctrl+C
    Watch,

    /// Run discovery for a while and print what was found
    Discover(DiscoverArgs),

    /// Send a single probe command through the discovery agent
    Probe(ProbeArgs),

    /// Manage the persisted probe target list
    Targets(TargetsArgs),
}

// ==================== Discover ====================

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Discovery duration in seconds
    #[arg(short, long, default_value = "10")]
    pub duration: u64,
}

// ==================== Probe ====================

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Address to probe
    pub ip: String,

    /// Probe flavor
    #[arg(short, long, value_enum, default_value = "udp")]
    pub mode: ProbeMode,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMode {
    Udp,
    Tcp,
    Test,
}

impl From<ProbeMode> for ProbeKind {
    fn from(mode: ProbeMode) -> Self {
        match mode {
            ProbeMode::Udp => ProbeKind::Udp,
            ProbeMode::Tcp => ProbeKind::Tcp,
            ProbeMode::Test => ProbeKind::TestTcp,
        }
    }
}

// ==================== Targets ====================

#[derive(Args, Debug)]
pub struct TargetsArgs {
    #[command(subcommand)]
    pub command: TargetsCommands,
}

#[derive(Subcommand, Debug)]
pub enum TargetsCommands {
    /// List probe targets
    List,

    /// Add a probe target
    Add(TargetsAddArgs),

    /// Remove all probe targets
    Clear,
}

#[derive(Args, Debug)]
pub struct TargetsAddArgs {
    /// IPv4 address to add
    pub ip: String,
}
