//! Runtime Configuration
//!
//! `Args` is the command line / environment surface of the binary; `CoordinatorConfig`
//! is what the library consumes. Defaults: 12 hour leases,
//! 75% in-order selection, 10 store attempts, 999-row insert chunks.

use crate::lease::policy::SelectionPolicy;
use crate::registry::provision::split_range;
use crate::registry::types::NewUnit;
use crate::retry::RetryPolicy;
use crate::submission::committer::DEFAULT_CHUNK_SIZE;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub lease_duration: Duration,
    pub selection: SelectionPolicy,
    pub retry: RetryPolicy,
    pub insert_chunk_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lease_duration: DEFAULT_LEASE_DURATION,
            selection: SelectionPolicy::default(),
            retry: RetryPolicy::default(),
            insert_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "search-coordinator", about = "Leases search-space work units to workers")]
pub struct Args {
    /// Address the HTTP API listens on.
    #[arg(long, env = "COORDINATOR_BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// SQLite database file. Without it, state lives in memory only.
    #[arg(long, env = "COORDINATOR_DATABASE")]
    pub database: Option<PathBuf>,

    /// How long a lease stays exclusive.
    #[arg(long, env = "COORDINATOR_LEASE_SECS", default_value_t = 12 * 60 * 60)]
    pub lease_secs: u64,

    /// Probability of handing out the earliest eligible unit rather than a random one.
    #[arg(
        long,
        env = "COORDINATOR_SEQUENTIAL_PROBABILITY",
        default_value_t = 0.75,
        value_parser = parse_probability
    )]
    pub sequential_probability: f64,

    /// Attempts per store operation before reporting the store unavailable.
    #[arg(long, env = "COORDINATOR_RETRY_ATTEMPTS", default_value_t = 10)]
    pub retry_attempts: usize,

    #[arg(long, env = "COORDINATOR_RETRY_BASE_MS", default_value_t = 150)]
    pub retry_base_ms: u64,

    #[arg(long, env = "COORDINATOR_RETRY_MAX_MS", default_value_t = 5_000)]
    pub retry_max_ms: u64,

    /// Longest wait on a locked SQLite database before the store reports `Busy`.
    #[arg(long, env = "COORDINATOR_BUSY_TIMEOUT_MS", default_value_t = 250)]
    pub busy_timeout_ms: u64,

    /// Rows per atomic insert when committing results.
    #[arg(long, env = "COORDINATOR_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Interval of the progress log line; 0 disables it.
    #[arg(long, env = "COORDINATOR_STATS_INTERVAL_SECS", default_value_t = 60)]
    pub stats_interval_secs: u64,

    /// Provision units for this base at startup (requires the range flags).
    #[arg(long, requires_all = ["provision_start", "provision_end", "provision_unit_size"])]
    pub provision_base: Option<u32>,

    #[arg(long)]
    pub provision_start: Option<u64>,

    #[arg(long)]
    pub provision_end: Option<u64>,

    #[arg(long)]
    pub provision_unit_size: Option<u64>,
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.trim().parse().map_err(|e| format!("{}", e))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{} is not a probability in [0, 1]", raw));
    }
    Ok(value)
}

impl Args {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            lease_duration: Duration::from_secs(self.lease_secs),
            selection: SelectionPolicy::new(self.sequential_probability),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                base_delay: Duration::from_millis(self.retry_base_ms),
                max_delay: Duration::from_millis(self.retry_max_ms.max(self.retry_base_ms)),
            },
            insert_chunk_size: self.chunk_size.max(1),
        }
    }

    /// Units requested through the provisioning flags, if any.
    pub fn provision_plan(&self) -> Option<Vec<NewUnit>> {
        match (
            self.provision_base,
            self.provision_start,
            self.provision_end,
            self.provision_unit_size,
        ) {
            (Some(base), Some(start), Some(end), Some(unit_size)) => {
                Some(split_range(base, start, end, unit_size))
            }
            _ => None,
        }
    }
}
