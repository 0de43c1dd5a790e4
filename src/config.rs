//! Run parameters for the simulation harness, loadable from a TOML file
//! (teacher's `config` crate, as `configurations.rs` used for network
//! topology) and overridable from the CLI. None of this configures a real
//! network or persisted state (§1 Non-goals) - only the simulation's own
//! knobs: how many replicas to spawn, the default `await` step budget, and
//! the RNG seed that makes a run reproducible (§5).
use serde_derive::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Number of replica processes to spawn, in addition to the one
    /// client at pid 0.
    #[serde(default = "default_replica_count")]
    pub replica_count: usize,

    /// Step budget handed to `await_futures` when a caller does not pick
    /// one explicitly.
    #[serde(default = "default_await_budget")]
    pub await_budget: usize,

    /// Seed for the simulation's random stepper, so a failing run can be
    /// replayed exactly.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_replica_count() -> usize {
    3
}

fn default_await_budget() -> usize {
    crate::future::DEFAULT_AWAIT_BUDGET
}

fn default_seed() -> u64 {
    0xC0FFEE
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            replica_count: default_replica_count(),
            await_budget: default_await_budget(),
            seed: default_seed(),
        }
    }
}

impl SimConfig {
    /// Loads a `SimConfig` from `file_name` (extension-less, as the
    /// `config` crate expects), falling back to defaults for any field the
    /// file omits.
    pub fn from_file(file_name: &str) -> Result<Self> {
        let mut settings = config::Config::default();
        settings.merge(config::File::with_name(file_name))?;
        Ok(settings.try_into()?)
    }
}
