//! Service configuration

use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::password::HashCost;

/// Configuration for the user service process
///
/// Loaded from `USER_SERVICE_*` environment variables:
/// - `USER_SERVICE_BIND_ADDR`: listen address (default: `0.0.0.0:50051`)
/// - `USER_SERVICE_REQUEST_TIMEOUT_SECS`: per-call deadline (default: 30)
/// - `USER_SERVICE_HASH_MEMORY_KIB`: Argon2 memory cost (default: 19456)
/// - `USER_SERVICE_HASH_ITERATIONS`: Argon2 time cost (default: 2)
/// - `USER_SERVICE_HASH_PARALLELISM`: Argon2 lanes (default: 1)
/// - `USER_SERVICE_RUN_MIGRATIONS`: apply the embedded schema on start (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub request_timeout_secs: u64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
    pub run_migrations: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = HashCost::default();

        let config = Config::builder()
            .set_default("bind_addr", "0.0.0.0:50051")?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("hash_memory_kib", i64::from(defaults.memory_kib))?
            .set_default("hash_iterations", i64::from(defaults.iterations))?
            .set_default("hash_parallelism", i64::from(defaults.parallelism))?
            .set_default("run_migrations", false)?
            .add_source(
                Environment::with_prefix("USER_SERVICE")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .context("failed to load service configuration")?;

        config
            .try_deserialize()
            .context("invalid service configuration")
    }

    /// Deadline applied to every RPC call; zero disables it
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
            parallelism: self.hash_parallelism,
        }
    }
}
