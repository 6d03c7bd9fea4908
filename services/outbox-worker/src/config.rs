use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;
use uuid::Uuid;

use soba_core::config::Config;

use crate::usecase::worker::WorkerSettings;

/// Outbox worker configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Sleep between loop iterations. Env var: `OUTBOX_POLL_INTERVAL_MS`.
    #[serde(default = "default_poll_interval_ms")]
    pub outbox_poll_interval_ms: u64,
    /// Max records claimed per iteration. Env var: `OUTBOX_BATCH_SIZE`.
    #[serde(default = "default_batch_size")]
    pub outbox_batch_size: u64,
    /// Upper bound on a single adapter call.
    #[serde(default = "default_adapter_timeout_ms")]
    pub outbox_adapter_timeout_ms: u64,
    /// `processing` rows untouched for longer than this go back to `pending`.
    /// 0 disables reclaiming.
    #[serde(default = "default_lease_timeout_ms")]
    pub outbox_lease_timeout_ms: u64,
    /// `done` rows older than this are purged. Unset keeps them forever.
    #[serde(default)]
    pub outbox_retention_hours: Option<u64>,
    #[serde(default = "default_attempt_warn_threshold")]
    pub outbox_attempt_warn_threshold: i32,
    /// Consecutive unavailable-store claim errors tolerated before exiting.
    #[serde(default = "default_max_store_failures")]
    pub outbox_max_store_failures: u32,
    /// Stamped into `updated_by` on rows the worker touches.
    #[serde(default)]
    pub system_actor_id: Option<Uuid>,
    /// Ops HTTP port (default 3120). Env var: `WORKER_PORT`.
    #[serde(default = "default_worker_port")]
    pub worker_port: u16,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_batch_size() -> u64 {
    25
}

fn default_adapter_timeout_ms() -> u64 {
    30_000
}

fn default_lease_timeout_ms() -> u64 {
    900_000
}

fn default_attempt_warn_threshold() -> i32 {
    10
}

fn default_max_store_failures() -> u32 {
    5
}

fn default_worker_port() -> u16 {
    3120
}

impl Config for WorkerConfig {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerConfigError {
    /// A lease is renewed before each item, so it must outlast one adapter call.
    #[error(
        "OUTBOX_LEASE_TIMEOUT_MS ({lease_ms}) must be greater than OUTBOX_ADAPTER_TIMEOUT_MS ({adapter_ms})"
    )]
    LeaseNotLongerThanAdapterTimeout { lease_ms: u64, adapter_ms: u64 },
}

impl WorkerConfig {
    /// Cross-field checks envy cannot express.
    pub fn validate(&self) -> Result<(), WorkerConfigError> {
        let lease_ms = self.outbox_lease_timeout_ms;
        let adapter_ms = self.outbox_adapter_timeout_ms;
        if lease_ms != 0 && lease_ms <= adapter_ms {
            return Err(WorkerConfigError::LeaseNotLongerThanAdapterTimeout {
                lease_ms,
                adapter_ms,
            });
        }
        Ok(())
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.outbox_adapter_timeout_ms)
    }

    pub fn settings(&self) -> WorkerSettings {
        let lease_timeout = match self.outbox_lease_timeout_ms {
            0 => None,
            ms => Some(millis(ms)),
        };
        let retention = self
            .outbox_retention_hours
            .map(|h| millis(h.saturating_mul(3_600_000)));
        WorkerSettings {
            poll_interval: Duration::from_millis(self.outbox_poll_interval_ms),
            batch_size: self.outbox_batch_size.max(1),
            lease_timeout,
            retention,
            attempt_warn_threshold: self.outbox_attempt_warn_threshold,
            max_store_failures: self.outbox_max_store_failures,
        }
    }
}

fn millis(ms: u64) -> TimeDelta {
    TimeDelta::try_milliseconds(i64::try_from(ms).unwrap_or(i64::MAX)).unwrap_or(TimeDelta::MAX)
}
