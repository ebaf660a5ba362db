//! Configuration management via environment variables
//!
//! Provides helper functions for reading `STATUSWATCH_*` environment
//! variables, plus the scheduler configuration assembled from them.

use std::path::PathBuf;
use std::time::Duration;

use crate::aggregator::MaintenancePolicy;

/// Default main cycle tick (seconds).
pub const DEFAULT_TICK_SECS: u64 = 60;

/// Default overdue sweep tick (seconds).
pub const DEFAULT_OVERDUE_SWEEP_SECS: u64 = 300;

/// Default number of checks probed in parallel within one chunk.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Default overdue grace, as a multiple of the main tick period.
pub const DEFAULT_OVERDUE_GRACE_MULTIPLE: u32 = 5;

/// Default probe log retention (days). `0` disables cleanup.
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 30;

/// Read an environment variable
///
/// Only the `STATUSWATCH_*` names are consulted. An empty value counts as unset.
///
/// # Example
/// ```
/// use statuswatch::config::env_var;
///
/// let url = env_var("STATUSWATCH_DATABASE_URL");
/// ```
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Read an environment variable with a default value
pub fn env_var_or(name: &str, default: &str) -> String {
    env_var(name).unwrap_or_else(|| default.to_string())
}

/// Read an environment variable, parsing to a specific type
///
/// Returns `default` if the variable is unset or fails to parse; a parse
/// failure is logged.
pub fn env_var_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env_var(name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(name, value = %raw, "Ignoring unparsable environment variable");
                default
            }
        },
        None => default,
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period of the main due-check cycle.
    pub tick_interval: Duration,
    /// Period of the overdue sweep.
    pub overdue_sweep_interval: Duration,
    /// Maximum number of probes running in parallel (chunk size).
    pub concurrency_limit: usize,
    /// A check is overdue once its due time is this many ticks in the past.
    pub overdue_grace_multiple: u32,
    /// Probe logs older than this many days are deleted during the sweep.
    pub log_retention_days: u32,
    /// How a stored `maintenance` status interacts with derivation.
    pub maintenance_policy: MaintenancePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            overdue_sweep_interval: Duration::from_secs(DEFAULT_OVERDUE_SWEEP_SECS),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            overdue_grace_multiple: DEFAULT_OVERDUE_GRACE_MULTIPLE,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            maintenance_policy: MaintenancePolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load scheduler configuration from environment variables.
    pub fn from_env() -> Self {
        let tick_secs = env_var_parse("STATUSWATCH_TICK_SECS", DEFAULT_TICK_SECS).max(1);
        let sweep_secs =
            env_var_parse("STATUSWATCH_OVERDUE_SWEEP_SECS", DEFAULT_OVERDUE_SWEEP_SECS).max(1);
        let concurrency_limit =
            env_var_parse("STATUSWATCH_CONCURRENCY_LIMIT", DEFAULT_CONCURRENCY_LIMIT).max(1);
        let overdue_grace_multiple = env_var_parse(
            "STATUSWATCH_OVERDUE_GRACE_MULTIPLE",
            DEFAULT_OVERDUE_GRACE_MULTIPLE,
        );
        let log_retention_days =
            env_var_parse("STATUSWATCH_LOG_RETENTION_DAYS", DEFAULT_LOG_RETENTION_DAYS);
        let maintenance_policy = env_var("STATUSWATCH_MAINTENANCE_POLICY")
            .and_then(|value| match value.parse() {
                Ok(policy) => Some(policy),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring invalid maintenance policy");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            tick_interval: Duration::from_secs(tick_secs),
            overdue_sweep_interval: Duration::from_secs(sweep_secs),
            concurrency_limit,
            overdue_grace_multiple,
            log_retention_days,
            maintenance_policy,
        }
    }

    /// Lateness after which a check counts as overdue.
    pub fn overdue_grace(&self) -> chrono::Duration {
        let millis = self.tick_interval.as_millis() as i64 * i64::from(self.overdue_grace_multiple);
        chrono::Duration::milliseconds(millis)
    }

    /// Probe log retention window, if cleanup is enabled.
    pub fn log_retention(&self) -> Option<chrono::Duration> {
        (self.log_retention_days > 0)
            .then(|| chrono::Duration::days(i64::from(self.log_retention_days)))
    }
}

/// Resolve the database URL.
///
/// `STATUSWATCH_DATABASE_URL` wins; otherwise the
/// database lives under `~/.statuswatch/`.
pub fn database_url() -> String {
    env_var("STATUSWATCH_DATABASE_URL").unwrap_or_else(|| {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        format!(
            "sqlite:{}",
            home.join(".statuswatch").join("statuswatch.db").display()
        )
    })
}
