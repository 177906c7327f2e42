//! # Defaults Registry
//!
//! Static default values applied by `finalize`, plus the environment lookups
//! that may replace a static default when a field is otherwise unset.
//!
//! # Environment Variables
//! - `CR_LOG`: log level (checked first)
//! - `CONSUL_REPLICATE_LOG`: log level (fallback)

use crate::signal::Signal;
use std::env;
use std::time::Duration;

/// Default logging level.
pub const DEFAULT_LOG_LEVEL: &str = "WARN";

/// Environment variables consulted, in order, for the log level default.
pub const LOG_LEVEL_ENV_VARS: &[&str] = &["CR_LOG", "CONSUL_REPLICATE_LOG"];

/// Default staleness permitted. Stale reads are enabled by default for
/// performance.
pub const DEFAULT_MAX_STALE: Duration = Duration::from_secs(2);

pub const DEFAULT_RELOAD_SIGNAL: Signal = Signal::Hup;

pub const DEFAULT_KILL_SIGNAL: Signal = Signal::Int;

/// KV prefix under which replication status is recorded.
pub const DEFAULT_STATUS_DIR: &str = "service/consul-replicate/statuses";

pub const DEFAULT_RETRY_ENABLED: bool = true;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 12;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);
pub const DEFAULT_RETRY_MAX_BACKOFF: Duration = Duration::from_secs(60);

pub const DEFAULT_SSL_VERIFY: bool = true;

pub const DEFAULT_DIAL_KEEP_ALIVE: Duration = Duration::from_secs(30);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DISABLE_KEEP_ALIVES: bool = false;
pub const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_MAX_IDLE_CONNS: u32 = 100;
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_SYSLOG_FACILITY: &str = "LOCAL0";
pub const DEFAULT_SYSLOG_NAME: &str = "consul-replicate";

/// Multiplier deriving the maximum quiescence wait from the minimum.
pub const WAIT_MAX_FACTOR: u32 = 4;

/// Idle connections kept per host: one per available CPU, plus one.
pub fn default_max_idle_conns_per_host() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
        .saturating_add(1)
}

/// Log level default: the first non-empty variable in
/// [`LOG_LEVEL_ENV_VARS`], else [`DEFAULT_LOG_LEVEL`].
pub fn default_log_level() -> String {
    string_from_env(LOG_LEVEL_ENV_VARS, DEFAULT_LOG_LEVEL)
}

/// First non-empty (after trimming) value among `vars`, or `default`.
pub fn string_from_env(vars: &[&str], default: &str) -> String {
    vars.iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
