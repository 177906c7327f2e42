//! # Configuration Structures
//!
//! The root [`Config`] entity of the replication daemon.
//!
//! All configuration structures:
//! - Hold every field as an `Option` until finalized
//! - Merge field by field, right-biased (see [`crate::precedence`])
//! - Serialize with `serde` under their markup key names

use crate::binder::{Fields, Stanza};
use crate::connection::ConnectionConfig;
use crate::defaults::*;
use crate::duration::serialize_opt;
use crate::error::BindError;
use crate::jobs::{ExcludeConfig, PrefixConfig, collapse_repeats};
use crate::normalizer::{CONNECTION_KEY, DESTINATION_CONNECTION_KEY};
use crate::precedence::{Finalize, Merge, pick};
use crate::signal::Signal;
use crate::stanzas::{SyslogConfig, WaitConfig};
use serde::Serialize;
use std::time::Duration;

/// Main configuration structure for the replication daemon.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Aggregates everything the daemon needs: where to read from, where to
/// write to, which prefixes to copy, and process-level settings.
///
/// ## Usage
/// ```rust
/// use replicate_config::{Config, Finalize, parse};
///
/// let mut config = parse("prefix = \"global/\"\nlog_level = \"INFO\"").unwrap().config;
/// config.finalize();
/// assert_eq!(config.log_level(), "INFO");
/// assert_eq!(config.prefixes()[0].destination.as_deref(), Some("global/"));
/// ```
///
/// ## Lifecycle
/// Born empty ([`Config::default`]) or as [`Config::with_defaults`],
/// populated by parsing, folded with [`Merge`], sealed by [`Finalize`].
/// After finalize every field, at every depth, is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    /// Connection to the source KV store (`consul`)
    #[serde(rename = "consul")]
    pub source_connection: Option<ConnectionConfig>,

    /// Connection to the destination KV store (`destination_consul`)
    #[serde(rename = "destination_consul")]
    pub destination_connection: Option<ConnectionConfig>,

    /// Prefixes excluded from replication
    #[serde(rename = "exclude")]
    pub excludes: Option<Vec<ExcludeConfig>>,

    /// Signal that stops the daemon
    pub kill_signal: Option<Signal>,

    /// Logging verbosity
    pub log_level: Option<String>,

    /// Maximum staleness allowed for reads from the source
    #[serde(serialize_with = "serialize_opt")]
    pub max_stale: Option<Duration>,

    /// Where the daemon writes its PID
    pub pid_file: Option<String>,

    /// Prefixes to replicate
    #[serde(rename = "prefix")]
    pub prefixes: Option<Vec<PrefixConfig>>,

    /// Signal that triggers a configuration reload
    pub reload_signal: Option<Signal>,

    /// KV path where replication status is stored
    pub status_dir: Option<String>,

    pub syslog: Option<SyslogConfig>,

    pub wait: Option<WaitConfig>,
}

impl Config {
    /// Shallow default tree: every nested stanza present with absent leaves.
    pub fn with_defaults() -> Self {
        Self {
            source_connection: Some(ConnectionConfig::with_defaults()),
            destination_connection: Some(ConnectionConfig::with_defaults()),
            excludes: Some(Vec::new()),
            prefixes: Some(Vec::new()),
            syslog: Some(SyslogConfig::default()),
            wait: Some(WaitConfig::default()),
            ..Default::default()
        }
    }

    /// Defaults merged with `other`, then finalized.
    pub fn finalized(other: &Config) -> Self {
        let mut config = Self::with_defaults().merge(other);
        config.finalize();
        config
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn max_stale(&self) -> Duration {
        self.max_stale.unwrap_or(DEFAULT_MAX_STALE)
    }

    pub fn kill_signal(&self) -> Signal {
        self.kill_signal.unwrap_or(DEFAULT_KILL_SIGNAL)
    }

    pub fn reload_signal(&self) -> Signal {
        self.reload_signal.unwrap_or(DEFAULT_RELOAD_SIGNAL)
    }

    pub fn pid_file(&self) -> &str {
        self.pid_file.as_deref().unwrap_or_default()
    }

    pub fn status_dir(&self) -> &str {
        self.status_dir.as_deref().unwrap_or(DEFAULT_STATUS_DIR)
    }

    pub fn prefixes(&self) -> &[PrefixConfig] {
        self.prefixes.as_deref().unwrap_or_default()
    }

    pub fn excludes(&self) -> &[ExcludeConfig] {
        self.excludes.as_deref().unwrap_or_default()
    }

    pub fn source_connection(&self) -> Option<&ConnectionConfig> {
        self.source_connection.as_ref()
    }

    pub fn destination_connection(&self) -> Option<&ConnectionConfig> {
        self.destination_connection.as_ref()
    }

    pub fn syslog(&self) -> Option<&SyslogConfig> {
        self.syslog.as_ref()
    }

    pub fn wait(&self) -> Option<&WaitConfig> {
        self.wait.as_ref()
    }
}

impl Merge for Config {
    fn merge(&self, other: &Self) -> Self {
        Self {
            source_connection: self.source_connection.merge(&other.source_connection),
            destination_connection: self
                .destination_connection
                .merge(&other.destination_connection),
            excludes: pick(&self.excludes, &other.excludes),
            kill_signal: pick(&self.kill_signal, &other.kill_signal),
            log_level: pick(&self.log_level, &other.log_level),
            max_stale: pick(&self.max_stale, &other.max_stale),
            pid_file: pick(&self.pid_file, &other.pid_file),
            prefixes: pick(&self.prefixes, &other.prefixes),
            reload_signal: pick(&self.reload_signal, &other.reload_signal),
            status_dir: pick(&self.status_dir, &other.status_dir),
            syslog: self.syslog.merge(&other.syslog),
            wait: self.wait.merge(&other.wait),
        }
    }
}

impl Finalize for Config {
    fn finalize(&mut self) {
        self.source_connection.finalize();
        self.destination_connection.finalize();
        self.excludes.finalize();
        self.kill_signal.get_or_insert(DEFAULT_KILL_SIGNAL);
        self.log_level.get_or_insert_with(default_log_level);
        self.max_stale.get_or_insert(DEFAULT_MAX_STALE);
        self.pid_file.get_or_insert_with(String::new);
        self.prefixes.finalize();
        self.reload_signal.get_or_insert(DEFAULT_RELOAD_SIGNAL);
        self.status_dir
            .get_or_insert_with(|| DEFAULT_STATUS_DIR.to_string());
        self.syslog.finalize();
        self.wait.finalize();
    }
}

impl Stanza for Config {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            source_connection: fields.get(CONNECTION_KEY)?,
            destination_connection: fields.get(DESTINATION_CONNECTION_KEY)?,
            excludes: fields
                .get::<Vec<ExcludeConfig>>("exclude")?
                .map(collapse_repeats),
            kill_signal: fields.get("kill_signal")?,
            log_level: fields.get("log_level")?,
            max_stale: fields.get("max_stale")?,
            pid_file: fields.get("pid_file")?,
            prefixes: fields
                .get::<Vec<PrefixConfig>>("prefix")?
                .map(collapse_repeats),
            reload_signal: fields.get("reload_signal")?,
            status_dir: fields.get("status_dir")?,
            syslog: fields.get("syslog")?,
            wait: fields.get("wait")?,
        })
    }
}
