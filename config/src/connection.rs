//! # Connection Stanza
//!
//! Parameters for talking to a KV endpoint: address, credentials, TLS, retry
//! policy and HTTP transport tuning. Used for both the source and the
//! destination of replication.

use crate::binder::{Fields, Stanza};
use crate::defaults::*;
use crate::duration::serialize_opt;
use crate::error::BindError;
use crate::precedence::{Finalize, Merge, pick};
use crate::rules::{FromValue, Rule, map_to_stanza};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Connection parameters for one KV endpoint.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Everything the KV client collaborator needs to open a session.
///
/// ## Markup
/// ```text
/// consul {
///   address = "127.0.0.1:8500"
///   token   = "..."
///   auth      { username = "u", password = "p" }
///   retry     { attempts = 12, backoff = "250ms", max_backoff = "1m" }
///   ssl       { enabled = true, verify = true, ca_cert = "/etc/ca.pem" }
///   transport { dial_timeout = "30s" }
/// }
/// ```
/// A bare string (`consul = "127.0.0.1:8500"`) sets only the address.
///
/// ## Fields
/// - `address`: host:port of the agent (default: "")
/// - `token`: ACL token (default: "")
/// - `auth`, `retry`, `ssl`, `transport`: nested stanzas
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct ConnectionConfig {
    pub address: Option<String>,
    pub auth: Option<AuthConfig>,
    pub retry: Option<RetryConfig>,
    pub ssl: Option<SslConfig>,
    pub token: Option<String>,
    pub transport: Option<TransportConfig>,
}

impl ConnectionConfig {
    /// Shallow default: every nested stanza present, every leaf absent.
    pub fn with_defaults() -> Self {
        Self {
            auth: Some(AuthConfig::default()),
            retry: Some(RetryConfig::default()),
            ssl: Some(SslConfig::default()),
            transport: Some(TransportConfig::default()),
            ..Default::default()
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("auth", &self.auth)
            .field("retry", &self.retry)
            .field("ssl", &self.ssl)
            .field("token", &redacted(&self.token))
            .field("transport", &self.transport)
            .finish()
    }
}

impl Merge for ConnectionConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            address: pick(&self.address, &other.address),
            auth: self.auth.merge(&other.auth),
            retry: self.retry.merge(&other.retry),
            ssl: self.ssl.merge(&other.ssl),
            token: pick(&self.token, &other.token),
            transport: self.transport.merge(&other.transport),
        }
    }
}

impl Finalize for ConnectionConfig {
    fn finalize(&mut self) {
        self.address.get_or_insert_with(String::new);
        self.auth.finalize();
        self.retry.finalize();
        self.ssl.finalize();
        self.token.get_or_insert_with(String::new);
        self.transport.finalize();
    }
}

fn string_to_address(value: &Value, _path: &str) -> Result<Option<ConnectionConfig>, BindError> {
    Ok(value.as_str().map(|address| ConnectionConfig {
        address: Some(address.to_string()),
        ..Default::default()
    }))
}

impl FromValue for ConnectionConfig {
    const EXPECTED: &'static str = "connection stanza";
    const RULES: &'static [Rule<Self>] = &[string_to_address, map_to_stanza::<Self>];
}

impl Stanza for ConnectionConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            address: fields.get("address")?,
            auth: fields.get("auth")?,
            retry: fields.get("retry")?,
            ssl: fields.get("ssl")?,
            token: fields.get("token")?,
            transport: fields.get("transport")?,
        })
    }
}

/// HTTP basic authentication.
///
/// `enabled` defaults to true when a username or password was given. A bare
/// string `auth = "user:pass"` sets both credentials.
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct AuthConfig {
    pub enabled: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .finish()
    }
}

impl Merge for AuthConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &other.enabled),
            username: pick(&self.username, &other.username),
            password: pick(&self.password, &other.password),
        }
    }
}

impl Finalize for AuthConfig {
    fn finalize(&mut self) {
        let has_credentials = present(&self.username) || present(&self.password);
        self.enabled.get_or_insert(has_credentials);
        self.username.get_or_insert_with(String::new);
        self.password.get_or_insert_with(String::new);
    }
}

fn string_to_credentials(value: &Value, _path: &str) -> Result<Option<AuthConfig>, BindError> {
    Ok(value.as_str().map(|s| {
        let (username, password) = match s.split_once(':') {
            Some((user, pass)) => (user, Some(pass.to_string())),
            None => (s, None),
        };
        AuthConfig {
            enabled: None,
            username: Some(username.to_string()),
            password,
        }
    }))
}

impl FromValue for AuthConfig {
    const EXPECTED: &'static str = "auth stanza";
    const RULES: &'static [Rule<Self>] = &[string_to_credentials, map_to_stanza::<Self>];
}

impl Stanza for AuthConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            enabled: fields.get("enabled")?,
            username: fields.get("username")?,
            password: fields.get("password")?,
        })
    }
}

/// Retry policy for failed KV requests (exponential backoff).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryConfig {
    pub enabled: Option<bool>,
    pub attempts: Option<u32>,
    #[serde(serialize_with = "serialize_opt")]
    pub backoff: Option<Duration>,
    #[serde(serialize_with = "serialize_opt")]
    pub max_backoff: Option<Duration>,
}

impl Merge for RetryConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &other.enabled),
            attempts: pick(&self.attempts, &other.attempts),
            backoff: pick(&self.backoff, &other.backoff),
            max_backoff: pick(&self.max_backoff, &other.max_backoff),
        }
    }
}

impl Finalize for RetryConfig {
    fn finalize(&mut self) {
        self.enabled.get_or_insert(DEFAULT_RETRY_ENABLED);
        self.attempts.get_or_insert(DEFAULT_RETRY_ATTEMPTS);
        self.backoff.get_or_insert(DEFAULT_RETRY_BACKOFF);
        self.max_backoff.get_or_insert(DEFAULT_RETRY_MAX_BACKOFF);
    }
}

impl FromValue for RetryConfig {
    const EXPECTED: &'static str = "retry stanza";
    const RULES: &'static [Rule<Self>] = &[bool_to_enabled::<Self>, map_to_stanza::<Self>];
}

impl Stanza for RetryConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            enabled: fields.get("enabled")?,
            attempts: fields.get("attempts")?,
            backoff: fields.get("backoff")?,
            max_backoff: fields.get("max_backoff")?,
        })
    }
}

/// TLS settings.
///
/// `enabled` defaults to true when any certificate, key, CA or server name
/// was given; `verify` defaults to true.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SslConfig {
    pub enabled: Option<bool>,
    pub verify: Option<bool>,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub ca_cert: Option<String>,
    pub ca_path: Option<String>,
    pub server_name: Option<String>,
}

impl Merge for SslConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &other.enabled),
            verify: pick(&self.verify, &other.verify),
            cert: pick(&self.cert, &other.cert),
            key: pick(&self.key, &other.key),
            ca_cert: pick(&self.ca_cert, &other.ca_cert),
            ca_path: pick(&self.ca_path, &other.ca_path),
            server_name: pick(&self.server_name, &other.server_name),
        }
    }
}

impl Finalize for SslConfig {
    fn finalize(&mut self) {
        let has_material = [
            &self.cert,
            &self.key,
            &self.ca_cert,
            &self.ca_path,
            &self.server_name,
        ]
        .into_iter()
        .any(present);
        self.enabled.get_or_insert(has_material);
        self.verify.get_or_insert(DEFAULT_SSL_VERIFY);
        for field in [
            &mut self.cert,
            &mut self.key,
            &mut self.ca_cert,
            &mut self.ca_path,
            &mut self.server_name,
        ] {
            field.get_or_insert_with(String::new);
        }
    }
}

impl FromValue for SslConfig {
    const EXPECTED: &'static str = "ssl stanza";
    const RULES: &'static [Rule<Self>] = &[bool_to_enabled::<Self>, map_to_stanza::<Self>];
}

impl Stanza for SslConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            enabled: fields.get("enabled")?,
            verify: fields.get("verify")?,
            cert: fields.get("cert")?,
            key: fields.get("key")?,
            ca_cert: fields.get("ca_cert")?,
            ca_path: fields.get("ca_path")?,
            server_name: fields.get("server_name")?,
        })
    }
}

/// HTTP transport tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransportConfig {
    #[serde(serialize_with = "serialize_opt")]
    pub dial_keep_alive: Option<Duration>,
    #[serde(serialize_with = "serialize_opt")]
    pub dial_timeout: Option<Duration>,
    pub disable_keep_alives: Option<bool>,
    #[serde(serialize_with = "serialize_opt")]
    pub idle_conn_timeout: Option<Duration>,
    pub max_idle_conns: Option<u32>,
    pub max_idle_conns_per_host: Option<u32>,
    #[serde(serialize_with = "serialize_opt")]
    pub tls_handshake_timeout: Option<Duration>,
}

impl Merge for TransportConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            dial_keep_alive: pick(&self.dial_keep_alive, &other.dial_keep_alive),
            dial_timeout: pick(&self.dial_timeout, &other.dial_timeout),
            disable_keep_alives: pick(&self.disable_keep_alives, &other.disable_keep_alives),
            idle_conn_timeout: pick(&self.idle_conn_timeout, &other.idle_conn_timeout),
            max_idle_conns: pick(&self.max_idle_conns, &other.max_idle_conns),
            max_idle_conns_per_host: pick(
                &self.max_idle_conns_per_host,
                &other.max_idle_conns_per_host,
            ),
            tls_handshake_timeout: pick(&self.tls_handshake_timeout, &other.tls_handshake_timeout),
        }
    }
}

impl Finalize for TransportConfig {
    fn finalize(&mut self) {
        self.dial_keep_alive.get_or_insert(DEFAULT_DIAL_KEEP_ALIVE);
        self.dial_timeout.get_or_insert(DEFAULT_DIAL_TIMEOUT);
        self.disable_keep_alives.get_or_insert(DEFAULT_DISABLE_KEEP_ALIVES);
        self.idle_conn_timeout.get_or_insert(DEFAULT_IDLE_CONN_TIMEOUT);
        self.max_idle_conns.get_or_insert(DEFAULT_MAX_IDLE_CONNS);
        self.max_idle_conns_per_host
            .get_or_insert_with(default_max_idle_conns_per_host);
        self.tls_handshake_timeout.get_or_insert(DEFAULT_TLS_HANDSHAKE_TIMEOUT);
    }
}

impl FromValue for TransportConfig {
    const EXPECTED: &'static str = "transport stanza";
    const RULES: &'static [Rule<Self>] = &[map_to_stanza::<Self>];
}

impl Stanza for TransportConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            dial_keep_alive: fields.get("dial_keep_alive")?,
            dial_timeout: fields.get("dial_timeout")?,
            disable_keep_alives: fields.get("disable_keep_alives")?,
            idle_conn_timeout: fields.get("idle_conn_timeout")?,
            max_idle_conns: fields.get("max_idle_conns")?,
            max_idle_conns_per_host: fields.get("max_idle_conns_per_host")?,
            tls_handshake_timeout: fields.get("tls_handshake_timeout")?,
        })
    }
}

/// Stanzas with an `enabled` flag accept a bare bool as shorthand.
trait Toggle: Default {
    fn toggled(enabled: bool) -> Self;
}

impl Toggle for RetryConfig {
    fn toggled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }
}

impl Toggle for SslConfig {
    fn toggled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }
}

fn bool_to_enabled<T: Toggle>(value: &Value, _path: &str) -> Result<Option<T>, BindError> {
    match value {
        Value::Bool(b) => Ok(Some(T::toggled(*b))),
        _ => Ok(None),
    }
}

pub(crate) fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}
