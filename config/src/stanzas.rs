//! # Syslog and Wait Stanzas
//!
//! Small top-level stanzas that each accept a compact scalar form in
//! addition to the block form.

use crate::binder::{Fields, Stanza};
use crate::connection::present;
use crate::defaults::{DEFAULT_SYSLOG_FACILITY, DEFAULT_SYSLOG_NAME, WAIT_MAX_FACTOR};
use crate::duration::{format_duration, parse_duration, serialize_opt};
use crate::error::BindError;
use crate::precedence::{Finalize, Merge, pick};
use crate::rules::{FromValue, Rule, map_to_stanza};
use crate::value::Value;
use serde::Serialize;
use std::time::Duration;

/// Syslog output.
///
/// # M-CANONICAL-DOCS
///
/// ## Markup
/// ```text
/// syslog {
///   enabled  = true
///   facility = "LOCAL5"
///   name     = "replicator"
/// }
/// ```
/// `syslog = true` toggles output; `syslog = "LOCAL5"` sets the facility.
///
/// ## Defaults
/// - `enabled`: true when a facility was given, else false
/// - `facility`: "LOCAL0"
/// - `name`: "consul-replicate"
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyslogConfig {
    pub enabled: Option<bool>,
    pub facility: Option<String>,
    pub name: Option<String>,
}

impl Merge for SyslogConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &other.enabled),
            facility: pick(&self.facility, &other.facility),
            name: pick(&self.name, &other.name),
        }
    }
}

impl Finalize for SyslogConfig {
    fn finalize(&mut self) {
        self.enabled.get_or_insert(present(&self.facility));
        self.facility
            .get_or_insert_with(|| DEFAULT_SYSLOG_FACILITY.to_string());
        self.name.get_or_insert_with(|| DEFAULT_SYSLOG_NAME.to_string());
    }
}

fn syslog_shorthand(value: &Value, _path: &str) -> Result<Option<SyslogConfig>, BindError> {
    Ok(match value {
        Value::Bool(enabled) => Some(SyslogConfig {
            enabled: Some(*enabled),
            ..Default::default()
        }),
        Value::String(facility) => Some(SyslogConfig {
            facility: Some(facility.clone()),
            ..Default::default()
        }),
        _ => None,
    })
}

impl FromValue for SyslogConfig {
    const EXPECTED: &'static str = "syslog stanza";
    const RULES: &'static [Rule<Self>] = &[syslog_shorthand, map_to_stanza::<Self>];
}

impl Stanza for SyslogConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            enabled: fields.get("enabled")?,
            facility: fields.get("facility")?,
            name: fields.get("name")?,
        })
    }
}

/// Quiescence window: how long the KV data must be stable before it is
/// replicated.
///
/// `wait = "5s:20s"` sets min and max; `wait = "5s"` sets min only and lets
/// finalize derive max as four times min.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaitConfig {
    pub enabled: Option<bool>,
    #[serde(serialize_with = "serialize_opt")]
    pub min: Option<Duration>,
    #[serde(serialize_with = "serialize_opt")]
    pub max: Option<Duration>,
}

impl Merge for WaitConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &other.enabled),
            min: pick(&self.min, &other.min),
            max: pick(&self.max, &other.max),
        }
    }
}

impl Finalize for WaitConfig {
    fn finalize(&mut self) {
        let min = *self.min.get_or_insert(Duration::ZERO);
        self.enabled.get_or_insert(!min.is_zero());
        self.max.get_or_insert(min.saturating_mul(WAIT_MAX_FACTOR));
    }
}

/// `min[:max]` → wait window.
fn string_to_wait(value: &Value, path: &str) -> Result<Option<WaitConfig>, BindError> {
    let Some(s) = value.as_str() else {
        return Ok(None);
    };

    let invalid = |message: String| BindError::InvalidValue {
        path: path.to_string(),
        message,
    };
    let parse = |part: &str| parse_duration(part.trim()).map_err(|e| invalid(e.to_string()));

    let (min, max) = match s.split_once(':') {
        Some((min, max)) => (parse(min)?, Some(parse(max)?)),
        None => (parse(s)?, None),
    };
    if max.is_some_and(|max| max < min) {
        return Err(invalid(format!(
            "wait max ({}) is less than min ({})",
            format_duration(max.unwrap_or_default()),
            format_duration(min)
        )));
    }

    Ok(Some(WaitConfig {
        enabled: None,
        min: Some(min),
        max,
    }))
}

impl FromValue for WaitConfig {
    const EXPECTED: &'static str = "wait stanza";
    const RULES: &'static [Rule<Self>] = &[string_to_wait, map_to_stanza::<Self>];
}

impl Stanza for WaitConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            enabled: fields.get("enabled")?,
            min: fields.get("min")?,
            max: fields.get("max")?,
        })
    }
}
