//! # Tree Normalization
//!
//! Rewrites the decoded tree into the shape the binder expects, in two fixed
//! passes:
//!
//! 1. **Block flattening**: keys known to be single nested stanzas collapse
//!    their sequence-of-blocks encoding to the *last* block. Repeating a
//!    stanza is therefore last-write-wins, not an error.
//! 2. **Legacy key promotion**: deprecated top-level keys move into the
//!    connection stanza, each producing a [`Deprecation`].
//!
//! Flattening runs first because promoted values land inside the connection
//! stanza, which must already be a plain mapping.

use crate::value::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Markup key of the source connection stanza.
pub const CONNECTION_KEY: &str = "consul";

/// Markup key of the destination connection stanza.
pub const DESTINATION_CONNECTION_KEY: &str = "destination_consul";

/// Dotted key paths whose values are single nested stanzas.
pub const FLATTEN_KEYS: &[&str] = &[
    "consul",
    "consul.auth",
    "consul.retry",
    "consul.ssl",
    "consul.transport",
    "destination_consul",
    "destination_consul.auth",
    "destination_consul.retry",
    "destination_consul.ssl",
    "destination_consul.transport",
    "syslog",
    "wait",
];

/// Deprecated top-level keys that are still accepted.
const LEGACY_BLOCK_KEYS: &[&str] = &["auth", "ssl", "retry"];

/// A deprecated construct found while normalizing.
///
/// Returned as data instead of being logged so normalization stays pure; the
/// file loader reports them at WARN level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
    /// The deprecated top-level key.
    pub key: String,

    /// Where the value now lives, `None` when it was dropped.
    pub replacement: Option<String>,

    /// Migration hint for the operator.
    pub message: String,
}

impl fmt::Display for Deprecation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Run both normalization passes over a decoded root mapping.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Turns the ambiguous decoded shape into the current nested layout.
/// Running it twice is a no-op the second time.
///
/// ## Usage
/// ```rust
/// use replicate_config::decoder::decode;
/// use replicate_config::normalizer::normalize;
///
/// let mut root = decode("token = \"abc\"").unwrap();
/// let deprecations = normalize(&mut root);
/// assert_eq!(deprecations.len(), 1);
/// assert!(!root.contains_key("token"));
/// ```
pub fn normalize(root: &mut Map) -> Vec<Deprecation> {
    flatten_keys(root, FLATTEN_KEYS);
    promote_legacy_keys(root)
}

/// Collapse sequence-of-block values under the given dotted paths.
///
/// A non-empty sequence of mappings becomes its last element (recursed into
/// with the dotted path as parent). An empty sequence becomes
/// [`Value::Absent`] so "declared but empty" stays distinguishable from
/// "never declared". Plain mappings are recursed into; every other value
/// passes through.
pub fn flatten_keys(root: &mut Map, keys: &[&str]) {
    let keys: HashSet<&str> = keys.iter().copied().collect();
    flatten(root, "", &keys);
}

fn flatten(map: &mut Map, parent: &str, keys: &HashSet<&str>) {
    for (key, value) in map.iter_mut() {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", parent, key)
        };
        if !keys.contains(path.as_str()) {
            continue;
        }

        let replacement = match value {
            Value::Sequence(items) if items.iter().all(|v| matches!(v, Value::Map(_))) => {
                match items.pop() {
                    Some(Value::Map(mut last)) => {
                        flatten(&mut last, &path, keys);
                        Some(Value::Map(last))
                    }
                    _ => Some(Value::Absent),
                }
            }
            Value::Map(inner) => {
                flatten(inner, &path, keys);
                None
            }
            _ => None,
        };

        if let Some(replacement) = replacement {
            *value = replacement;
        }
    }
}

/// Move deprecated top-level keys to their current home.
pub fn promote_legacy_keys(root: &mut Map) -> Vec<Deprecation> {
    let mut deprecations = Vec::new();

    flatten_keys(root, LEGACY_BLOCK_KEYS);

    if let Some(auth) = root.remove("auth") {
        deprecations.push(Deprecation {
            key: "auth".to_string(),
            replacement: Some("consul.auth".to_string()),
            message: "auth is now a child stanza inside consul instead of a top-level stanza. \
                      Update your configuration files and change auth {} to \
                      consul { auth { ... } } instead."
                .to_string(),
        });
        relocate(root, "auth", auth);
    }

    if root.remove("path").is_some() {
        deprecations.push(Deprecation {
            key: "path".to_string(),
            replacement: None,
            message: "path is no longer a key in the configuration. Please remove it and \
                      use the CLI option instead."
                .to_string(),
        });
    }

    if let Some(retry) = root.remove("retry") {
        deprecations.push(Deprecation {
            key: "retry".to_string(),
            replacement: Some("consul.retry".to_string()),
            message: "retry is now a child stanza for consul instead of a top-level stanza. \
                      Update your configuration files and change retry {} to \
                      consul { retry { ... } } instead."
                .to_string(),
        });
        let retry = match retry {
            stanza @ (Value::Map(_) | Value::Absent) => stanza,
            scalar => {
                let mut stanza = Map::new();
                stanza.insert("backoff".to_string(), scalar.clone());
                stanza.insert("max_backoff".to_string(), scalar);
                Value::Map(stanza)
            }
        };
        relocate(root, "retry", retry);
    }

    if let Some(ssl) = root.remove("ssl") {
        deprecations.push(Deprecation {
            key: "ssl".to_string(),
            replacement: Some("consul.ssl".to_string()),
            message: "ssl is now a child stanza for consul instead of a top-level stanza. \
                      Update your configuration files and change ssl {} to \
                      consul { ssl { ... } } instead."
                .to_string(),
        });
        relocate(root, "ssl", ssl);
    }

    if let Some(token) = root.remove("token") {
        deprecations.push(Deprecation {
            key: "token".to_string(),
            replacement: Some("consul.token".to_string()),
            message: "token is now a child key inside consul instead of a top-level key. \
                      Update your configuration files and change token = \"...\" to \
                      consul { token = \"...\" } instead."
                .to_string(),
        });
        relocate(root, "token", token);
    }

    deprecations
}

/// Insert `value` under `consul.<child>`, replacing whatever was there.
fn relocate(root: &mut Map, child: &str, value: Value) {
    let mut stanza = match root.remove(CONNECTION_KEY) {
        Some(Value::Map(stanza)) => stanza,
        Some(Value::String(address)) => {
            let mut stanza = Map::new();
            stanza.insert("address".to_string(), Value::String(address));
            stanza
        }
        _ => Map::new(),
    };
    stanza.insert(child.to_string(), value);
    root.insert(CONNECTION_KEY.to_string(), Value::Map(stanza));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn stanza<'a>(root: &'a Map, key: &str) -> &'a Map {
        root[key].as_map().expect("flattened stanza")
    }

    #[test]
    fn test_flatten_takes_last_block() {
        let mut root = decode(
            r#"
            wait { min = "1s" }
            wait { min = "2s" }
            "#,
        )
        .unwrap();
        normalize(&mut root);
        assert_eq!(stanza(&root, "wait")["min"], Value::from("2s"));
    }

    #[test]
    fn test_flatten_recurses_into_nested_stanzas() {
        let mut root = decode(
            r#"
            consul {
              retry { attempts = 1 }
              retry { attempts = 2 }
              ssl { enabled = true }
            }
            "#,
        )
        .unwrap();
        normalize(&mut root);
        let consul = stanza(&root, "consul");
        assert_eq!(stanza(consul, "retry")["attempts"], Value::Integer(2));
        assert_eq!(stanza(consul, "ssl")["enabled"], Value::Bool(true));
    }

    #[test]
    fn test_flatten_leaves_other_keys_alone() {
        let mut root = decode(
            r#"
            prefix { source = "a/" }
            prefix { source = "b/" }
            consul {
              unknown { x = 1 }
            }
            "#,
        )
        .unwrap();
        normalize(&mut root);
        assert!(matches!(&root["prefix"], Value::Sequence(items) if items.len() == 2));
        let consul = stanza(&root, "consul");
        assert!(consul["unknown"].is_block_sequence());
    }

    #[test]
    fn test_flatten_empty_sequence_becomes_absent() {
        let mut root = Map::new();
        root.insert("wait".to_string(), Value::Sequence(vec![]));
        root.insert("prefix".to_string(), Value::Sequence(vec![]));
        normalize(&mut root);
        assert_eq!(root["wait"], Value::Absent);
        assert_eq!(root["prefix"], Value::Sequence(vec![]));
    }

    #[test]
    fn test_flatten_passes_scalars_through() {
        let mut root = decode(r#"consul = "127.0.0.1:8500""#).unwrap();
        normalize(&mut root);
        assert_eq!(root["consul"], Value::from("127.0.0.1:8500"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut root = decode(
            r#"
            consul { retry { attempts = 3 } }
            token = "abc"
            retry = "5s"
            path = "ignored"
            "#,
        )
        .unwrap();
        let first = normalize(&mut root);
        let snapshot = root.clone();
        let second = normalize(&mut root);
        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
        assert_eq!(root, snapshot);
    }

    #[test]
    fn test_promote_token() {
        let mut root = decode(r#"token = "abc""#).unwrap();
        let deprecations = normalize(&mut root);
        assert!(!root.contains_key("token"));
        assert_eq!(stanza(&root, "consul")["token"], Value::from("abc"));
        assert_eq!(deprecations.len(), 1);
        assert_eq!(deprecations[0].key, "token");
        assert_eq!(deprecations[0].replacement.as_deref(), Some("consul.token"));
    }

    #[test]
    fn test_promote_auth_and_ssl_blocks() {
        let mut root = decode(
            r#"
            consul { address = "10.0.0.1:8500" }
            auth { username = "old" }
            auth { username = "user" }
            ssl { verify = false }
            "#,
        )
        .unwrap();
        let deprecations = normalize(&mut root);
        let consul = stanza(&root, "consul");
        assert_eq!(consul["address"], Value::from("10.0.0.1:8500"));
        assert_eq!(stanza(consul, "auth")["username"], Value::from("user"));
        assert_eq!(stanza(consul, "ssl")["verify"], Value::Bool(false));
        let keys: Vec<&str> = deprecations.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["auth", "ssl"]);
    }

    #[test]
    fn test_promote_retry_scalar_fills_both_backoffs() {
        let mut root = decode(r#"retry = "10s""#).unwrap();
        normalize(&mut root);
        let retry = stanza(stanza(&root, "consul"), "retry");
        assert_eq!(retry["backoff"], Value::from("10s"));
        assert_eq!(retry["max_backoff"], Value::from("10s"));
    }

    #[test]
    fn test_promote_retry_block_moves_as_is() {
        let mut root = decode("retry { attempts = 4 }").unwrap();
        normalize(&mut root);
        let retry = stanza(stanza(&root, "consul"), "retry");
        assert_eq!(retry["attempts"], Value::Integer(4));
        assert!(!retry.contains_key("backoff"));
    }

    #[test]
    fn test_legacy_value_overrides_nested_value() {
        let mut root = decode(
            r#"
            consul { token = "modern" }
            token = "legacy"
            "#,
        )
        .unwrap();
        normalize(&mut root);
        assert_eq!(stanza(&root, "consul")["token"], Value::from("legacy"));
    }

    #[test]
    fn test_promote_expands_connection_shorthand() {
        let mut root = decode("consul = \"127.0.0.1:8500\"\ntoken = \"abc\"\n").unwrap();
        normalize(&mut root);
        let consul = stanza(&root, "consul");
        assert_eq!(consul["address"], Value::from("127.0.0.1:8500"));
        assert_eq!(consul["token"], Value::from("abc"));
    }

    #[test]
    fn test_path_is_dropped_with_warning() {
        let mut root = decode(r#"path = "global/""#).unwrap();
        let deprecations = normalize(&mut root);
        assert!(root.is_empty());
        assert_eq!(deprecations.len(), 1);
        assert_eq!(deprecations[0].replacement, None);
        assert!(deprecations[0].to_string().contains("CLI"));
    }
}
