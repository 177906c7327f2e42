//! # Conversion Rules
//!
//! Ordered strategy lists that turn a generic [`Value`] into a typed field.
//! Every destination type registers its rules through [`FromValue`]; each
//! rule either declines (`Ok(None)`), converts (`Ok(Some(_))`) or fails the
//! whole bind. When every rule declines, [`convert`] reports a type mismatch.

use crate::binder::{Stanza, bind_stanza};
use crate::duration::parse_duration;
use crate::error::BindError;
use crate::signal::Signal;
use crate::value::Value;
use std::time::Duration;

/// A single conversion attempt for destination type `T`.
pub(crate) type Rule<T> = fn(&Value, &str) -> Result<Option<T>, BindError>;

/// Destination types the binder knows how to populate.
pub(crate) trait FromValue: Sized + 'static {
    /// Name used in type mismatch errors.
    const EXPECTED: &'static str;

    /// Rules tried in order; the first one that converts wins.
    const RULES: &'static [Rule<Self>];
}

/// Run `T`'s rule chain over `value`.
pub(crate) fn convert<T: FromValue>(value: &Value, path: &str) -> Result<T, BindError> {
    for rule in T::RULES {
        if let Some(converted) = rule(value, path)? {
            return Ok(converted);
        }
    }
    Err(BindError::TypeMismatch {
        path: path.to_string(),
        expected: T::EXPECTED,
        found: value.kind(),
    })
}

/// mapping → stanza, binding its fields strictly.
pub(crate) fn map_to_stanza<T: Stanza>(value: &Value, path: &str) -> Result<Option<T>, BindError> {
    match value {
        Value::Map(map) => bind_stanza(map, path).map(Some),
        _ => Ok(None),
    }
}

fn string_identity(value: &Value, _path: &str) -> Result<Option<String>, BindError> {
    Ok(value.as_str().map(str::to_string))
}

fn bool_identity(value: &Value, _path: &str) -> Result<Option<bool>, BindError> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        _ => Ok(None),
    }
}

fn integer_to_unsigned(value: &Value, path: &str) -> Result<Option<u32>, BindError> {
    match value {
        Value::Integer(i) => u32::try_from(*i).map(Some).map_err(|_| BindError::InvalidValue {
            path: path.to_string(),
            message: format!("{} is out of range for an unsigned integer", i),
        }),
        _ => Ok(None),
    }
}

/// string → duration. An unparsable literal declines instead of failing so
/// the chain can end in a type mismatch naming the field.
fn string_to_duration(value: &Value, _path: &str) -> Result<Option<Duration>, BindError> {
    Ok(value.as_str().and_then(|s| parse_duration(s).ok()))
}

/// string → signal. Unknown names fail the whole bind.
fn string_to_signal(value: &Value, path: &str) -> Result<Option<Signal>, BindError> {
    match value.as_str() {
        Some(name) => name
            .parse::<Signal>()
            .map(Some)
            .map_err(|_| BindError::InvalidSignal {
                path: path.to_string(),
                value: name.to_string(),
            }),
        None => Ok(None),
    }
}

fn sequence_each<T: FromValue>(value: &Value, path: &str) -> Result<Option<Vec<T>>, BindError> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| convert(item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<T>, _>>()
            .map(Some),
        _ => Ok(None),
    }
}

fn mapping_as_single<T: FromValue>(value: &Value, path: &str) -> Result<Option<Vec<T>>, BindError> {
    match value {
        Value::Map(_) => Ok(Some(vec![convert(value, path)?])),
        _ => Ok(None),
    }
}

/// string → comma-delimited sequence, each part converted on its own.
fn string_to_delimited<T: FromValue>(
    value: &Value,
    path: &str,
) -> Result<Option<Vec<T>>, BindError> {
    match value.as_str() {
        Some(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .enumerate()
            .map(|(i, part)| convert(&Value::from(part), &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<T>, _>>()
            .map(Some),
        None => Ok(None),
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";
    const RULES: &'static [Rule<Self>] = &[string_identity];
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";
    const RULES: &'static [Rule<Self>] = &[bool_identity];
}

impl FromValue for u32 {
    const EXPECTED: &'static str = "unsigned integer";
    const RULES: &'static [Rule<Self>] = &[integer_to_unsigned];
}

impl FromValue for Duration {
    const EXPECTED: &'static str = "duration";
    const RULES: &'static [Rule<Self>] = &[string_to_duration];
}

impl FromValue for Signal {
    const EXPECTED: &'static str = "signal";
    const RULES: &'static [Rule<Self>] = &[string_to_signal];
}

impl<T: FromValue> FromValue for Vec<T> {
    const EXPECTED: &'static str = "sequence";
    const RULES: &'static [Rule<Self>] = &[
        sequence_each::<T>,
        mapping_as_single::<T>,
        string_to_delimited::<T>,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    #[test]
    fn test_duration_rule_declines_to_type_mismatch() {
        let ok: Duration = convert(&Value::from("5s"), "max_stale").unwrap();
        assert_eq!(ok, Duration::from_secs(5));

        let err = convert::<Duration>(&Value::from("soon"), "max_stale").unwrap_err();
        assert_eq!(
            err,
            BindError::TypeMismatch {
                path: "max_stale".to_string(),
                expected: "duration",
                found: "string",
            }
        );
    }

    #[test]
    fn test_signal_rule_fails_on_unknown_name() {
        let sig: Signal = convert(&Value::from("sigterm"), "kill_signal").unwrap();
        assert_eq!(sig, Signal::Term);

        let err = convert::<Signal>(&Value::from("SIGNOPE"), "kill_signal").unwrap_err();
        assert!(matches!(err, BindError::InvalidSignal { ref value, .. } if value == "SIGNOPE"));
    }

    #[test]
    fn test_unsigned_range() {
        assert_eq!(convert::<u32>(&Value::Integer(12), "n").unwrap(), 12);
        assert!(matches!(
            convert::<u32>(&Value::Integer(-1), "n"),
            Err(BindError::InvalidValue { .. })
        ));
        assert!(matches!(
            convert::<u32>(&Value::Float(1.5), "n"),
            Err(BindError::TypeMismatch { found: "float", .. })
        ));
    }

    #[test]
    fn test_sequence_rules() {
        let from_list: Vec<String> = convert(
            &Value::Sequence(vec![Value::from("a"), Value::from("b")]),
            "list",
        )
        .unwrap();
        assert_eq!(from_list, vec!["a", "b"]);

        let from_string: Vec<String> = convert(&Value::from("a, b,,c"), "list").unwrap();
        assert_eq!(from_string, vec!["a", "b", "c"]);

        let err = convert::<Vec<String>>(&Value::Sequence(vec![Value::Integer(1)]), "list")
            .unwrap_err();
        assert_eq!(err.path(), "list[0]");

        let err = convert::<Vec<String>>(&Value::Map(Map::new()), "list").unwrap_err();
        assert_eq!(err.path(), "list");
    }

    #[test]
    fn test_absent_is_not_converted() {
        let err = convert::<String>(&Value::Absent, "x").unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { found: "absent", .. }));
    }
}
