//! Duration literals such as `250ms`, `1m30s` or `1.5h`.
//!
//! Format: an optional sign followed by one or more `<decimal><unit>` terms,
//! with units `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
//! Negative durations are rejected because the model stores
//! [`std::time::Duration`].
//!
//! Only string literals bind to duration fields. A bare integer such as
//! `max_stale = 5` is a type mismatch rather than a count of nanoseconds.

use serde::Serializer;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct InvalidDuration {
    pub input: String,
    pub reason: &'static str,
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a duration literal.
pub fn parse_duration(input: &str) -> Result<Duration, InvalidDuration> {
    let invalid = |reason| InvalidDuration {
        input: input.to_string(),
        reason,
    };

    let mut rest = input.trim();
    let negative = match rest.chars().next() {
        Some('-') => {
            rest = &rest[1..];
            true
        }
        Some('+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let whole_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let whole = &rest[..whole_len];
        rest = &rest[whole_len..];

        let mut fraction = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            fraction = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("expected a number"));
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        if unit.is_empty() {
            return Err(invalid("missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| invalid("unknown unit"))?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("number out of range"))?
        };
        let mut term = whole.checked_mul(scale).ok_or_else(|| invalid("overflow"))?;

        // Fractional digits beyond nanosecond precision are dropped.
        let mut divisor: u128 = 1;
        let mut numerator: u128 = 0;
        for digit in fraction.chars().take(18) {
            numerator = numerator * 10 + u128::from(digit as u8 - b'0');
            divisor *= 10;
        }
        term = term
            .checked_add(numerator * scale / divisor)
            .ok_or_else(|| invalid("overflow"))?;

        total = total.checked_add(term).ok_or_else(|| invalid("overflow"))?;
    }

    if negative && total != 0 {
        return Err(invalid("negative durations are not allowed"));
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| invalid("overflow"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Render a duration in the same literal format `parse_duration` accepts,
/// e.g. `250ms`, `2m0s`, `1h0m30s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let total_secs = nanos / NANOS_PER_SEC;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let second_nanos = nanos % (60 * NANOS_PER_SEC);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}s", decimal(second_nanos, NANOS_PER_SEC)));
    out
}

fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let digits = format!("{:0width$}", fraction, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

pub(crate) fn serialize_opt<S: Serializer>(
    value: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => s.serialize_str(&format_duration(*d)),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("7ns").unwrap(), Duration::from_nanos(7));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1h2m3.25s").unwrap(), Duration::from_millis(3_723_250));
        assert_eq!(parse_duration("-0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in ["", "5", "s", "5x", "1.s.", "-1s", "abc", "1m-3s"] {
            assert!(parse_duration(input).is_err(), "{:?} should not parse", input);
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let huge = u128::MAX / 3_600_000_000_000;
        let err = parse_duration(&format!("{}.9999h", huge)).unwrap_err();
        assert_eq!(err.reason, "overflow");

        let err = parse_duration(&format!("{}h1h", huge)).unwrap_err();
        assert_eq!(err.reason, "overflow");
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
        assert_eq!(format_duration(Duration::from_micros(1)), "1µs");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m0s");
        assert_eq!(format_duration(Duration::from_secs(3_630)), "1h0m30s");
    }

    #[test]
    fn test_format_parses_back() {
        for d in [
            Duration::from_millis(250),
            Duration::from_secs(90),
            Duration::from_secs(3_600 * 26 + 7),
        ] {
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }
}
