//! Nanosecond durations and timestamps in text form.
//!
//! Durations are written as a sequence of `<number><unit>` terms with the
//! units `ns`, `us`, `ms`, `s`, `m`, `h`, `d`, `w` and `y` (365 days), for
//! example `1h30m` or `-2.5s`. Times are RFC 3339 in UTC.
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ZedError, ZedResult};

pub const NANOSECOND: i64 = 1;
pub const MICROSECOND: i64 = 1_000;
pub const MILLISECOND: i64 = 1_000_000;
pub const SECOND: i64 = 1_000_000_000;
pub const MINUTE: i64 = 60 * SECOND;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;
pub const WEEK: i64 = 7 * DAY;
pub const YEAR: i64 = 365 * DAY;

const UNITS: &[(&str, i64)] = &[
    ("ns", NANOSECOND),
    ("us", MICROSECOND),
    ("µs", MICROSECOND),
    ("ms", MILLISECOND),
    ("s", SECOND),
    ("m", MINUTE),
    ("h", HOUR),
    ("d", DAY),
    ("w", WEEK),
    ("y", YEAR),
];

fn bad_duration(s: &str) -> ZedError {
    ZedError::BadValue(format!("invalid duration '{s}'"))
}

/// Parse a duration into nanoseconds.
pub fn parse_duration(s: &str) -> ZedResult<i64> {
    let (neg, mut rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest.is_empty() {
        return Err(bad_duration(s));
    }
    if rest == "0" {
        return Ok(0);
    }
    let mut total: i128 = 0;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| bad_duration(s))?;
        let (num, tail) = rest.split_at(num_len);
        if num.is_empty() {
            return Err(bad_duration(s));
        }
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| bad_duration(s))?;

        let (whole, frac) = num.split_once('.').unwrap_or((num, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(bad_duration(s));
        }
        let whole: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| bad_duration(s))?
        };
        total += whole * scale as i128;
        let mut unit_scale = scale as i128;
        for digit in frac.chars() {
            unit_scale /= 10;
            total += digit.to_digit(10).ok_or_else(|| bad_duration(s))? as i128 * unit_scale;
        }
        if total > i64::MAX as i128 + 1 {
            return Err(bad_duration(s));
        }
        rest = tail;
    }
    let total = if neg { -total } else { total };
    i64::try_from(total).map_err(|_| bad_duration(s))
}

/// Format nanoseconds as a duration, e.g. `1d2h3m4.5s` or `250ms`.
pub fn format_duration(ns: i64) -> String {
    if ns == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    if ns < 0 {
        out.push('-');
    }
    let mut d = ns.unsigned_abs();
    if d < SECOND as u64 {
        let (unit, scale) = if d < MICROSECOND as u64 {
            ("ns", 1)
        } else if d < MILLISECOND as u64 {
            ("us", MICROSECOND as u64)
        } else {
            ("ms", MILLISECOND as u64)
        };
        push_fraction(&mut out, d / scale, d % scale, scale);
        out.push_str(unit);
        return out;
    }
    for (unit, scale) in [("y", YEAR), ("d", DAY), ("h", HOUR), ("m", MINUTE)] {
        let scale = scale as u64;
        if d >= scale {
            out.push_str(&(d / scale).to_string());
            out.push_str(unit);
            d %= scale;
        }
    }
    if d > 0 {
        push_fraction(&mut out, d / SECOND as u64, d % SECOND as u64, SECOND as u64);
        out.push('s');
    }
    out
}

fn push_fraction(out: &mut String, whole: u64, frac: u64, scale: u64) {
    out.push_str(&whole.to_string());
    if frac > 0 {
        let width = scale.to_string().len() - 1;
        let digits = format!("{frac:0width$}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
}

/// Parse an RFC 3339 timestamp into nanoseconds since the epoch.
pub fn parse_time(s: &str) -> ZedResult<i64> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| ZedError::BadValue(format!("invalid time '{s}': {e}")))?;
    dt.timestamp_nanos_opt()
        .ok_or_else(|| ZedError::BadValue(format!("time '{s}' out of range")))
}

pub fn to_datetime(ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(ns)
}

/// Format nanoseconds since the epoch as RFC 3339 UTC.
pub fn format_time(ns: i64) -> String {
    to_datetime(ns).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Truncate `ts` down to a multiple of `bin` (both in nanoseconds).
pub fn truncate(ts: i64, bin: i64) -> i64 {
    if bin <= 0 {
        return ts;
    }
    ts - ts.rem_euclid(bin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("1h30m").unwrap(), HOUR + 30 * MINUTE);
        assert_eq!(parse_duration("-2.5s").unwrap(), -2_500_000_000);
        assert_eq!(parse_duration("1d").unwrap(), DAY);
        assert_eq!(parse_duration("10us").unwrap(), 10_000);
        assert_eq!(parse_duration("0").unwrap(), 0);
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("1x").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn durations_format() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(HOUR + 30 * MINUTE), "1h30m");
        assert_eq!(format_duration(-2_500_000_000), "-2.5s");
        assert_eq!(format_duration(250 * MILLISECOND), "250ms");
        assert_eq!(format_duration(1_500), "1.5us");
        assert_eq!(format_duration(DAY + 2 * SECOND), "1d2s");
        for ns in [1, 999, 1_234_567, 3 * WEEK + 7, -YEAR] {
            assert_eq!(parse_duration(&format_duration(ns)).unwrap(), ns);
        }
    }

    #[test]
    fn times() {
        let ns = parse_time("2021-06-01T12:00:00Z").unwrap();
        assert_eq!(format_time(ns), "2021-06-01T12:00:00Z");
        let ns = parse_time("1970-01-01T00:00:01.5+00:00").unwrap();
        assert_eq!(ns, 1_500_000_000);
        assert_eq!(format_time(ns), "1970-01-01T00:00:01.500Z");
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate(125, 60), 120);
        assert_eq!(truncate(-1, 60), -60);
        assert_eq!(truncate(5, 0), 5);
    }
}
