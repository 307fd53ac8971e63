//! Canonical text forms for scalars that have more than one obvious rendering:
//! durations, timestamps and floats.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Render a duration the way `2m0.000000022s`, `1h0m0s` or `500ms` read.
///
/// Sub-second values pick the largest unit that keeps a whole part.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_nanos();
    if total == 0 {
        return "0s".to_string();
    }
    if total < NANOS_PER_SEC {
        let (unit, scale) = if total < 1_000 {
            ("ns", 1)
        } else if total < 1_000_000 {
            ("µs", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{unit}", decimal(total, scale));
    }

    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if h > 0 || m > 0 {
        out.push_str(&format!("{m}m"));
    }
    let sub = u128::from(s) * NANOS_PER_SEC + u128::from(d.subsec_nanos());
    out.push_str(&decimal(sub, NANOS_PER_SEC));
    out.push('s');
    out
}

/// Render a duration as seconds with 0, 3, 6 or 9 fractional digits: `120.000000022s`.
pub fn format_duration_seconds(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return format!("{}s", d.as_secs());
    }
    let mut frac = format!("{nanos:09}");
    while frac.ends_with("000") {
        frac.truncate(frac.len() - 3);
    }
    format!("{}.{frac}s", d.as_secs())
}

/// `value / scale` as a decimal with trailing zeros trimmed.
fn decimal(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let rem = value % scale;
    if rem == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let frac = format!("{rem:0width$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Parse a duration such as `1h30m`, `2m0.000000022s`, `120.5s` or `250ms`.
///
/// A bare `0` is accepted; any other number needs a unit.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let input = s.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err("empty duration".into());
    }

    let mut total: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{input}'"))?;
        if num_end == 0 {
            return Err(format!("invalid duration '{input}'"));
        }
        let (number, after) = rest.split_at(num_end);
        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_end);
        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            other => return Err(format!("unknown unit '{other}' in duration '{input}'")),
        };
        let part = scaled(number, scale).ok_or_else(|| format!("invalid duration '{input}'"))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("duration '{input}' is out of range"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| format!("duration '{input}' is out of range"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

fn scaled(number: &str, scale: u128) -> Option<u128> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.checked_mul(scale)?;
    let frac = &frac[..frac.len().min(20)];
    if !frac.is_empty() {
        let digits: u128 = frac.parse().ok()?;
        let denom = 10u128.pow(frac.len() as u32);
        value = value.checked_add(digits.checked_mul(scale)? / denom)?;
    }
    Some(value)
}

/// RFC 3339 in UTC with as many fractional digits as needed: `1970-01-01T00:00:20.000000002Z`.
///
/// `None` outside years 0 to 9999, which RFC 3339 cannot write.
pub fn format_timestamp(t: SystemTime) -> Option<String> {
    let utc = timestamp_utc(t)?;
    (0..=9999)
        .contains(&utc.year())
        .then(|| utc.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn timestamp_utc(t: SystemTime) -> Option<DateTime<Utc>> {
    match t.duration_since(UNIX_EPOCH) {
        Ok(since) => {
            DateTime::from_timestamp(i64::try_from(since.as_secs()).ok()?, since.subsec_nanos())
        }
        Err(before) => {
            let before = before.duration();
            let secs = i64::try_from(before.as_secs()).ok()?;
            match before.subsec_nanos() {
                0 => DateTime::from_timestamp(-secs, 0),
                nanos => DateTime::from_timestamp(-secs - 1, 1_000_000_000 - nanos),
            }
        }
    }
}

pub fn parse_timestamp(s: &str) -> Result<SystemTime, String> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| SystemTime::from(dt.with_timezone(&Utc)))
        .map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

/// Widen an `f32` without picking up binary noise: `12.34f32` stays `12.34`.
pub fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(f64::from(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn duration_minutes_with_nanos() {
        assert_eq!(format_duration(Duration::new(120, 22)), "2m0.000000022s");
    }

    #[test]
    fn duration_hours_keep_zero_minutes() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
    }

    #[test]
    fn duration_sub_second_units() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.5ms");
        assert_eq!(format_duration(Duration::from_nanos(22)), "22ns");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn duration_fractional_seconds() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn duration_seconds_form() {
        assert_eq!(format_duration_seconds(Duration::new(120, 22)), "120.000000022s");
        assert_eq!(format_duration_seconds(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration_seconds(Duration::from_secs(3)), "3s");
    }

    #[test]
    fn parse_both_renderings() {
        let d = Duration::new(120, 22);
        assert_eq!(parse_duration("2m0.000000022s").unwrap(), d);
        assert_eq!(parse_duration("120.000000022s").unwrap(), d);
    }

    #[test]
    fn parse_compound_and_small_units() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5µs").unwrap(), Duration::from_nanos(1500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_rejects_missing_unit() {
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3 weeks").is_err());
    }

    #[test]
    fn timestamp_keeps_nanos() {
        let t = UNIX_EPOCH + Duration::new(20, 2);
        let text = format_timestamp(t).unwrap();
        assert_eq!(text, "1970-01-01T00:00:20.000000002Z");
        assert_eq!(parse_timestamp(&text).unwrap(), t);
    }

    #[test]
    fn timestamp_whole_seconds() {
        let t = UNIX_EPOCH + Duration::from_secs(20);
        assert_eq!(format_timestamp(t).as_deref(), Some("1970-01-01T00:00:20Z"));
    }

    #[test]
    fn timestamp_before_epoch() {
        let t = UNIX_EPOCH - Duration::new(1, 500_000_000);
        assert_eq!(
            format_timestamp(t).as_deref(),
            Some("1969-12-31T23:59:58.500Z")
        );
    }

    #[test]
    fn timestamp_past_year_9999_has_no_text() {
        let t = UNIX_EPOCH + Duration::from_secs(10_000_000_000_000);
        assert_eq!(format_timestamp(t), None);
    }

    #[test]
    fn parse_rejects_overflowing_sum() {
        let err = parse_duration("340282366920938463463374607431768211455ns1ns").unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn widen_keeps_short_form() {
        assert_eq!(widen_f32(12.34).to_string(), "12.34");
    }
}
