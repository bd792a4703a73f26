//! Human-readable duration parsing for CLI options.

use std::time::Duration;

/// Suffixes and their length in milliseconds. `ms` must precede `m` and `s`.
const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1_000)];

/// Parse a duration such as `500ms`, `3s`, `1m` or `2h`.
///
/// A bare number is interpreted as seconds. Whitespace between the number
/// and the suffix is allowed.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tpms_mqtt_bridge::duration::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (number, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, millis)| src.strip_suffix(suffix).map(|n| (n.trim(), *millis)))
        .unwrap_or((src, 1_000));

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration out of range: {src}"))
}
