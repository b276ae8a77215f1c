// src/config/duration.rs

use std::time::Duration;

/// Parse a plan-file duration: an integer followed by `ms`, `s`, `m` or `h`,
/// e.g. `"250ms"` or `"30s"`. Surrounding whitespace is ignored.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let Some(split) = s.find(|c: char| !c.is_ascii_digit()) else {
        return Err(format!("duration '{s}' has no unit (use ms, s, m or h)"));
    };
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|e| format!("duration '{s}' does not start with a number: {e}"))?;

    let millis_per_unit: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(format!(
                "duration '{s}' has unknown unit '{other}' (use ms, s, m or h)"
            ));
        }
    };

    Ok(Duration::from_millis(value.saturating_mul(millis_per_unit)))
}
