use std::time::Duration;

/// Parse a human-readable duration like `"30s"`, `"2m"`, `"1h"`, or a bare
/// number of seconds (`"30"`), per §5's `step.timeout` field.
pub fn parse_timeout(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (digits, unit) = match trimmed.chars().last() {
        Some(c) if c.is_ascii_digit() => (trimmed, 's'),
        Some(c) => (&trimmed[..trimmed.len() - c.len_utf8()], c),
        None => return None,
    };

    let value: u64 = digits.trim().parse().ok()?;
    let seconds = match unit.to_ascii_lowercase() {
        's' => value,
        'm' => value.checked_mul(60)?,
        'h' => value.checked_mul(3600)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}
