use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::LazyLock;

// Longer unit spellings come first so "semaines" is not read as "s".
static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)il\s+y\s+a\s+(\d{1,6})\s*(secondes?|semaines?|sem|sec|s|minutes?|mins?|mn|heures?|h|jours?|j|mois|ans?)\b",
    )
    .expect("valid relative time regex")
});

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
/// Months are a flat 30 days; date filters downstream rely on that size.
const MONTH: i64 = 30 * DAY;

fn unit_seconds(unit: &str) -> Option<i64> {
    let seconds = match unit.to_lowercase().as_str() {
        "s" | "sec" | "seconde" | "secondes" => 1,
        "mn" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "heure" | "heures" => HOUR,
        "j" | "jour" | "jours" => DAY,
        "sem" | "semaine" | "semaines" => 7 * DAY,
        "mois" => MONTH,
        "an" | "ans" => 365 * DAY,
        _ => return None,
    };
    Some(seconds)
}

/// True for lines such as "il y a 3 heures".
pub fn is_relative_time(text: &str) -> bool {
    RELATIVE_RE.is_match(text)
}

/// Convert "il y a <n> <unit>" into an absolute instant relative to `now`.
///
/// Anything that does not match (including "à l'instant") is treated as
/// `now`.
pub fn parse_relative_time(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    relative_offset(text)
        .and_then(|offset| now.checked_sub_signed(offset))
        .unwrap_or(now)
}

fn relative_offset(text: &str) -> Option<Duration> {
    let caps = RELATIVE_RE.captures(text)?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = unit_seconds(caps.get(2)?.as_str())?;
    Duration::try_seconds(amount.checked_mul(unit)?)
}
