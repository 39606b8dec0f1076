use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

static SURFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:m²|m2|mètres?\s+carrés?|metres?\s+carres?)")
        .expect("valid surface regex")
});

/// Surfaces read from free text outside this band are treated as noise
/// (floor numbers, listing counts, years).
pub const TITLE_SURFACE_RANGE: RangeInclusive<u32> = 20..=2000;

/// Fallback surface read from a listing title; only plausible values count.
pub fn parse_surface_in_title(title: &str) -> Option<u32> {
    SURFACE_RE
        .captures_iter(title)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .find(|surface| TITLE_SURFACE_RANGE.contains(surface))
}
