use anyhow::{bail, Context, Result};
use regex::Regex;

/// Counts read from a card's stats line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub rooms: u32,
    pub secondary: Option<u32>,
    pub surface: Option<u32>,
    pub trailing: Option<u32>,
}

/// One admissible layout of the stats line.
///
/// The pattern must be anchored on the whole line and name its groups
/// `rooms` (required), `secondary`, `surface` and `trailing` (all optional).
#[derive(Debug, Clone)]
pub struct StatsShape {
    name: String,
    pattern: Regex,
}

impl StatsShape {
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("Invalid pattern for stats shape '{}'", name))?;
        if !pattern.capture_names().flatten().any(|group| group == "rooms") {
            bail!("Stats shape '{}' has no 'rooms' group", name);
        }
        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parse(&self, line: &str) -> Option<Stats> {
        let caps = self.pattern.captures(line.trim())?;
        let number = |group: &str| -> Option<u32> {
            caps.name(group).and_then(|m| m.as_str().parse::<u32>().ok())
        };

        Some(Stats {
            rooms: number("rooms")?,
            secondary: number("secondary"),
            surface: number("surface").filter(|&s| s > 0),
            trailing: number("trailing"),
        })
    }
}

/// Ordered list of stats-line shapes; the first shape that matches wins.
///
/// Shapes are disambiguated by the area unit, not by counting fields: "3 4 6"
/// and "3 2 187 m²" both start with two small integers.
#[derive(Debug, Clone)]
pub struct StatsGrammar {
    shapes: Vec<StatsShape>,
}

const WITH_SURFACE: &str = r"^(?P<rooms>\d{1,2})\s+(?P<secondary>\d{1,2})\s+(?P<surface>\d{1,5})\s*m(?:²|2)\s*(?P<trailing>\d{1,3})?$";
const WITHOUT_SURFACE: &str = r"^(?P<rooms>\d{1,2})\s+(?P<secondary>\d{1,2})\s+(?P<trailing>\d{1,3})$";

impl StatsGrammar {
    pub fn new(shapes: Vec<StatsShape>) -> Self {
        Self { shapes }
    }

    /// rooms, baths, surface and photo count; then rooms, baths, photo count
    pub fn standard() -> Result<Self> {
        Ok(Self::new(vec![
            StatsShape::new("rooms-baths-surface", WITH_SURFACE)?,
            StatsShape::new("rooms-baths-photos", WITHOUT_SURFACE)?,
        ]))
    }

    /// Appends a shape, tried after the existing ones.
    pub fn with_shape(mut self, shape: StatsShape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn parse(&self, line: &str) -> Option<Stats> {
        self.shapes.iter().find_map(|shape| {
            let stats = shape.parse(line)?;
            tracing::trace!("Stats line '{}' matched shape '{}' (secondary: {:?}, trailing: {:?})",
                line, shape.name(), stats.secondary, stats.trailing);
            Some(stats)
        })
    }

    /// (rooms, surface) from a stats line.
    pub fn parse_rooms(&self, line: &str) -> Option<(u32, Option<u32>)> {
        self.parse(line).map(|stats| (stats.rooms, stats.surface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> StatsGrammar {
        StatsGrammar::standard().expect("standard grammar compiles")
    }

    #[test]
    fn test_stats_with_surface_and_photo_count() {
        assert_eq!(grammar().parse_rooms("3 2 187 m²4"), Some((3, Some(187))));
        let stats = grammar().parse("3 2 187 m²4").unwrap();
        assert_eq!(stats.secondary, Some(2));
        assert_eq!(stats.trailing, Some(4));
    }

    #[test]
    fn test_stats_with_surface_without_trailing() {
        assert_eq!(grammar().parse_rooms("2 1 75 m²"), Some((2, Some(75))));
        assert_eq!(grammar().parse_rooms("4 2 140 m2 12"), Some((4, Some(140))));
    }

    #[test]
    fn test_stats_without_surface() {
        assert_eq!(grammar().parse_rooms("3 4 6"), Some((3, None)));
    }

    #[test]
    fn test_stats_non_breaking_spaces() {
        assert_eq!(grammar().parse_rooms("3\u{00a0}2\u{00a0}187\u{00a0}m²"), Some((3, Some(187))));
    }

    #[test]
    fn test_stats_rejects_other_lines() {
        let g = grammar();
        assert_eq!(g.parse("700 000 DH"), None);
        assert_eq!(g.parse("Appartement 3 chambres 120 m²"), None);
        assert_eq!(g.parse("Nouveau"), None);
        assert_eq!(g.parse("3 2"), None);
        assert_eq!(g.parse(""), None);
    }

    #[test]
    fn test_extra_shape_is_tried_last() {
        let g = grammar()
            .with_shape(StatsShape::new("rooms-surface", r"^(?P<rooms>\d{1,2})\s+(?P<surface>\d{1,5})\s*m²$").unwrap());
        assert_eq!(g.parse_rooms("2 60 m²"), Some((2, Some(60))));
        assert_eq!(g.parse_rooms("3 4 6"), Some((3, None)));
    }

    #[test]
    fn test_shape_without_rooms_group_is_rejected() {
        assert!(StatsShape::new("broken", r"^(?P<surface>\d+)$").is_err());
        assert!(StatsShape::new("invalid", r"^(\d+").is_err());
    }
}
