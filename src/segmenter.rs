use crate::parsers::{is_price_line, is_relative_time, LocationParser, StatsGrammar};

/// Trimmed, non-empty text lines of one listing card, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBlock {
    lines: Vec<String>,
}

impl RawBlock {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The meaningful lines found in a block. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segments<'a> {
    pub location: Option<&'a str>,
    pub title: Option<&'a str>,
    pub stats: Option<&'a str>,
    pub price: Option<&'a str>,
    pub time: Option<&'a str>,
}

/// Locates the location, title, stats, price and time lines of a card.
///
/// Promotional badges ("Nouveau", "Vérifié", "Livraison", ...) come and go
/// between the title and the stats line, so everything past the title is
/// found by scanning forward rather than by position.
pub struct BlockSegmenter<'a> {
    locations: &'a LocationParser,
    grammar: &'a StatsGrammar,
}

impl<'a> BlockSegmenter<'a> {
    pub fn new(locations: &'a LocationParser, grammar: &'a StatsGrammar) -> Self {
        Self { locations, grammar }
    }

    pub fn segment<'b>(&self, block: &'b RawBlock) -> Segments<'b> {
        let lines = block.lines();
        let location_idx = lines
            .iter()
            .position(|line| self.locations.is_location_line(line));

        let mut segments = Segments {
            time: lines
                .iter()
                .find(|line| is_relative_time(line))
                .map(String::as_str),
            ..Default::default()
        };

        let scan_from = match location_idx {
            Some(idx) => {
                segments.location = Some(lines[idx].as_str());
                segments.title = lines
                    .get(idx + 1)
                    .map(String::as_str)
                    .filter(|line| !self.is_data_line(line));
                if segments.title.is_some() {
                    idx + 2
                } else {
                    idx + 1
                }
            }
            None => {
                tracing::trace!("No location line in block of {} lines", lines.len());
                0
            }
        };

        let rest = lines.get(scan_from..).unwrap_or_default();

        segments.stats = rest
            .iter()
            .find(|line| self.grammar.parse(line).is_some())
            .map(String::as_str);
        segments.price = rest
            .iter()
            .find(|line| is_price_line(line))
            .map(String::as_str);

        segments
    }

    // Stats and price lines are never titles, even right after the location.
    fn is_data_line(&self, line: &str) -> bool {
        is_price_line(line) || self.grammar.parse(line).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyType;
    use crate::parsers::CategoryLabel;

    fn location_parser() -> LocationParser {
        LocationParser::new(
            &[CategoryLabel::new("Appartements", PropertyType::Apartment)],
            &["Casablanca".to_string()],
        )
        .unwrap()
    }

    fn segment_lines(lines: &[&str]) -> (Option<String>, Option<String>, Option<String>, Option<String>, Option<String>) {
        let locations = location_parser();
        let grammar = StatsGrammar::standard().unwrap();
        let segmenter = BlockSegmenter::new(&locations, &grammar);
        let block = RawBlock::new(lines.iter());
        let s = segmenter.segment(&block);
        (
            s.location.map(str::to_string),
            s.title.map(str::to_string),
            s.stats.map(str::to_string),
            s.price.map(str::to_string),
            s.time.map(str::to_string),
        )
    }

    #[test]
    fn test_raw_block_trims_and_drops_empty_lines() {
        let block = RawBlock::new("  il y a 3 heures \n\n   \nAppartements dans Casablanca\n".lines());
        assert_eq!(block.lines(), &["il y a 3 heures", "Appartements dans Casablanca"]);
        assert!(RawBlock::new(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_segment_standard_card() {
        let (location, title, stats, price, time) = segment_lines(&[
            "il y a 3 heures",
            "Appartements dans Casablanca, Gauthier",
            "Appartement de standing à Gauthier",
            "3 2 187 m²4",
            "4 000 000 DH22 233 DH / mois",
        ]);
        assert_eq!(location.as_deref(), Some("Appartements dans Casablanca, Gauthier"));
        assert_eq!(title.as_deref(), Some("Appartement de standing à Gauthier"));
        assert_eq!(stats.as_deref(), Some("3 2 187 m²4"));
        assert_eq!(price.as_deref(), Some("4 000 000 DH22 233 DH / mois"));
        assert_eq!(time.as_deref(), Some("il y a 3 heures"));
    }

    #[test]
    fn test_segment_skips_badge_lines() {
        let (_, title, stats, price, _) = segment_lines(&[
            "Appartements dans Casablanca, Maarif",
            "Studio meublé Maarif",
            "Nouveau",
            "Vérifié",
            "1 1 45 m²",
            "Livraison",
            "700 000 DH",
        ]);
        assert_eq!(title.as_deref(), Some("Studio meublé Maarif"));
        assert_eq!(stats.as_deref(), Some("1 1 45 m²"));
        assert_eq!(price.as_deref(), Some("700 000 DH"));
    }

    #[test]
    fn test_segment_price_before_stats() {
        let (_, _, stats, price, _) = segment_lines(&[
            "Appartements dans Casablanca",
            "Appartement Oasis",
            "1 250 000 DH",
            "3 4 6",
        ]);
        assert_eq!(stats.as_deref(), Some("3 4 6"));
        assert_eq!(price.as_deref(), Some("1 250 000 DH"));
    }

    #[test]
    fn test_segment_without_location_line() {
        let (location, title, stats, price, _) = segment_lines(&[
            "Immobilier neuf",
            "2 1 80 m²",
            "950 000 DH",
        ]);
        assert_eq!(location, None);
        assert_eq!(title, None);
        assert_eq!(stats.as_deref(), Some("2 1 80 m²"));
        assert_eq!(price.as_deref(), Some("950 000 DH"));
    }

    #[test]
    fn test_segment_ignores_lines_before_location() {
        let (_, _, stats, price, _) = segment_lines(&[
            "5 3 300 m²",
            "9 999 999 DH",
            "Appartements dans Casablanca, Anfa",
            "Appartement Anfa",
            "Demander le prix",
        ]);
        assert_eq!(stats, None);
        assert_eq!(price.as_deref(), Some("Demander le prix"));
    }

    #[test]
    fn test_title_missing_when_next_line_is_data() {
        let (_, title, stats, price, _) = segment_lines(&[
            "Appartements dans Casablanca, Anfa",
            "2 1 80 m²",
            "950 000 DH",
        ]);
        assert_eq!(title, None);
        assert_eq!(stats.as_deref(), Some("2 1 80 m²"));
        assert_eq!(price.as_deref(), Some("950 000 DH"));
    }
}
