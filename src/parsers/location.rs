use crate::geography::fold_key;
use crate::models::PropertyType;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A category label as printed on listing cards, e.g. "Appartements".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryLabel {
    pub label: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
}

impl CategoryLabel {
    pub fn new(label: &str, property_type: PropertyType) -> Self {
        Self {
            label: label.to_string(),
            property_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLocation {
    pub property_type: PropertyType,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    /// Everything after "<label> dans", e.g. "Casablanca, Gauthier".
    pub phrase: String,
}

/// Parser for the "<Label> dans <City>[, <Neighborhood>]" card line.
#[derive(Debug, Clone)]
pub struct LocationParser {
    patterns: Vec<(Regex, PropertyType)>,
    cities: Vec<String>,
}

impl LocationParser {
    pub fn new(labels: &[CategoryLabel], cities: &[String]) -> Result<Self> {
        let mut labels: Vec<&CategoryLabel> = labels.iter().collect();
        // Longest first so "Villas et maisons de luxe" beats "Villas".
        labels.sort_by_key(|l| std::cmp::Reverse(l.label.chars().count()));

        let patterns = labels
            .into_iter()
            .map(|l| {
                let pattern = format!(
                    r"(?i)^\s*{}\s+(?:dans|in)\s+(?P<rest>.+)$",
                    regex::escape(l.label.trim())
                );
                Regex::new(&pattern)
                    .with_context(|| format!("Invalid category label '{}'", l.label))
                    .map(|re| (re, l.property_type))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            cities: cities.to_vec(),
        })
    }

    /// True when the line starts with one of the configured category labels.
    pub fn is_location_line(&self, line: &str) -> bool {
        self.patterns.iter().any(|(re, _)| re.is_match(line))
    }

    pub fn parse(&self, line: &str) -> Option<ParsedLocation> {
        let (rest, property_type) = self.patterns.iter().find_map(|(re, property_type)| {
            re.captures(line)
                .and_then(|caps| caps.name("rest"))
                .map(|m| (m.as_str().trim(), *property_type))
        })?;

        let (city_phrase, neighborhood_phrase) = match rest.split_once(',') {
            Some((city, neighborhood)) => (city.trim(), Some(neighborhood.trim())),
            None => (rest, None),
        };

        Some(ParsedLocation {
            property_type,
            city: self.canonical_city(city_phrase),
            neighborhood: neighborhood_phrase
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string()),
            phrase: rest.to_string(),
        })
    }

    fn canonical_city(&self, phrase: &str) -> Option<String> {
        if phrase.is_empty() {
            return None;
        }
        let folded = fold_key(phrase);
        self.cities
            .iter()
            .find(|city| folded.contains(&fold_key(city)))
            .cloned()
            .or_else(|| Some(title_case(phrase)))
    }
}

/// "sidi BENNOUR" -> "Sidi Bennour"
pub fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
