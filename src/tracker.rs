use crate::assembler::Candidate;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    New,
    Duplicate,
    Excluded,
    Empty,
}

/// Tracks the links seen on one result page, so a card that the page renders
/// twice (image anchor and title anchor) is only parsed once.
pub struct PageTracker {
    seen_links: HashSet<String>,
    excluded_paths: Vec<String>,
}

impl PageTracker {
    pub fn new(excluded_paths: &[String]) -> Self {
        Self {
            seen_links: HashSet::new(),
            excluded_paths: excluded_paths
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Classifies a link and records it as seen when it is new.
    pub fn check(&mut self, link: &str) -> LinkStatus {
        let link = link.trim();
        if link.is_empty() {
            return LinkStatus::Empty;
        }

        let lower = link.to_lowercase();
        if self.excluded_paths.iter().any(|p| lower.contains(p.as_str())) {
            return LinkStatus::Excluded;
        }

        if self.seen_links.insert(link.to_string()) {
            LinkStatus::New
        } else {
            LinkStatus::Duplicate
        }
    }

    /// Keeps the first candidate for every new, non-excluded link.
    pub fn filter_new(&mut self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|candidate| match self.check(&candidate.link) {
                LinkStatus::New => true,
                status => {
                    tracing::debug!("Dropping candidate {:?}: {:?}", candidate.link, status);
                    false
                }
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.seen_links.len()
    }
}
