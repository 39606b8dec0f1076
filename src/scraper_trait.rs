use crate::models::{assign_ids, Listing};
use anyhow::Result;
use async_trait::async_trait;

/// A listing site. Implementations return listings in page order with no
/// `id`; numbering belongs to the registry.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Label used in log lines, e.g. "Avito"
    fn name(&self) -> &str;

    /// Walks the result pages of `cities`. Pages that cannot be fetched are
    /// skipped, so an `Err` means the whole source is unusable.
    async fn scrape(&self, cities: &[String]) -> Result<Vec<Listing>>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Ordered set of listing sites feeding one output document.
pub struct ScraperRegistry {
    scrapers: Vec<Box<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self {
            scrapers: Vec::new(),
        }
    }

    pub fn register(&mut self, scraper: Box<dyn Scraper>) {
        self.scrapers.push(scraper);
    }

    /// Runs every enabled scraper in registration order and numbers the merged
    /// listings from 1. A failing scraper is logged and contributes nothing.
    pub async fn scrape_all(&self, cities: &[String]) -> Result<Vec<Listing>> {
        let mut all_listings = Vec::new();

        for scraper in &self.scrapers {
            if !scraper.is_enabled() {
                tracing::debug!("Skipping disabled scraper {}", scraper.name());
                continue;
            }

            tracing::info!("[{}] collecting listings for {} cities", scraper.name(), cities.len());

            match scraper.scrape(cities).await {
                Ok(mut listings) => {
                    tracing::info!("[{}] {} listings kept", scraper.name(), listings.len());
                    all_listings.append(&mut listings);
                }
                Err(e) => {
                    tracing::error!("[{}] source failed, no listings from it: {}", scraper.name(), e);
                }
            }
        }

        assign_ids(&mut all_listings);
        Ok(all_listings)
    }

    /// Names of the registered sources, enabled or not.
    pub fn list_scrapers(&self) -> Vec<String> {
        self.scrapers.iter()
            .map(|s| s.name().to_string())
            .collect()
    }
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::new()
    }
}
