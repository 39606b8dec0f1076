use crate::assembler::{Candidate, PageContext, RecordAssembler};
use crate::config::{Config, DateFilter};
use crate::geography::GeoTable;
use crate::http_client::Fetcher;
use crate::models::Listing;
use crate::parsers::{LocationParser, StatsGrammar, StatsShape};
use crate::scraper_trait::Scraper;
use crate::segmenter::RawBlock;
use crate::tracker::PageTracker;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scraper::{ElementRef, Html, Selector};

const CARD_SELECTORS: &[&str] = &[
    "article[data-listing-id]",
    "li[data-listing-id]",
    "[data-listing-id]",
    "a[href$='.htm']",
];

const GALLERY_SELECTORS: &[&str] = &[
    "[class*='slick-slide'] img",
    "[class*='gallery'] img",
    "[class*='Gallery'] img",
    "[class*='photo'] img",
];

const MAX_GALLERY_IMAGES: usize = 8;

// Elements that start a new line in the rendered card text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "div", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "li", "ol", "p", "section", "ul", "time",
];

pub struct AvitoScraper {
    fetcher: Box<dyn Fetcher>,
    geography: GeoTable,
    locations: LocationParser,
    grammar: StatsGrammar,
    base_url: String,
    search_url_template: String,
    multi_city_url_template: String,
    multi_city: bool,
    pages: u32,
    min_price: u64,
    date_filter: DateFilter,
    excluded_paths: Vec<String>,
    request_delay_ms: (u64, u64),
    fetch_gallery: bool,
    seed: Option<u64>,
}

impl AvitoScraper {
    pub fn from_config(config: &Config, fetcher: Box<dyn Fetcher>, geography: GeoTable) -> Result<Self> {
        let cities: Vec<String> = geography.city_names().map(str::to_string).collect();
        let locations = LocationParser::new(&config.category_labels, &cities)?;

        let mut grammar = StatsGrammar::standard()?;
        for shape in &config.stats_shapes {
            grammar = grammar.with_shape(StatsShape::new(&shape.name, &shape.pattern)?);
        }

        Ok(Self {
            fetcher,
            geography,
            locations,
            grammar,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_url_template: config.search_url_template.clone(),
            multi_city_url_template: config.multi_city_url_template.clone(),
            multi_city: false,
            pages: config.pages,
            min_price: config.min_price,
            date_filter: config.date_filter,
            excluded_paths: config.excluded_paths.clone(),
            request_delay_ms: (config.request_delay_min_ms, config.request_delay_max_ms),
            fetch_gallery: config.fetch_gallery,
            seed: None,
        })
    }

    /// Query every city at once through the multi-city search URL.
    pub fn with_multi_city(mut self, multi_city: bool) -> Self {
        self.multi_city = multi_city;
        self
    }

    /// Fixes the random source used for geocoding and delays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn build_page_url(&self, city: Option<&str>, page: u32) -> String {
        let template = match city {
            Some(_) => &self.search_url_template,
            None => &self.multi_city_url_template,
        };
        let slug = city.map(|c| c.trim().to_lowercase()).unwrap_or_default();

        template
            .replace("{city}", &urlencoding::encode(&slug))
            .replace("{page}", &page.to_string())
            .replace("{min_price}", &self.min_price.to_string())
    }

    /// Convert relative URL to absolute URL
    fn build_full_url(base_url: &str, relative_url: &str) -> String {
        let relative_url = relative_url.trim();
        if relative_url.starts_with("http") {
            relative_url.to_string()
        } else if relative_url.starts_with("//") {
            format!("https:{}", relative_url)
        } else if !relative_url.is_empty() {
            format!("{}/{}", base_url, relative_url.trim_start_matches('/'))
        } else {
            String::new()
        }
    }

    /// Rendered text of a card, one entry per visual line.
    fn card_text_lines(element: &ElementRef) -> Vec<String> {
        let mut text = String::new();
        Self::collect_text(element, &mut text);
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn collect_text(element: &ElementRef, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                // Source indentation is not a line break.
                out.extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
            } else if let Some(child_element) = ElementRef::wrap(child) {
                let name = child_element.value().name();
                match name {
                    "br" => out.push('\n'),
                    "script" | "style" | "noscript" | "svg" | "template" => {}
                    _ if BLOCK_TAGS.contains(&name) => {
                        out.push('\n');
                        Self::collect_text(&child_element, out);
                        out.push('\n');
                    }
                    _ => Self::collect_text(&child_element, out),
                }
            }
        }
    }

    /// Extract relative URL from an HTML element
    fn extract_relative_url(element: &ElementRef) -> String {
        if element.value().name() == "a" {
            if let Some(href) = element.value().attr("href") {
                return href.to_string();
            }
        }

        Selector::parse("a[href]").ok()
            .and_then(|sel| element.select(&sel).next())
            .and_then(|el| el.value().attr("href"))
            .unwrap_or("")
            .to_string()
    }

    fn extract_image_urls(element: &ElementRef, base_url: &str) -> Vec<String> {
        let Ok(selector) = Selector::parse("img") else {
            return Vec::new();
        };

        let mut images: Vec<String> = Vec::new();
        for img in element.select(&selector) {
            let src = img.value().attr("src")
                .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
                .or_else(|| img.value().attr("data-src"))
                .unwrap_or("");
            if src.is_empty() || src.contains("placeholder") || src.starts_with("data:") {
                continue;
            }
            let url = Self::build_full_url(base_url, src);
            if !images.contains(&url) {
                images.push(url);
            }
        }
        images
    }

    /// Every listing card of a result page, in document order.
    ///
    /// The first selector that matches anything decides what a card is.
    pub fn extract_candidates(html: &str, base_url: &str) -> Vec<Candidate> {
        let document = Html::parse_document(html);

        for selector_str in CARD_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let cards: Vec<ElementRef> = document.select(&selector).collect();
            if cards.is_empty() {
                tracing::trace!("Selector '{}' found 0 elements", selector_str);
                continue;
            }

            tracing::debug!("Found {} cards with selector: {}", cards.len(), selector_str);
            return cards
                .iter()
                .map(|card| Candidate {
                    link: Self::build_full_url(base_url, &Self::extract_relative_url(card)),
                    block: RawBlock::new(Self::card_text_lines(card)),
                    images: Self::extract_image_urls(card, base_url),
                })
                .collect();
        }

        tracing::warn!("No listing cards found. Page structure may have changed.");
        tracing::debug!("HTML preview (first 500 chars): {}", html.chars().take(500).collect::<String>());
        Vec::new()
    }

    /// Image URLs of a listing detail page.
    pub fn extract_gallery(html: &str, base_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        for selector_str in GALLERY_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let mut images: Vec<String> = Vec::new();
            for img in document.select(&selector) {
                let src = img.value().attr("src")
                    .or_else(|| img.value().attr("data-src"))
                    .unwrap_or("");
                if src.is_empty() || src.contains("placeholder") || src.starts_with("data:") {
                    continue;
                }
                let url = Self::build_full_url(base_url, src);
                if !images.contains(&url) {
                    images.push(url);
                }
            }
            if !images.is_empty() {
                images.truncate(MAX_GALLERY_IMAGES);
                return images;
            }
        }
        Vec::new()
    }

    /// Parse one fetched result page into listings.
    fn parse_page<R: Rng + ?Sized>(&self, html: &str, ctx: &PageContext<'_>, rng: &mut R) -> Vec<Listing> {
        let candidates = Self::extract_candidates(html, &self.base_url);
        let total = candidates.len();

        let mut tracker = PageTracker::new(&self.excluded_paths);
        let candidates = tracker.filter_new(candidates);
        tracing::debug!("Page {}: {} cards, {} unique links", ctx.page, total, tracker.count());

        let assembler = RecordAssembler::new(&self.locations, &self.grammar, &self.geography);
        let listings = assembler.assemble_page(&candidates, ctx, rng);

        let before = listings.len();
        let listings: Vec<Listing> = listings
            .into_iter()
            .filter(|l| self.date_filter.keeps(l.published_at, ctx.scraped_at))
            .collect();
        if listings.len() < before {
            tracing::debug!("Page {}: {} listings older than {}", ctx.page,
                before - listings.len(), self.date_filter.as_str());
        }
        listings
    }

    async fn attach_galleries(&self, listings: &mut [Listing], rng: &mut StdRng) {
        for listing in listings.iter_mut() {
            match self.fetcher.fetch(&listing.link).await {
                Ok(html) => {
                    let gallery = Self::extract_gallery(&html, &self.base_url);
                    if !gallery.is_empty() {
                        listing.images = gallery;
                    }
                }
                Err(e) => tracing::warn!("Failed to fetch gallery for {}: {}", listing.link, e),
            }
            self.pause(rng, 500, 1200).await;
        }
    }

    async fn pause(&self, rng: &mut StdRng, min_ms: u64, max_ms: u64) {
        if max_ms == 0 {
            return;
        }
        let delay = rng.gen_range(min_ms..=max_ms);
        tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl Scraper for AvitoScraper {
    fn name(&self) -> &str {
        "Avito"
    }

    async fn scrape(&self, cities: &[String]) -> Result<Vec<Listing>> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let targets: Vec<Option<&str>> = if self.multi_city {
            vec![None]
        } else {
            cities.iter().map(|c| Some(c.as_str())).collect()
        };

        let mut listings = Vec::new();

        for city in targets {
            let label = city.unwrap_or("ALL");
            let mut city_total = 0;

            for page in 1..=self.pages {
                let url = self.build_page_url(city, page);
                tracing::debug!("[{}] page {} -> {}", label, page, url);

                let mut batch = match self.fetcher.fetch(&url).await {
                    Ok(html) => {
                        let ctx = PageContext {
                            page,
                            city,
                            scraped_at: Utc::now(),
                        };
                        self.parse_page(&html, &ctx, &mut rng)
                    }
                    Err(e) => {
                        tracing::warn!("[{}] page {} skipped: {}", label, page, e);
                        Vec::new()
                    }
                };

                if self.fetch_gallery {
                    self.attach_galleries(&mut batch, &mut rng).await;
                }

                let added = batch.len();
                city_total += added;
                listings.append(&mut batch);
                tracing::info!("[{}] page {}: +{} | city: {} | total: {}",
                    label, page, added, city_total, listings.len());

                let (min_ms, max_ms) = self.request_delay_ms;
                self.pause(&mut rng, min_ms, max_ms).await;
            }

            tracing::info!("{}: {} listings collected", label, city_total);
        }

        Ok(listings)
    }
}
