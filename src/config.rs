use crate::models::PropertyType;
use crate::parsers::CategoryLabel;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

/// Maximum age of the listings kept in the output.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
}

impl DateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFilter::All => "all",
            DateFilter::LastDay => "24h",
            DateFilter::LastWeek => "7d",
            DateFilter::LastMonth => "30d",
        }
    }

    pub fn window(&self) -> Option<Duration> {
        match self {
            DateFilter::All => None,
            DateFilter::LastDay => Some(Duration::hours(24)),
            DateFilter::LastWeek => Some(Duration::days(7)),
            DateFilter::LastMonth => Some(Duration::days(30)),
        }
    }

    /// Listings without a publish time are always kept.
    pub fn keeps(&self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self.window(), published_at) {
            (Some(window), Some(published)) => now.signed_duration_since(published) <= window,
            _ => true,
        }
    }
}

impl FromStr for DateFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(DateFilter::All),
            "24h" | "1d" | "day" => Ok(DateFilter::LastDay),
            "7d" | "week" => Ok(DateFilter::LastWeek),
            "30d" | "month" => Ok(DateFilter::LastMonth),
            other => bail!("Unknown date filter '{}' (expected all, 24h, 7d or 30d)", other),
        }
    }
}

/// Extra stats-line layout, tried after the built-in ones.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatsShapeConfig {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Search page URL with `{city}`, `{page}` and `{min_price}` placeholders
    #[serde(default = "default_search_url_template")]
    pub search_url_template: String,
    /// Same as `search_url_template`, for all cities at once (no `{city}`)
    #[serde(default = "default_multi_city_url_template")]
    pub multi_city_url_template: String,
    #[serde(default = "default_cities")]
    pub cities: Vec<String>,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default)]
    pub min_price: u64,
    #[serde(default)]
    pub date_filter: DateFilter,
    #[serde(default = "default_category_labels")]
    pub category_labels: Vec<CategoryLabel>,
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub stats_shapes: Vec<StatsShapeConfig>,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_delay_min_ms")]
    pub request_delay_min_ms: u64,
    #[serde(default = "default_request_delay_max_ms")]
    pub request_delay_max_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub fetch_gallery: bool,
}

fn default_source() -> String {
    "avito.ma".to_string()
}

fn default_base_url() -> String {
    "https://www.avito.ma".to_string()
}

fn default_search_url_template() -> String {
    "https://www.avito.ma/fr/{city}/appartements-%C3%A0_vendre?o={page}&price={min_price}-".to_string()
}

fn default_multi_city_url_template() -> String {
    "https://www.avito.ma/fr/maroc/appartements-%C3%A0_vendre?cities=15,8,12,5,90,13&o={page}&price={min_price}-".to_string()
}

fn default_cities() -> Vec<String> {
    ["Casablanca", "Agadir", "Marrakech", "Tanger", "Rabat", "Mohammedia"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_pages() -> u32 {
    10
}

fn default_category_labels() -> Vec<CategoryLabel> {
    vec![
        CategoryLabel::new("Appartements", PropertyType::Apartment),
        CategoryLabel::new("Villas et maisons de luxe", PropertyType::Villa),
        CategoryLabel::new("Villas", PropertyType::Villa),
    ]
}

fn default_excluded_paths() -> Vec<String> {
    vec!["immoneuf".to_string()]
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string()
}

fn default_request_delay_min_ms() -> u64 {
    2000
}

fn default_request_delay_max_ms() -> u64 {
    4000
}

fn default_max_retries() -> u32 {
    3
}

fn default_output() -> String {
    "data.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: default_source(),
            base_url: default_base_url(),
            search_url_template: default_search_url_template(),
            multi_city_url_template: default_multi_city_url_template(),
            cities: default_cities(),
            pages: default_pages(),
            min_price: 0,
            date_filter: DateFilter::default(),
            category_labels: default_category_labels(),
            excluded_paths: default_excluded_paths(),
            stats_shapes: Vec::new(),
            tracing_level: default_tracing_level(),
            user_agent: default_user_agent(),
            request_delay_min_ms: default_request_delay_min_ms(),
            request_delay_max_ms: default_request_delay_max_ms(),
            max_retries: default_max_retries(),
            output: default_output(),
            fetch_gallery: false,
        }
    }
}

impl Config {
    /// Load the YAML file at `path` (defaults when it does not exist), then
    /// apply environment overrides and validate.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let config_str = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path))?;
            Self::from_yaml(&config_str).with_context(|| format!("Failed to parse {}", path))?
        } else {
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(cities) = env::var("CITIES") {
            // Comma-separated
            self.cities = cities
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(pages) = env::var("PAGES") {
            self.pages = pages.parse()
                .context("Failed to parse PAGES environment variable")?;
        }

        if let Ok(min_price) = env::var("MIN_PRICE") {
            self.min_price = min_price.parse()
                .context("Failed to parse MIN_PRICE environment variable")?;
        }

        if let Ok(date_filter) = env::var("DATE_FILTER") {
            self.date_filter = date_filter.parse()
                .context("Failed to parse DATE_FILTER environment variable")?;
        }

        if let Ok(tracing_level) = env::var("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }

        if let Ok(user_agent) = env::var("USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Ok(delay) = env::var("REQUEST_DELAY_MIN_MS") {
            self.request_delay_min_ms = delay.parse()
                .context("Failed to parse REQUEST_DELAY_MIN_MS environment variable")?;
        }

        if let Ok(delay) = env::var("REQUEST_DELAY_MAX_MS") {
            self.request_delay_max_ms = delay.parse()
                .context("Failed to parse REQUEST_DELAY_MAX_MS environment variable")?;
        }

        if let Ok(retries) = env::var("MAX_RETRIES") {
            self.max_retries = retries.parse()
                .context("Failed to parse MAX_RETRIES environment variable")?;
        }

        if let Ok(output) = env::var("OUTPUT") {
            self.output = output;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cities.is_empty() {
            bail!("At least one city is required (set via config file or CITIES env var)");
        }

        if self.pages == 0 {
            bail!("pages must be at least 1");
        }

        if self.request_delay_min_ms > self.request_delay_max_ms {
            bail!(
                "request_delay_min_ms ({}) is greater than request_delay_max_ms ({})",
                self.request_delay_min_ms, self.request_delay_max_ms
            );
        }

        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }

        if self.category_labels.is_empty() {
            bail!("At least one category label is required");
        }

        if !self.search_url_template.contains("{page}") {
            bail!("search_url_template must contain a {{page}} placeholder");
        }

        Ok(())
    }

    pub fn create_default(path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }

        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write(path, config_str)
            .with_context(|| format!("Failed to write {}", path))?;
        Ok(())
    }
}
