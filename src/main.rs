mod assembler;
mod config;
mod geocoder;
mod geography;
mod http_client;
mod models;
mod output;
mod parsers;
mod scraper_trait;
mod scrapers;
mod segmenter;
mod tracker;

use anyhow::{bail, Result};
use clap::Parser;
use config::{Config, DEFAULT_CONFIG_PATH};
use geography::GeoTable;
use http_client::{Fetcher, HttpFetcher};
use scraper_trait::ScraperRegistry;
use scrapers::AvitoScraper;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "avitomap")]
#[command(about = "Collects Avito.ma property listings into a geocoded JSON document", long_about = None)]
struct Args {
    /// Scrape a single configured city
    #[arg(long)]
    city: Option<String>,

    /// Use the combined multi-city search URL
    #[arg(long, conflicts_with = "city")]
    multi: bool,

    /// Number of result pages per city
    #[arg(long)]
    pages: Option<u32>,

    /// Fetch full image galleries from listing pages (slower)
    #[arg(long)]
    images: bool,

    /// Path of the YAML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Path of the JSON document to write
    #[arg(long)]
    output: Option<String>,

    /// Seed for the coordinate sampler and request delays (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,

    /// Fetch one result page and print the candidate blocks it yields
    #[arg(long)]
    test_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create config first (before logging is initialized)
    if !Path::new(&args.config).exists() {
        eprintln!("No config file found, creating default {}", args.config);
        Config::create_default(&args.config)?;
    }
    let mut config = Config::load(&args.config)?;

    // Initialize logging - use RUST_LOG env var if set, otherwise use config
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::info!("Logging level set from RUST_LOG environment variable");
    } else {
        let level = config.tracing_level.to_lowercase();
        let max_level = match level.as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                eprintln!("Invalid tracing level '{}', using 'info'", level);
                tracing::Level::INFO
            }
        };

        tracing_subscriber::fmt()
            .with_max_level(max_level)
            .init();

        tracing::debug!("Logging level set to: {} (from {})", level, args.config);
    }

    if let Some(pages) = args.pages {
        config.pages = pages;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if args.images {
        config.fetch_gallery = true;
    }
    if let Some(city) = &args.city {
        config.cities = vec![select_city(&config.cities, city)?];
    }
    config.validate()?;

    let fetcher = HttpFetcher::new(&config.user_agent, config.max_retries)?;

    if let Some(url) = args.test_url {
        return test_url_fetch(&fetcher, &url, &config.base_url).await;
    }

    tracing::info!("Starting avitomap...");

    let geography = GeoTable::morocco()?;
    tracing::debug!("Geography table: {} boxes", geography.boxes().count());

    let mut scraper = AvitoScraper::from_config(&config, Box::new(fetcher), geography)?
        .with_multi_city(args.multi);
    if let Some(seed) = args.seed {
        scraper = scraper.with_seed(seed);
    }

    let mut registry = ScraperRegistry::new();
    registry.register(Box::new(scraper));

    tracing::info!("Registered scrapers: {:?}", registry.list_scrapers());
    if args.multi {
        tracing::info!("Cities: all (multi-city search), {} pages", config.pages);
    } else {
        tracing::info!("Cities: {:?}, {} pages each", config.cities, config.pages);
    }
    tracing::info!("Date filter: {}", config.date_filter.as_str());

    let scraped_at = chrono::Utc::now();
    let listings = registry.scrape_all(&config.cities).await?;

    let meta_cities = if args.multi {
        vec!["ALL".to_string()]
    } else {
        config.cities.clone()
    };
    let geocoded = listings.iter().filter(|l| l.coordinates().is_some()).count();
    let document = output::build_output(&config.source, &meta_cities, config.date_filter, scraped_at, listings);
    output::write_output(&config.output, &document)?;

    tracing::info!("Done: {} listings ({} geocoded) -> {}", document.meta.total, geocoded, config.output);

    Ok(())
}

/// Resolves `--city` against the configured cities, ignoring case.
fn select_city(cities: &[String], requested: &str) -> Result<String> {
    match cities.iter().find(|c| c.eq_ignore_ascii_case(requested.trim())) {
        Some(city) => Ok(city.clone()),
        None => bail!("Unknown city '{}'. Choose from: {}", requested, cities.join(", ")),
    }
}

/// Test URL fetching - prints the candidate blocks a result page yields
async fn test_url_fetch(fetcher: &HttpFetcher, url: &str, base_url: &str) -> Result<()> {
    println!("Testing URL fetch: {}", url);
    println!("{}", "=".repeat(80));

    let body = fetcher.fetch(url).await?;
    println!("Total length: {} bytes", body.len());

    let candidates = AvitoScraper::extract_candidates(&body, base_url);
    println!("Found {} candidate cards", candidates.len());
    println!("{}", "=".repeat(80));

    for (i, candidate) in candidates.iter().enumerate() {
        println!("\nCard #{}", i + 1);
        println!("Link: {}", candidate.link);
        for line in candidate.block.lines() {
            println!("  | {}", line);
        }
        if !candidate.images.is_empty() {
            println!("Images: {:?}", candidate.images);
        }
        println!("{}", "-".repeat(80));
    }

    if candidates.is_empty() {
        println!("No cards found. This might mean:");
        println!("  - The card selectors need updating");
        println!("  - The website structure has changed");
        println!("  - An anti-bot page was served instead of results");
    }

    Ok(())
}
