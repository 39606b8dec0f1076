use crate::config::DateFilter;
use crate::models::{Listing, Meta, Output};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

pub fn build_output(
    source: &str,
    cities: &[String],
    date_filter: DateFilter,
    scraped_at: DateTime<Utc>,
    listings: Vec<Listing>,
) -> Output {
    Output {
        meta: Meta {
            source: source.to_string(),
            cities: cities.to_vec(),
            total: listings.len(),
            date_filter: date_filter.as_str().to_string(),
            scraped_at,
        },
        listings,
    }
}

/// Writes the document as pretty-printed JSON, creating missing parent
/// directories.
pub fn write_output(path: &str, output: &Output) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(output).context("Failed to serialize listings")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;

    tracing::info!("Wrote {} listings to {}", output.meta.total, path);
    Ok(())
}
