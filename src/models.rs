use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Property category, derived from the listing's category label.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Apartment,
    Villa,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub title: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub city: Option<String>,
    #[serde(rename = "quartier")]
    pub neighborhood: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price: Option<u64>,
    pub surface: Option<u32>, // m²
    pub rooms: Option<u32>,
    pub price_m2: Option<u64>,
    pub location: String,
    pub link: String,
    pub images: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub time_text: Option<String>,
    pub scraped_at: DateTime<Utc>,
    /// Position in the final output, set once every source has been merged.
    pub id: Option<u64>,
    pub page: u32,
}

impl Listing {
    /// A listing needs at least a title or a price to be worth keeping
    pub fn has_sufficient_info(&self) -> bool {
        !self.title.trim().is_empty() || self.price.is_some()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

/// Rounded price per square meter, only when both inputs are known
pub fn price_per_m2(price: Option<u64>, surface: Option<u32>) -> Option<u64> {
    match (price, surface) {
        (Some(price), Some(surface)) if surface > 0 => {
            Some((price as f64 / surface as f64).round() as u64)
        }
        _ => None,
    }
}

/// Numbers listings 1..N in their current order.
pub fn assign_ids(listings: &mut [Listing]) {
    for (index, listing) in listings.iter_mut().enumerate() {
        listing.id = Some(index as u64 + 1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    pub source: String,
    pub cities: Vec<String>,
    pub total: usize,
    pub date_filter: String,
    pub scraped_at: DateTime<Utc>,
}

/// The document consumed by the map viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    pub meta: Meta,
    pub listings: Vec<Listing>,
}
