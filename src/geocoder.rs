use crate::geography::{GeoBox, GeoTable};
use rand::Rng;

/// Approximate coordinates for a listing that only names its neighborhood.
///
/// Latitude and longitude are drawn independently and uniformly inside the
/// best box from `table`, so two calls with the same input usually differ.
/// Returns `None` when neither the neighborhood nor the city is known.
pub fn geocode<R: Rng + ?Sized>(
    table: &GeoTable,
    neighborhood: Option<&str>,
    city: Option<&str>,
    rng: &mut R,
) -> Option<(f64, f64)> {
    let bounds = table.lookup(neighborhood, city)?;
    Some(sample_in(&bounds, rng))
}

/// Uniform point inside `bounds`, rounded to 6 decimals.
pub fn sample_in<R: Rng + ?Sized>(bounds: &GeoBox, rng: &mut R) -> (f64, f64) {
    let lat = rng.gen_range(bounds.lat_min..=bounds.lat_max);
    let lng = rng.gen_range(bounds.lng_min..=bounds.lng_max);
    (
        round6(lat).clamp(bounds.lat_min, bounds.lat_max),
        round6(lng).clamp(bounds.lng_min, bounds.lng_max),
    )
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
