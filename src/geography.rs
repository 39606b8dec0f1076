use anyhow::{bail, Result};
use std::collections::HashMap;

/// Closed rectangle in (latitude, longitude) degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl GeoBox {
    pub const fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Self {
        Self { lat_min, lat_max, lng_min, lng_max }
    }

    pub fn is_valid(&self) -> bool {
        [self.lat_min, self.lat_max, self.lng_min, self.lng_max]
            .iter()
            .all(|v| v.is_finite())
            && self.lat_min < self.lat_max
            && self.lng_min < self.lng_max
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lng_min..=self.lng_max).contains(&lng)
    }
}

#[derive(Debug, Clone)]
struct NeighborhoodEntry {
    name: String,
    city_key: String,
    bounds: GeoBox,
}

#[derive(Debug, Clone)]
struct CityEntry {
    name: String,
    bounds: GeoBox,
}

/// Immutable registry of city and neighborhood boxes.
///
/// Names are matched through [`fold_key`], so "Belvédère", "belvedere" and
/// "BELVEDERE" resolve to the same entry. A neighborhood name may exist in
/// several cities; the entry belonging to the requested city wins, and any
/// entry of that name beats the city box.
#[derive(Debug, Clone)]
pub struct GeoTable {
    cities: Vec<CityEntry>,
    city_index: HashMap<String, usize>,
    neighborhoods: HashMap<String, Vec<NeighborhoodEntry>>,
    aliases: HashMap<String, String>,
}

impl GeoTable {
    /// Builds a table from `(city, box)` pairs, `(city, neighborhood, box)`
    /// triples and `(alias, neighborhood)` pairs.
    ///
    /// Fails on any inverted or non-finite box, on a neighborhood whose city is
    /// unknown, and on an alias pointing at an unknown neighborhood.
    pub fn from_entries(
        cities: &[(&str, GeoBox)],
        neighborhoods: &[(&str, &str, GeoBox)],
        aliases: &[(&str, &str)],
    ) -> Result<Self> {
        let mut table = GeoTable {
            cities: Vec::with_capacity(cities.len()),
            city_index: HashMap::new(),
            neighborhoods: HashMap::new(),
            aliases: HashMap::new(),
        };

        for (name, bounds) in cities {
            if !bounds.is_valid() {
                bail!("Invalid bounding box for city '{}': {:?}", name, bounds);
            }
            let key = fold_key(name);
            if table.city_index.contains_key(&key) {
                bail!("Duplicate city '{}' in geography table", name);
            }
            table.city_index.insert(key, table.cities.len());
            table.cities.push(CityEntry {
                name: name.to_string(),
                bounds: *bounds,
            });
        }

        for (city, name, bounds) in neighborhoods {
            if !bounds.is_valid() {
                bail!("Invalid bounding box for neighborhood '{}' ({}): {:?}", name, city, bounds);
            }
            let city_key = fold_key(city);
            if !table.city_index.contains_key(&city_key) {
                bail!("Neighborhood '{}' refers to unknown city '{}'", name, city);
            }
            table
                .neighborhoods
                .entry(fold_key(name))
                .or_default()
                .push(NeighborhoodEntry {
                    name: name.to_string(),
                    city_key,
                    bounds: *bounds,
                });
        }

        for (alias, target) in aliases {
            let target_key = fold_key(target);
            if !table.neighborhoods.contains_key(&target_key) {
                bail!("Alias '{}' points at unknown neighborhood '{}'", alias, target);
            }
            table.aliases.insert(fold_key(alias), target_key);
        }

        Ok(table)
    }

    /// The built-in table for the six supported Moroccan cities.
    pub fn morocco() -> Result<Self> {
        Self::from_entries(MOROCCO_CITIES, MOROCCO_NEIGHBORHOODS, MOROCCO_ALIASES)
    }

    /// Best box for a listing: the neighborhood's box when known, else the
    /// city's box, else `None`.
    pub fn lookup(&self, neighborhood: Option<&str>, city: Option<&str>) -> Option<GeoBox> {
        if let Some(entry) = neighborhood.and_then(|n| self.find_neighborhood(n, city)) {
            return Some(entry.bounds);
        }
        city.and_then(|c| self.find_city(c)).map(|entry| entry.bounds)
    }

    /// Display name of a known neighborhood, e.g. "guéliz" -> "Gueliz".
    pub fn canonical_neighborhood(&self, neighborhood: &str, city: Option<&str>) -> Option<&str> {
        self.find_neighborhood(neighborhood, city)
            .map(|entry| entry.name.as_str())
    }

    pub fn city_names(&self) -> impl Iterator<Item = &str> {
        self.cities.iter().map(|entry| entry.name.as_str())
    }

    /// Every box in the table, labelled with its name.
    pub fn boxes(&self) -> impl Iterator<Item = (&str, GeoBox)> {
        self.cities
            .iter()
            .map(|c| (c.name.as_str(), c.bounds))
            .chain(
                self.neighborhoods
                    .values()
                    .flatten()
                    .map(|n| (n.name.as_str(), n.bounds)),
            )
    }

    fn find_city(&self, city: &str) -> Option<&CityEntry> {
        self.city_index
            .get(&fold_key(city))
            .map(|&idx| &self.cities[idx])
    }

    fn find_neighborhood(&self, neighborhood: &str, city: Option<&str>) -> Option<&NeighborhoodEntry> {
        let mut key = fold_key(neighborhood);
        if let Some(target) = self.aliases.get(&key) {
            key = target.clone();
        }
        let candidates = self.neighborhoods.get(&key)?;

        // The city only picks between entries sharing a name.
        city.map(fold_key)
            .and_then(|city_key| candidates.iter().find(|entry| entry.city_key == city_key))
            .or_else(|| candidates.first())
    }

    /// Canonical name of the longest known neighborhood (or alias) written
    /// as whole words in free text such as a title. With a city, only that
    /// city's neighborhoods are considered.
    pub fn neighborhood_in_text(&self, text: &str, city: Option<&str>) -> Option<&str> {
        let haystack = format!(" {} ", fold_key(text));
        let city_key = city.map(fold_key);

        let names = self.neighborhoods.keys().map(|key| (key, key));
        let aliases = self.aliases.iter();
        names
            .chain(aliases)
            .filter(|(key, _)| haystack.contains(&format!(" {} ", key)))
            .filter_map(|(key, target)| {
                let entries = self.neighborhoods.get(target)?;
                let entry = match &city_key {
                    Some(city_key) => entries.iter().find(|e| &e.city_key == city_key)?,
                    None => entries.first()?,
                };
                Some((key.len(), entry))
            })
            .max_by(|(a_len, a), (b_len, b)| a_len.cmp(b_len).then_with(|| b.name.cmp(&a.name)))
            .map(|(_, entry)| entry.name.as_str())
    }

    /// Known city named as whole words in free text.
    pub fn city_in_text(&self, text: &str) -> Option<&str> {
        let haystack = format!(" {} ", fold_key(text));
        self.cities
            .iter()
            .find(|entry| haystack.contains(&format!(" {} ", fold_key(&entry.name))))
            .map(|entry| entry.name.as_str())
    }
}

/// Lowercases, strips diacritics and apostrophes, and collapses separators.
pub fn fold_key(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => folded.push('a'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => folded.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ç' => folded.push('c'),
            'ñ' => folded.push('n'),
            'ÿ' => folded.push('y'),
            'œ' => folded.push_str("oe"),
            'æ' => folded.push_str("ae"),
            '\'' | '’' | '‘' | '`' | 'ʼ' => {}
            '-' | '_' | ',' | '.' => folded.push(' '),
            c if c.is_whitespace() => folded.push(' '),
            c => folded.push(c),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

const MOROCCO_CITIES: &[(&str, GeoBox)] = &[
    ("Casablanca", GeoBox::new(33.520, 33.630, -7.710, -7.540)),
    ("Agadir", GeoBox::new(30.380, 30.470, -9.640, -9.540)),
    ("Marrakech", GeoBox::new(31.580, 31.680, -8.060, -7.920)),
    ("Tanger", GeoBox::new(35.720, 35.810, -5.870, -5.740)),
    ("Rabat", GeoBox::new(33.930, 34.060, -6.900, -6.790)),
    ("Mohammedia", GeoBox::new(33.660, 33.720, -7.430, -7.360)),
];

const MOROCCO_NEIGHBORHOODS: &[(&str, &str, GeoBox)] = &[
    ("Casablanca", "Ain Diab", GeoBox::new(33.582, 33.596, -7.705, -7.665)),
    ("Casablanca", "Anfa", GeoBox::new(33.583, 33.598, -7.668, -7.640)),
    ("Casablanca", "Casa Anfa", GeoBox::new(33.568, 33.580, -7.665, -7.643)),
    ("Casablanca", "Racine", GeoBox::new(33.583, 33.597, -7.651, -7.628)),
    ("Casablanca", "Gauthier", GeoBox::new(33.582, 33.595, -7.636, -7.611)),
    ("Casablanca", "Maarif", GeoBox::new(33.572, 33.593, -7.648, -7.622)),
    ("Casablanca", "Californie", GeoBox::new(33.562, 33.581, -7.650, -7.622)),
    ("Casablanca", "Triangle d'Or", GeoBox::new(33.585, 33.598, -7.638, -7.618)),
    ("Casablanca", "Centre Ville", GeoBox::new(33.585, 33.603, -7.626, -7.598)),
    ("Casablanca", "Bourgogne", GeoBox::new(33.573, 33.591, -7.626, -7.600)),
    ("Casablanca", "Val Fleuri", GeoBox::new(33.570, 33.589, -7.640, -7.612)),
    ("Casablanca", "Palmier", GeoBox::new(33.564, 33.582, -7.618, -7.590)),
    ("Casablanca", "Belvedere", GeoBox::new(33.578, 33.596, -7.617, -7.589)),
    ("Casablanca", "Derb Sultan", GeoBox::new(33.574, 33.593, -7.612, -7.583)),
    ("Casablanca", "CIL", GeoBox::new(33.557, 33.575, -7.618, -7.589)),
    ("Casablanca", "Sidi Belyout", GeoBox::new(33.591, 33.606, -7.628, -7.603)),
    ("Casablanca", "Hay Mohammadi", GeoBox::new(33.585, 33.603, -7.602, -7.572)),
    ("Casablanca", "Roches Noires", GeoBox::new(33.587, 33.607, -7.587, -7.556)),
    ("Casablanca", "Ain Sebaa", GeoBox::new(33.603, 33.625, -7.590, -7.548)),
    ("Casablanca", "Sidi Bernoussi", GeoBox::new(33.594, 33.612, -7.577, -7.545)),
    ("Casablanca", "Oasis", GeoBox::new(33.548, 33.572, -7.650, -7.618)),
    ("Casablanca", "Hay Hassani", GeoBox::new(33.536, 33.563, -7.682, -7.644)),
    ("Casablanca", "Ain Chock", GeoBox::new(33.556, 33.573, -7.636, -7.606)),
    ("Casablanca", "Oulfa", GeoBox::new(33.527, 33.553, -7.670, -7.633)),
    ("Casablanca", "Sidi Maarouf", GeoBox::new(33.521, 33.551, -7.648, -7.613)),
    ("Casablanca", "Hay Riad", GeoBox::new(33.548, 33.565, -7.642, -7.614)),
    ("Casablanca", "Moulay Rachid", GeoBox::new(33.548, 33.566, -7.612, -7.582)),
    ("Casablanca", "Ben M'Sick", GeoBox::new(33.561, 33.577, -7.616, -7.590)),
    ("Casablanca", "Sbata", GeoBox::new(33.570, 33.585, -7.607, -7.582)),
    ("Agadir", "Founty", GeoBox::new(30.388, 30.406, -9.625, -9.595)),
    ("Agadir", "Talborjt", GeoBox::new(30.414, 30.430, -9.600, -9.575)),
    ("Agadir", "Hay Almassira", GeoBox::new(30.395, 30.415, -9.575, -9.545)),
    ("Agadir", "Centre Agadir", GeoBox::new(30.418, 30.432, -9.592, -9.568)),
    ("Agadir", "Dakhla", GeoBox::new(30.402, 30.418, -9.605, -9.580)),
    ("Agadir", "Anza", GeoBox::new(30.440, 30.465, -9.610, -9.580)),
    ("Marrakech", "Gueliz", GeoBox::new(31.630, 31.648, -8.022, -7.992)),
    ("Marrakech", "Hivernage", GeoBox::new(31.614, 31.632, -8.010, -7.985)),
    ("Marrakech", "Medina", GeoBox::new(31.618, 31.636, -7.998, -7.975)),
    ("Marrakech", "Palmeraie", GeoBox::new(31.638, 31.665, -7.960, -7.925)),
    ("Marrakech", "Majorelle", GeoBox::new(31.636, 31.650, -8.002, -7.978)),
    ("Marrakech", "Targa", GeoBox::new(31.596, 31.616, -8.020, -7.995)),
    ("Marrakech", "Massira", GeoBox::new(31.598, 31.618, -7.998, -7.970)),
    ("Tanger", "Malabata", GeoBox::new(35.778, 35.796, -5.778, -5.745)),
    ("Tanger", "Centre Tanger", GeoBox::new(35.765, 35.782, -5.820, -5.790)),
    ("Tanger", "Marshan", GeoBox::new(35.778, 35.795, -5.825, -5.798)),
    ("Tanger", "Iberia", GeoBox::new(35.756, 35.775, -5.812, -5.785)),
    ("Tanger", "Achakar", GeoBox::new(35.740, 35.760, -5.870, -5.840)),
    ("Rabat", "Agdal", GeoBox::new(33.990, 34.010, -6.860, -6.830)),
    ("Rabat", "Hassan", GeoBox::new(34.010, 34.030, -6.850, -6.820)),
    ("Rabat", "Souissi", GeoBox::new(33.990, 34.015, -6.825, -6.795)),
    ("Rabat", "Les Orangers", GeoBox::new(34.005, 34.025, -6.870, -6.840)),
    ("Rabat", "Yacoub El Mansour", GeoBox::new(33.975, 33.998, -6.875, -6.845)),
    ("Mohammedia", "Centre Mohammedia", GeoBox::new(33.688, 33.706, -7.402, -7.372)),
    ("Mohammedia", "Ain Harrouda", GeoBox::new(33.660, 33.682, -7.428, -7.398)),
];

const MOROCCO_ALIASES: &[(&str, &str)] = &[
    ("Bernoussi", "Sidi Bernoussi"),
    ("Belyout", "Sidi Belyout"),
    ("Centre-ville", "Centre Ville"),
    ("Maârif", "Maarif"),
    ("Ben Msik", "Ben M'Sick"),
    ("Almassira", "Hay Almassira"),
    ("Mechouar", "Hassan"),
];
