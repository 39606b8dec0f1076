use crate::geocoder::geocode;
use crate::geography::GeoTable;
use crate::models::{price_per_m2, Listing};
use crate::parsers::{parse_price, parse_relative_time, parse_surface_in_title, LocationParser, StatsGrammar};
use crate::segmenter::{BlockSegmenter, RawBlock};
use chrono::{DateTime, Utc};
use rand::Rng;

/// One listing card found on a result page, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub link: String,
    pub block: RawBlock,
    pub images: Vec<String>,
}

/// What the caller knows about the page a card came from.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub page: u32,
    /// City the search was filtered on, if any.
    pub city: Option<&'a str>,
    pub scraped_at: DateTime<Utc>,
}

/// Turns candidates into listings.
pub struct RecordAssembler<'a> {
    locations: &'a LocationParser,
    grammar: &'a StatsGrammar,
    segmenter: BlockSegmenter<'a>,
    geography: &'a GeoTable,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(locations: &'a LocationParser, grammar: &'a StatsGrammar, geography: &'a GeoTable) -> Self {
        Self {
            locations,
            grammar,
            segmenter: BlockSegmenter::new(locations, grammar),
            geography,
        }
    }

    /// Build a listing from one candidate.
    ///
    /// Fields that cannot be read are left empty. Returns `None` only when the
    /// card has neither a title nor a price.
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        candidate: &Candidate,
        ctx: &PageContext<'_>,
        rng: &mut R,
    ) -> Option<Listing> {
        if candidate.block.is_empty() {
            tracing::debug!("Discarding {} - card has no text", candidate.link);
            return None;
        }

        let segments = self.segmenter.segment(&candidate.block);
        let parsed = segments.location.and_then(|line| self.locations.parse(line));

        // Location line first, then the page filter, then names found in the
        // card text (title included).
        let card_text = candidate.block.lines().join(" ");
        let city = parsed
            .as_ref()
            .and_then(|p| p.city.clone())
            .or_else(|| ctx.city.map(str::to_string))
            .or_else(|| self.geography.city_in_text(&card_text).map(str::to_string));
        let neighborhood = match parsed.as_ref().and_then(|p| p.neighborhood.as_deref()) {
            Some(raw) => Some(
                self.geography
                    .canonical_neighborhood(raw, city.as_deref())
                    .unwrap_or(raw)
                    .to_string(),
            ),
            None => self
                .geography
                .neighborhood_in_text(&card_text, city.as_deref())
                .map(str::to_string),
        };

        let title = segments.title.unwrap_or_default().to_string();
        let (rooms, stats_surface) = match segments.stats.and_then(|line| self.grammar.parse_rooms(line)) {
            Some((rooms, surface)) => (Some(rooms), surface),
            None => (None, None),
        };
        let surface = stats_surface.or_else(|| parse_surface_in_title(&title));
        let price = segments.price.and_then(parse_price);

        let (lat, lng) = match geocode(self.geography, neighborhood.as_deref(), city.as_deref(), rng) {
            Some((lat, lng)) => (Some(lat), Some(lng)),
            None => (None, None),
        };

        let listing = Listing {
            title,
            property_type: parsed.as_ref().map(|p| p.property_type).unwrap_or_default(),
            city,
            neighborhood,
            lat,
            lng,
            price,
            surface,
            rooms,
            price_m2: price_per_m2(price, surface),
            location: parsed.map(|p| p.phrase).unwrap_or_default(),
            link: candidate.link.clone(),
            images: candidate.images.clone(),
            published_at: segments.time.map(|t| parse_relative_time(t, ctx.scraped_at)),
            time_text: segments.time.map(str::to_string),
            scraped_at: ctx.scraped_at,
            id: None,
            page: ctx.page,
        };

        if !listing.has_sufficient_info() {
            tracing::debug!("Discarding {} - no title and no price", candidate.link);
            return None;
        }

        tracing::trace!("Assembled {} - {} (price: {:?}, surface: {:?}, rooms: {:?}, at: {:?})",
            listing.link, listing.title, listing.price, listing.surface, listing.rooms, listing.coordinates());
        Some(listing)
    }

    /// Assemble every candidate of a page, in order.
    pub fn assemble_page<R: Rng + ?Sized>(
        &self,
        candidates: &[Candidate],
        ctx: &PageContext<'_>,
        rng: &mut R,
    ) -> Vec<Listing> {
        candidates
            .iter()
            .filter_map(|candidate| self.assemble(candidate, ctx, rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::GeoBox;
    use crate::models::PropertyType;
    use crate::parsers::CategoryLabel;
    use crate::tracker::PageTracker;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        locations: LocationParser,
        grammar: StatsGrammar,
        geography: GeoTable,
    }

    impl Fixture {
        fn new() -> Self {
            let geography = GeoTable::morocco().unwrap();
            let cities: Vec<String> = geography.city_names().map(str::to_string).collect();
            Self {
                locations: LocationParser::new(
                    &[
                        CategoryLabel::new("Appartements", PropertyType::Apartment),
                        CategoryLabel::new("Villas et maisons de luxe", PropertyType::Villa),
                    ],
                    &cities,
                )
                .unwrap(),
                grammar: StatsGrammar::standard().unwrap(),
                geography,
            }
        }

        fn assembler(&self) -> RecordAssembler<'_> {
            RecordAssembler::new(&self.locations, &self.grammar, &self.geography)
        }
    }

    fn ctx() -> PageContext<'static> {
        PageContext {
            page: 2,
            city: None,
            scraped_at: Utc.with_ymd_and_hms(2026, 2, 19, 12, 0, 0).unwrap(),
        }
    }

    fn candidate(link: &str, lines: &[&str]) -> Candidate {
        Candidate {
            link: link.to_string(),
            block: RawBlock::new(lines.iter()),
            images: vec!["https://content.avito.ma/classifieds/images/1.jpg".to_string()],
        }
    }

    fn gauthier_card() -> Candidate {
        candidate(
            "https://www.avito.ma/fr/gauthier/appartements/Appartement_55.htm",
            &[
                "il y a 3 heures",
                "Appartements dans Casablanca, Gauthier",
                "Appartement de standing",
                "3 2 187 m²4",
                "4 000 000 DH22 233 DH / mois",
            ],
        )
    }

    #[test]
    fn test_assemble_full_card() {
        let fixture = Fixture::new();
        let listing = fixture
            .assembler()
            .assemble(&gauthier_card(), &ctx(), &mut StdRng::seed_from_u64(1))
            .expect("card has title and price");

        assert_eq!(listing.title, "Appartement de standing");
        assert_eq!(listing.property_type, PropertyType::Apartment);
        assert_eq!(listing.city.as_deref(), Some("Casablanca"));
        assert_eq!(listing.neighborhood.as_deref(), Some("Gauthier"));
        assert_eq!(listing.price, Some(4_000_000));
        assert_eq!(listing.surface, Some(187));
        assert_eq!(listing.rooms, Some(3));
        assert_eq!(listing.price_m2, Some(21390));
        assert_eq!(listing.location, "Casablanca, Gauthier");
        assert_eq!(listing.time_text.as_deref(), Some("il y a 3 heures"));
        assert_eq!(listing.published_at, Some(ctx().scraped_at - Duration::hours(3)));
        assert_eq!(listing.page, 2);
        assert_eq!(listing.id, None);
        assert_eq!(listing.images.len(), 1);

        let (lat, lng) = listing.coordinates().expect("Gauthier is known");
        let bounds = fixture.geography.lookup(Some("Gauthier"), Some("Casablanca")).unwrap();
        assert!(bounds.contains(lat, lng));
    }

    #[test]
    fn test_assemble_is_idempotent_with_fixed_rng() {
        let fixture = Fixture::new();
        let assembler = fixture.assembler();
        let card = gauthier_card();

        let first = assembler.assemble(&card, &ctx(), &mut StdRng::seed_from_u64(9)).unwrap();
        let second = assembler.assemble(&card, &ctx(), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(first, second);

        let third = assembler.assemble(&card, &ctx(), &mut StdRng::seed_from_u64(10)).unwrap();
        assert_eq!(Listing { lat: None, lng: None, ..first }, Listing { lat: None, lng: None, ..third });
    }

    #[test]
    fn test_price_without_surface_has_no_price_m2() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_1.htm",
            &["Appartements dans Casablanca, Oasis", "Appartement Oasis", "3 4 6", "1 250 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(listing.rooms, Some(3));
        assert_eq!(listing.surface, None);
        assert_eq!(listing.price, Some(1_250_000));
        assert_eq!(listing.price_m2, None);
    }

    #[test]
    fn test_surface_falls_back_to_title() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_2.htm",
            &["Appartements dans Rabat, Agdal", "Bel appartement 110 m² Agdal", "3 2 9", "1 100 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(listing.surface, Some(110));
        assert_eq!(listing.price_m2, Some(10000));
    }

    #[test]
    fn test_empty_title_and_no_price_is_dropped() {
        let fixture = Fixture::new();
        let card = candidate("https://www.avito.ma/fr/x_3.htm", &["Nouveau", "3 2 187 m²4"]);
        assert_eq!(fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(1)), None);
    }

    #[test]
    fn test_card_without_text_is_dropped() {
        let fixture = Fixture::new();
        let card = candidate("https://www.avito.ma/fr/x_13.htm", &["   ", ""]);
        assert!(card.block.is_empty());
        let page = PageContext { city: Some("Rabat"), ..ctx() };
        assert_eq!(fixture.assembler().assemble(&card, &page, &mut StdRng::seed_from_u64(1)), None);
    }

    #[test]
    fn test_empty_title_with_price_is_kept() {
        let fixture = Fixture::new();
        let card = candidate("https://www.avito.ma/fr/x_4.htm", &["Nouveau", "700 000 DH"]);
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(listing.title, "");
        assert_eq!(listing.price, Some(700_000));
        assert_eq!(listing.city, None);
        assert_eq!(listing.location, "");
        assert_eq!(listing.coordinates(), None);
        assert_eq!(listing.published_at, None);
    }

    #[test]
    fn test_page_city_fills_missing_city() {
        let fixture = Fixture::new();
        let card = candidate("https://www.avito.ma/fr/x_5.htm", &["Appartement sans catégorie", "700 000 DH"]);
        let page = PageContext { city: Some("Agadir"), ..ctx() };
        let listing = fixture.assembler().assemble(&card, &page, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(listing.city.as_deref(), Some("Agadir"));
        let (lat, lng) = listing.coordinates().unwrap();
        assert!(fixture.geography.lookup(None, Some("Agadir")).unwrap().contains(lat, lng));
    }

    #[test]
    fn test_neighborhood_is_canonicalized() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_6.htm",
            &["Villas et maisons de luxe dans Marrakech, Guéliz", "Villa avec piscine", "900 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(listing.property_type, PropertyType::Villa);
        assert_eq!(listing.neighborhood.as_deref(), Some("Gueliz"));
    }

    #[test]
    fn test_neighborhood_found_in_title() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_9.htm",
            &["Appartements dans Casablanca", "Studio meublé Maârif", "1 1 45 m²", "750 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(listing.city.as_deref(), Some("Casablanca"));
        assert_eq!(listing.neighborhood.as_deref(), Some("Maarif"));
        let (lat, lng) = listing.coordinates().unwrap();
        assert!(fixture.geography.lookup(Some("Maarif"), Some("Casablanca")).unwrap().contains(lat, lng));
    }

    #[test]
    fn test_location_line_neighborhood_beats_title() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_10.htm",
            &["Appartements dans Casablanca, Racine", "Appartement proche Maarif", "980 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(listing.neighborhood.as_deref(), Some("Racine"));
    }

    #[test]
    fn test_city_found_in_card_text_without_location_line() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_11.htm",
            &["Nouveau", "Appartement à Tanger, Malabata", "1 300 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(listing.title, "");
        assert_eq!(listing.city.as_deref(), Some("Tanger"));
        assert_eq!(listing.neighborhood.as_deref(), Some("Malabata"));
        assert!(listing.coordinates().is_some());
    }

    #[test]
    fn test_page_city_beats_city_in_text() {
        let fixture = Fixture::new();
        let card = candidate("https://www.avito.ma/fr/x_12.htm", &["Appartement style Marrakech", "600 000 DH"]);
        let page = PageContext { city: Some("Rabat"), ..ctx() };
        let listing = fixture.assembler().assemble(&card, &page, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(listing.city.as_deref(), Some("Rabat"));
    }

    #[test]
    fn test_unknown_neighborhood_uses_city_box() {
        let fixture = Fixture::new();
        let card = candidate(
            "https://www.avito.ma/fr/x_7.htm",
            &["Appartements dans Tanger, Quartier Inconnu", "Appartement vue mer", "800 000 DH"],
        );
        let listing = fixture.assembler().assemble(&card, &ctx(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(listing.neighborhood.as_deref(), Some("Quartier Inconnu"));
        let (lat, lng) = listing.coordinates().unwrap();
        let city_box: GeoBox = fixture.geography.lookup(None, Some("Tanger")).unwrap();
        assert!(city_box.contains(lat, lng));
    }

    #[test]
    fn test_duplicate_links_yield_one_record() {
        let fixture = Fixture::new();
        let mut tracker = PageTracker::new(&["immoneuf".to_string()]);
        let candidates = tracker.filter_new(vec![
            gauthier_card(),
            gauthier_card(),
            candidate("https://immoneuf.avito.ma/fr/projet_8.htm", &["Appartements dans Rabat", "Projet neuf", "600 000 DH"]),
        ]);
        let listings = fixture
            .assembler()
            .assemble_page(&candidates, &ctx(), &mut StdRng::seed_from_u64(1));
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].link, gauthier_card().link);
    }
}
