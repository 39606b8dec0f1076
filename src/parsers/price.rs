use regex::Regex;
use std::sync::LazyLock;

// Digit groups may be split by spaces, NBSP, narrow NBSP, dots or commas.
// The amount must start at a number boundary, never inside a longer figure.
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d])(\d{1,3}(?:[ \u{00a0}\u{202f}.,]\d{3})+|\d+)\s*(?:DHS?|MAD)")
        .expect("valid price regex")
});

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d\s*(?:DH|MAD)").expect("valid currency regex"));

static ON_REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)demander\s+le\s+prix|prix\s+sur\s+demande|prix\s+[àa]\s+discuter|nous\s+consulter")
        .expect("valid price-on-request regex")
});

/// Parse the sale price from a line such as "700 000 DH".
///
/// Listing cards often glue a monthly-installment estimate onto the sale
/// price ("4 000 000 DH22 233 DH / mois"); the first amount is the price.
/// A "price on request" phrase without any amount yields `None`.
pub fn parse_price(line: &str) -> Option<u64> {
    let Some(caps) = PRICE_RE.captures(line) else {
        if is_price_on_request(line) {
            tracing::trace!("Price on request: '{}'", line);
        }
        return None;
    };
    let digits: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok()
}

pub fn is_price_on_request(line: &str) -> bool {
    ON_REQUEST_RE.is_match(line)
}

/// True for lines that carry an amount in dirhams, or say the price is on
/// request.
pub fn is_price_line(line: &str) -> bool {
    CURRENCY_RE.is_match(line) || is_price_on_request(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_standard_format() {
        assert_eq!(parse_price("700 000 DH"), Some(700_000));
    }

    #[test]
    fn test_parse_price_first_amount_wins() {
        assert_eq!(parse_price("4 000 000 DH22 233 DH / mois"), Some(4_000_000));
    }

    #[test]
    fn test_parse_price_non_breaking_spaces() {
        assert_eq!(parse_price("1\u{00a0}250\u{00a0}000\u{00a0}DH"), Some(1_250_000));
        assert_eq!(parse_price("980\u{202f}000 DH"), Some(980_000));
    }

    #[test]
    fn test_parse_price_dot_separator_and_unspaced() {
        assert_eq!(parse_price("2.300.000 Dhs"), Some(2_300_000));
        assert_eq!(parse_price("1500000DH"), Some(1_500_000));
        assert_eq!(parse_price("850 000 MAD"), Some(850_000));
    }

    #[test]
    fn test_parse_price_ignores_leading_unrelated_numbers() {
        assert_eq!(parse_price("Prix: 3 pièces 900 000 DH"), Some(900_000));
    }

    #[test]
    fn test_parse_price_on_request() {
        assert_eq!(parse_price("Demander le prix"), None);
        assert_eq!(parse_price("Prix sur demande"), None);
        assert!(is_price_line("Demander le prix"));
    }

    #[test]
    fn test_parse_price_with_negotiation_badge() {
        assert_eq!(parse_price("850 000 DH Prix à discuter"), Some(850_000));
        assert_eq!(parse_price("Nous consulter 1 200 000 DH"), Some(1_200_000));
    }

    #[test]
    fn test_parse_price_does_not_start_inside_a_number() {
        assert_eq!(parse_price("Réf 1234 750 000 DH"), Some(750_000));
        assert_eq!(parse_price("Lot 98765DH"), Some(98_765));
    }

    #[test]
    fn test_parse_price_without_marker() {
        assert_eq!(parse_price("Appartement 120 m² Maarif"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("Dhs"), None);
    }

    #[test]
    fn test_is_price_line() {
        assert!(is_price_line("700 000 DH"));
        assert!(is_price_line("4 000 000 DH22 233 DH / mois"));
        assert!(!is_price_line("Appartement DHIRA 3 chambres"));
        assert!(!is_price_line("3 2 187 m²4"));
    }
}
