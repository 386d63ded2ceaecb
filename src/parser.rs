//! Extraction of structured attributes from free listing text.
//!
//! Every rule is a standalone function. Rules that can fail return `None`;
//! dropping incomplete rows is left to [`ParsedFeatures::into_training_row`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Fuel, ParsedFeatures, RawListing, Transmission};

static YEAR_AT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]{4})").expect("year regex"));
static YEAR_LABELLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Rok výroby:\s*([0-9]{4})").expect("labelled year regex"));
// \s is Unicode aware, so NBSP thousands separators are covered.
static MILEAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9][0-9\s]*)\s*km").expect("mileage regex"));

const AUTOMATIC_TOKEN: &str = "Automatická";
const URL_MARKERS: [&str; 3] = ["http", "www", ".cz"];
const DETAIL_SEGMENT: &str = "detail";

pub fn parse_year(text: &str) -> Option<i32> {
    YEAR_AT_START
        .captures(text)
        .or_else(|| YEAR_LABELLED.captures(text))
        .and_then(|caps| caps[1].parse().ok())
}

pub fn parse_mileage(text: &str) -> Option<i64> {
    let caps = MILEAGE.captures(text)?;
    let digits: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
    digits.parse().ok()
}

/// First fuel of [`Fuel::PRIORITY`] mentioned anywhere in the text.
pub fn parse_fuel(text: &str) -> Fuel {
    Fuel::PRIORITY
        .into_iter()
        .find(|fuel| text.contains(fuel.as_str()))
        .unwrap_or(Fuel::Other)
}

pub fn parse_transmission(text: &str) -> Transmission {
    if text.contains(AUTOMATIC_TOKEN) {
        Transmission::Automaticka
    } else {
        Transmission::Manualni
    }
}

/// Price as listed, digits only. Zero and garbage yield `None`.
pub fn parse_price(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|p: &i64| *p > 0)
}

pub fn is_url_like(text: &str) -> bool {
    URL_MARKERS.iter().any(|m| text.contains(m))
}

pub fn parse_brand(title: &str) -> Option<String> {
    let token = if is_url_like(title) {
        let mut parts = title.split('/');
        parts.find(|p| *p == DETAIL_SEGMENT)?;
        parts.next()?.to_string()
    } else {
        let first_line = title.lines().next()?;
        first_line
            .split_whitespace()
            .next()?
            .replace(',', "")
            .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '-')
            .trim()
            .to_string()
    };

    if token.is_empty() {
        return None;
    }
    Some(normalize_brand(&token))
}

/// Capitalizes the token and collapses well-known spelling variants.
pub fn normalize_brand(token: &str) -> String {
    let lower = token.to_lowercase();
    match lower.as_str() {
        "bmw" => return "BMW".into(),
        "mercedes-benz" => return "Mercedes-Benz".into(),
        "vw" | "volkswagen" => return "Volkswagen".into(),
        "skoda" | "škoda" => return "Škoda".into(),
        _ => {}
    }
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Applies every rule to one listing: the title yields the brand, the
/// description everything else.
pub fn parse_listing(listing: &RawListing) -> ParsedFeatures {
    let text = listing.description.as_str();
    ParsedFeatures {
        year: parse_year(text),
        mileage: parse_mileage(text),
        fuel: parse_fuel(text),
        transmission: parse_transmission(text),
        brand: parse_brand(&listing.title),
    }
}
