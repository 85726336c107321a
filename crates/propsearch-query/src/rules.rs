//! Compiled extraction patterns and the small parsers they feed.
//!
//! Every numeric pattern accepts `k`/`m`/`million` suffixes and thousands
//! separators. Bare amounts (no `$`, no suffix) only count as prices from
//! [`BARE_PRICE_FLOOR`] upwards so years and counts stay in the phrase.

use std::sync::LazyLock;

use propsearch_core::types::PropertyType;
use regex::{Captures, Regex};

pub const BARE_PRICE_FLOOR: f64 = 10_000.0;

const AMOUNT: &str = r"(\$)?\s*(\d[\d,]*(?:\.\d+)?)\s*(k|m|million)?\b";

const SMALL_NUMBER: &str = r"\d+|one|two|three|four|five|six|seven|eight|nine|ten";

pub static SQUARE_FEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:at\s+least|over|above|more\s+than|min(?:imum)?)\s+)?(\d[\d,]*)\s*\+?\s*(?:sq\.?\s*ft|sqft|square\s+f(?:ee|oo)t|sf)\b",
    )
    .expect("valid square feet regex")
});

/// Groups: 1 = "at least" prefix, 2 = lower end of an `N-M` range,
/// 3 = count, 4 = `+` / "or more".
pub static BEDROOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(at\s+least|min(?:imum)?)\s+)?(?:({SMALL_NUMBER})\s*(?:-|–|to)\s*)?({SMALL_NUMBER})\s*(\+|or\s+more)?\s*-?\s*(?:bed(?:room)?s?|bdrms?|bds?|br)\b"
    ))
    .expect("valid bedrooms regex")
});

pub static BATHROOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:at\s+least|min(?:imum)?)\s+)?(\d+(?:\.\d+)?|one|two|three|four|five)\s*(?:\+|or\s+more)?\s*-?\s*(?:bath(?:room)?s?|ba)\b",
    )
    .expect("valid bathrooms regex")
});

/// Groups 1-3 lower amount, 4-6 upper amount.
pub static PRICE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:\b(?:between|from)\s+)?{AMOUNT}\s*(?:-|–|to|and)\s*{AMOUNT}"))
        .expect("valid price range regex")
});

pub static PRICE_CEILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:under|below|less\s+than|cheaper\s+than|up\s+to|max(?:imum)?|at\s+most|no\s+more\s+than)\s+{AMOUNT}"
    ))
    .expect("valid price ceiling regex")
});

pub static PRICE_FLOOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:over|above|more\s+than|at\s+least|from|starting\s+at|min(?:imum)?)\s+{AMOUNT}"
    ))
    .expect("valid price floor regex")
});

pub static PROPERTY_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(houses?|homes?|single[\s-]family|apartments?|apts?|flats?|condos?|condominiums?|lofts?|townhouses?|townhomes?|rowhouses?|land|lots?|duplex(?:es)?|triplex(?:es)?|multi[\s-]?family)\b",
    )
    .expect("valid property type regex")
});

/// Case-sensitive on purpose: only capitalized place names count.
/// Group 1 is the place; a trailing `, XX` state code is consumed but not captured.
/// `.` and `-` only join word characters, so sentence punctuation is left out.
pub static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[Ii]n\s+([A-Z][\w']*(?:[.-][\w']+)*(?:\s+[A-Z][\w']*(?:[.-][\w']+)*)*)(?:,\s*[A-Z]{2}\b)?")
        .expect("valid location regex")
});

/// An amount parsed out of a match, with whether it carried a price marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amount {
    pub value: f64,
    pub has_dollar: bool,
    pub suffix: Option<f64>,
}

impl Amount {
    /// Read an amount from capture groups `first..first+3` (`$`, digits, suffix).
    pub fn from_captures(caps: &Captures<'_>, first: usize) -> Option<Self> {
        let digits = caps.get(first + 1)?.as_str();
        let value = parse_number(digits)?;
        let suffix = caps.get(first + 2).map(|m| suffix_multiplier(m.as_str()));
        Some(Self { value, has_dollar: caps.get(first).is_some(), suffix })
    }

    pub fn looks_like_price(&self) -> bool {
        self.has_dollar || self.suffix.is_some() || self.value >= BARE_PRICE_FLOOR
    }

    pub fn scaled(&self) -> f64 {
        self.value * self.suffix.unwrap_or(1.0)
    }

    /// Lower bound of a range whose upper bound is `upper`.
    ///
    /// A bare lower bound borrows the upper bound's suffix ("$500-700k" is
    /// 500k to 700k) unless it already reads as a full amount ("$500,000-700k").
    pub fn scaled_like(&self, upper: &Amount) -> f64 {
        match (self.suffix, upper.suffix) {
            (None, Some(mult)) if self.value < 1_000.0 || self.value * mult <= upper.scaled() => self.value * mult,
            _ => self.scaled(),
        }
    }
}

pub fn parse_number(digits: &str) -> Option<f64> {
    let cleaned: String = digits.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn suffix_multiplier(s: &str) -> f64 {
    match s.to_ascii_lowercase().as_str() {
        "k" => 1_000.0,
        "m" | "million" => 1_000_000.0,
        _ => 1.0,
    }
}

pub fn small_number(word: &str) -> Option<f64> {
    let n = match word.to_ascii_lowercase().as_str() {
        "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        "four" => 4.0,
        "five" => 5.0,
        "six" => 6.0,
        "seven" => 7.0,
        "eight" => 8.0,
        "nine" => 9.0,
        "ten" => 10.0,
        other => return parse_number(other),
    };
    Some(n)
}

pub fn property_type_word(word: &str) -> Option<PropertyType> {
    let word = word.to_lowercase();
    let word = word.split_whitespace().collect::<Vec<_>>().join("-");
    let word = match word.strip_suffix("es") {
        Some(stem) if stem.ends_with('x') => stem.to_string(),
        _ => word,
    };
    PropertyType::parse_loose(&word)
}
