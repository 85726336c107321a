use std::ops::Range;

use propsearch_core::types::{PropertyType, Query};
use propsearch_core::{Attribute, Constraint, Error, FilterSet, Result, SearchFilters};
use regex::{Captures, Regex};
use tracing::debug;

use crate::rules::{self, Amount};

/// Connector words trimmed from both ends of the residual phrase.
const CONNECTORS: &[&str] = &["a", "an", "the", "with", "and", "or", "for", "of", "at", "in"];

/// Structured hints pulled out of free text, before merging with explicit filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hints {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<Constraint>,
    pub min_bathrooms: Option<f64>,
    pub min_square_feet: Option<f64>,
    pub property_types: Vec<PropertyType>,
    pub location: Option<String>,
}

impl Hints {
    pub fn into_filter_set(self) -> FilterSet {
        let mut set = FilterSet::new();
        if self.min_price.is_some() || self.max_price.is_some() {
            set.insert(Attribute::Price, Constraint::Range { min: self.min_price, max: self.max_price });
        }
        if let Some(c) = self.bedrooms {
            set.insert(Attribute::Bedrooms, c);
        }
        if let Some(b) = self.min_bathrooms {
            set.insert(Attribute::Bathrooms, Constraint::at_least(b));
        }
        if let Some(s) = self.min_square_feet {
            set.insert(Attribute::SquareFeet, Constraint::at_least(s));
        }
        match self.property_types.as_slice() {
            [] => {}
            [one] => {
                set.insert(Attribute::PropertyType, Constraint::Equals(one.as_str().into()));
            }
            many => {
                let values = many.iter().map(|t| t.as_str().into()).collect();
                set.insert(Attribute::PropertyType, Constraint::OneOf(values));
            }
        }
        if let Some(loc) = self.location {
            set.insert(Attribute::Location, Constraint::Equals(loc.into()));
        }
        set
    }
}

/// Extract filter hints from free text. Returns the hints and the residual phrase.
pub fn extract(text: &str) -> (Hints, String) {
    let mut hints = Hints::default();
    let mut residual = text.to_string();

    take(&mut residual, &rules::SQUARE_FEET, |caps| {
        let Some(v) = caps.get(1).and_then(|m| rules::parse_number(m.as_str())) else { return false };
        hints.min_square_feet.get_or_insert(v);
        true
    });

    take(&mut residual, &rules::BEDROOMS, |caps| {
        let Some(n) = caps.get(3).and_then(|m| rules::small_number(m.as_str())) else { return false };
        let lower = match caps.get(2) {
            Some(m) => match rules::small_number(m.as_str()) {
                Some(lo) => Some(lo),
                None => return false,
            },
            None => None,
        };
        if hints.bedrooms.is_none() {
            let minimum = caps.get(1).is_some() || caps.get(4).is_some();
            hints.bedrooms = Some(match lower {
                Some(lo) if minimum => Constraint::at_least(lo.min(n)),
                Some(lo) => Constraint::between(lo.min(n), lo.max(n)),
                None if minimum => Constraint::at_least(n),
                None => Constraint::Equals(n.into()),
            });
        }
        true
    });

    take(&mut residual, &rules::BATHROOMS, |caps| {
        let Some(n) = caps.get(1).and_then(|m| rules::small_number(m.as_str())) else { return false };
        hints.min_bathrooms.get_or_insert(n);
        true
    });

    take(&mut residual, &rules::PRICE_RANGE, |caps| {
        let (Some(lo), Some(hi)) = (Amount::from_captures(caps, 1), Amount::from_captures(caps, 4)) else {
            return false;
        };
        if !(lo.looks_like_price() || hi.looks_like_price()) {
            return false;
        }
        hints.min_price.get_or_insert(lo.scaled_like(&hi));
        hints.max_price.get_or_insert(hi.scaled());
        true
    });

    take(&mut residual, &rules::PRICE_CEILING, |caps| match Amount::from_captures(caps, 1) {
        Some(a) if a.looks_like_price() => {
            hints.max_price.get_or_insert(a.scaled());
            true
        }
        _ => false,
    });

    take(&mut residual, &rules::PRICE_FLOOR, |caps| match Amount::from_captures(caps, 1) {
        Some(a) if a.looks_like_price() => {
            hints.min_price.get_or_insert(a.scaled());
            true
        }
        _ => false,
    });

    take(&mut residual, &rules::LOCATION, |caps| {
        let Some(place) = caps.get(1).map(|m| strip_state_code(m.as_str())) else { return false };
        if hints.location.is_none() {
            hints.location = Some(place);
        }
        true
    });

    take(&mut residual, &rules::PROPERTY_TYPE, |caps| {
        let Some(kind) = caps.get(1).and_then(|m| rules::property_type_word(m.as_str())) else { return false };
        if !hints.property_types.contains(&kind) {
            hints.property_types.push(kind);
        }
        true
    });
    hints.property_types.sort();

    (hints, clean_residual(&residual))
}

/// Interpret a raw query. Explicit filters win; extracted hints only fill
/// attributes the caller left unset.
pub fn interpret(raw: &str, explicit: Option<&SearchFilters>) -> Result<Query> {
    let mut filters = match explicit {
        Some(f) => f.to_filter_set()?,
        None => FilterSet::new(),
    };
    let explicit_count = filters.len();

    let (hints, phrase) = extract(raw);
    for (attr, constraint) in hints.into_filter_set().iter() {
        filters.insert_if_absent(*attr, constraint.clone());
    }
    filters.validate()?;

    if phrase.is_empty() && filters.is_empty() {
        return Err(Error::InvalidQuery("query has neither search text nor filters".into()));
    }

    debug!(
        raw = %raw,
        phrase = %phrase,
        explicit_filters = explicit_count,
        total_filters = filters.len(),
        "interpreted query"
    );

    Ok(Query {
        raw: raw.to_string(),
        filters,
        phrase,
        page: Default::default(),
        sort: Default::default(),
    })
}

/// Run `re` over `text`, blanking every match for which `accept` returns true.
fn take<F>(text: &mut String, re: &Regex, mut accept: F)
where
    F: FnMut(&Captures<'_>) -> bool,
{
    let spans: Vec<Range<usize>> = re
        .captures_iter(text)
        .filter(|caps| accept(caps))
        .filter_map(|caps| caps.get(0).map(|m| m.range()))
        .collect();
    if spans.is_empty() {
        return;
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push(' ');
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    *text = out;
}

fn strip_state_code(place: &str) -> String {
    let words: Vec<&str> = place
        .split_whitespace()
        .map(|w| w.trim_end_matches(['.', '-', '\'']))
        .filter(|w| !w.is_empty())
        .collect();
    match words.split_last() {
        Some((last, rest))
            if !rest.is_empty() && last.len() == 2 && last.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest.join(" ")
        }
        _ => words.join(" "),
    }
}

fn is_connector(token: &str) -> bool {
    let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
    CONNECTORS.iter().any(|c| c.eq_ignore_ascii_case(bare))
}

fn clean_residual(text: &str) -> String {
    let mut tokens: Vec<&str> = text
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .collect();
    while tokens.first().is_some_and(|t| is_connector(t)) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(|t| is_connector(t)) {
        tokens.pop();
    }
    let joined = tokens.join(" ");
    joined
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '.'))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_trims_connectors_at_both_ends() {
        assert_eq!(clean_residual("  with a  pool and  "), "pool");
        assert_eq!(clean_residual("the quiet street of"), "quiet street");
        assert_eq!(clean_residual(" , "), "");
    }

    #[test]
    fn state_code_is_dropped() {
        assert_eq!(strip_state_code("Austin TX"), "Austin");
        assert_eq!(strip_state_code("TX"), "TX");
        assert_eq!(strip_state_code("San Francisco"), "San Francisco");
    }

    #[test]
    fn take_blanks_only_accepted_matches() {
        let mut s = "a1 b2 c3".to_string();
        let re = Regex::new(r"[a-z](\d)").unwrap();
        take(&mut s, &re, |c| &c[1] != "2");
        assert_eq!(s.split_whitespace().collect::<Vec<_>>(), vec!["b2"]);
    }
}
