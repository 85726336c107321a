//! Hard filters: attribute → constraint mapping pushed down to the store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Listing, PropertyType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Price,
    Bedrooms,
    Bathrooms,
    SquareFeet,
    PropertyType,
    Location,
    Amenities,
    Status,
}

impl Attribute {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Attribute::Price | Attribute::Bedrooms | Attribute::Bathrooms | Attribute::SquareFeet)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Price => "price",
            Attribute::Bedrooms => "bedrooms",
            Attribute::Bathrooms => "bathrooms",
            Attribute::SquareFeet => "square_feet",
            Attribute::PropertyType => "property_type",
            Attribute::Location => "location",
            Attribute::Amenities => "amenities",
            Attribute::Status => "status",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl FilterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self { FilterValue::Number(n) => Some(*n), FilterValue::Text(_) => None }
    }
    pub fn as_text(&self) -> Option<&str> {
        match self { FilterValue::Text(t) => Some(t), FilterValue::Number(_) => None }
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self { FilterValue::Number(n) }
}
impl From<u32> for FilterValue {
    fn from(n: u32) -> Self { FilterValue::Number(f64::from(n)) }
}
impl From<&str> for FilterValue {
    fn from(s: &str) -> Self { FilterValue::Text(s.to_string()) }
}
impl From<String> for FilterValue {
    fn from(s: String) -> Self { FilterValue::Text(s) }
}

/// A single constraint. Ranges are inclusive; either bound may be open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Range { min: Option<f64>, max: Option<f64> },
    Equals(FilterValue),
    /// Set membership. For amenities every value must be present on the listing.
    OneOf(Vec<FilterValue>),
}

impl Constraint {
    pub fn at_least(min: f64) -> Self { Constraint::Range { min: Some(min), max: None } }
    pub fn at_most(max: f64) -> Self { Constraint::Range { min: None, max: Some(max) } }
    pub fn between(min: f64, max: f64) -> Self { Constraint::Range { min: Some(min), max: Some(max) } }
}

/// Parsed hard filters. Ordered so that translation to the store DSL is stable.
///
/// Listings that are not `active` never match unless a status constraint is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    constraints: BTreeMap<Attribute, Constraint>,
}

impl FilterSet {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, attribute: Attribute, constraint: Constraint) -> Self {
        self.constraints.insert(attribute, constraint);
        self
    }

    pub fn insert(&mut self, attribute: Attribute, constraint: Constraint) -> Option<Constraint> {
        self.constraints.insert(attribute, constraint)
    }

    /// Insert only when the attribute has no constraint yet. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, attribute: Attribute, constraint: Constraint) -> bool {
        if self.constraints.contains_key(&attribute) { return false; }
        self.constraints.insert(attribute, constraint);
        true
    }

    pub fn get(&self, attribute: Attribute) -> Option<&Constraint> { self.constraints.get(&attribute) }
    pub fn contains(&self, attribute: Attribute) -> bool { self.constraints.contains_key(&attribute) }
    pub fn iter(&self) -> impl Iterator<Item = (&Attribute, &Constraint)> { self.constraints.iter() }
    pub fn len(&self) -> usize { self.constraints.len() }
    pub fn is_empty(&self) -> bool { self.constraints.is_empty() }

    /// Reject constraints that can never match or are malformed.
    pub fn validate(&self) -> Result<()> {
        for (attr, constraint) in &self.constraints {
            match constraint {
                Constraint::Range { min, max } => {
                    if !attr.is_numeric() {
                        return Err(Error::InvalidQuery(format!("{attr} does not support ranges")));
                    }
                    if min.is_none() && max.is_none() {
                        return Err(Error::InvalidQuery(format!("{attr} range has no bounds")));
                    }
                    for bound in [min, max].into_iter().flatten() {
                        if !bound.is_finite() || *bound < 0.0 {
                            return Err(Error::InvalidQuery(format!("{attr} bound {bound} is not a non-negative number")));
                        }
                    }
                    if let (Some(lo), Some(hi)) = (min, max) {
                        if lo > hi {
                            return Err(Error::InvalidQuery(format!("contradictory {attr} filter: min {lo} > max {hi}")));
                        }
                    }
                }
                Constraint::Equals(value) => validate_value(*attr, value)?,
                Constraint::OneOf(values) => {
                    if values.is_empty() {
                        return Err(Error::InvalidQuery(format!("{attr} set is empty")));
                    }
                    for v in values { validate_value(*attr, v)?; }
                }
            }
        }
        Ok(())
    }

    /// Evaluate the filter set against a listing.
    pub fn matches(&self, listing: &Listing) -> bool {
        if !self.contains(Attribute::Status) && listing.status != crate::types::ListingStatus::Active {
            return false;
        }
        self.constraints.iter().all(|(attr, c)| constraint_matches(*attr, c, listing))
    }
}

fn validate_value(attr: Attribute, value: &FilterValue) -> Result<()> {
    match (attr.is_numeric(), value) {
        (true, FilterValue::Number(n)) if n.is_finite() && *n >= 0.0 => Ok(()),
        (true, _) => Err(Error::InvalidQuery(format!("{attr} expects a non-negative number"))),
        (false, FilterValue::Number(_)) => Err(Error::InvalidQuery(format!("{attr} expects text"))),
        (false, FilterValue::Text(t)) if t.trim().is_empty() => Err(Error::InvalidQuery(format!("{attr} value is empty"))),
        (false, FilterValue::Text(t)) if attr == Attribute::PropertyType => t.parse::<PropertyType>().map(|_| ()),
        (false, FilterValue::Text(_)) => Ok(()),
    }
}

fn numeric_value(attr: Attribute, listing: &Listing) -> Option<f64> {
    match attr {
        Attribute::Price => Some(listing.price),
        Attribute::Bedrooms => Some(f64::from(listing.bedrooms)),
        Attribute::Bathrooms => Some(f64::from(listing.bathrooms)),
        Attribute::SquareFeet => listing.square_feet.map(f64::from),
        _ => None,
    }
}

fn value_matches(attr: Attribute, value: &FilterValue, listing: &Listing) -> bool {
    if attr.is_numeric() {
        return match (numeric_value(attr, listing), value.as_number()) {
            (Some(v), Some(n)) => (v - n).abs() < 1e-9,
            _ => false,
        };
    }
    let Some(text) = value.as_text() else { return false };
    match attr {
        Attribute::PropertyType => PropertyType::parse_loose(text) == Some(listing.property_type),
        Attribute::Location => listing.location.matches_region(text),
        Attribute::Amenities => listing.amenities.iter().any(|a| a.eq_ignore_ascii_case(text.trim())),
        Attribute::Status => listing.status.as_str().eq_ignore_ascii_case(text.trim()),
        _ => false,
    }
}

fn constraint_matches(attr: Attribute, constraint: &Constraint, listing: &Listing) -> bool {
    match constraint {
        Constraint::Range { min, max } => {
            let Some(v) = numeric_value(attr, listing) else { return false };
            min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
        }
        Constraint::Equals(value) => value_matches(attr, value, listing),
        Constraint::OneOf(values) if attr == Attribute::Amenities => values.iter().all(|v| value_matches(attr, v, listing)),
        Constraint::OneOf(values) => values.iter().any(|v| value_matches(attr, v, listing)),
    }
}

/// Explicit, caller-supplied filters of the inbound request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<u32>,
    pub min_bedrooms: Option<u32>,
    pub max_bedrooms: Option<u32>,
    pub min_bathrooms: Option<f32>,
    /// One type, or several separated by commas.
    pub property_type: Option<String>,
    pub min_sqft: Option<u32>,
    pub max_sqft: Option<u32>,
    pub amenities: Vec<String>,
    pub status: Option<String>,
}

fn range(min: Option<f64>, max: Option<f64>) -> Option<Constraint> {
    (min.is_some() || max.is_some()).then_some(Constraint::Range { min, max })
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool { *self == SearchFilters::default() }

    /// Convert into a [`FilterSet`]. Does not validate ranges; see [`FilterSet::validate`].
    pub fn to_filter_set(&self) -> Result<FilterSet> {
        let mut set = FilterSet::new();
        if let Some(loc) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            set.insert(Attribute::Location, Constraint::Equals(loc.into()));
        }
        if let Some(c) = range(self.min_price, self.max_price) { set.insert(Attribute::Price, c); }
        match self.bedrooms {
            Some(exact) => {
                let lo = self.min_bedrooms.unwrap_or(0);
                let hi = self.max_bedrooms.unwrap_or(u32::MAX);
                if exact < lo || exact > hi {
                    return Err(Error::InvalidQuery(format!("contradictory bedrooms filter: {exact} outside {lo}..={hi}")));
                }
                set.insert(Attribute::Bedrooms, Constraint::Equals(exact.into()));
            }
            None => {
                if let Some(c) = range(self.min_bedrooms.map(f64::from), self.max_bedrooms.map(f64::from)) {
                    set.insert(Attribute::Bedrooms, c);
                }
            }
        }
        if let Some(b) = self.min_bathrooms { set.insert(Attribute::Bathrooms, Constraint::at_least(f64::from(b))); }
        if let Some(c) = range(self.min_sqft.map(f64::from), self.max_sqft.map(f64::from)) { set.insert(Attribute::SquareFeet, c); }
        if let Some(types) = self.property_type.as_deref() {
            let mut parsed: Vec<PropertyType> = types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::parse::<PropertyType>)
                .collect::<Result<_>>()?;
            parsed.sort();
            parsed.dedup();
            match parsed.as_slice() {
                [] => {}
                [one] => { set.insert(Attribute::PropertyType, Constraint::Equals(one.as_str().into())); }
                many => {
                    set.insert(Attribute::PropertyType, Constraint::OneOf(many.iter().map(|t| t.as_str().into()).collect()));
                }
            }
        }
        let amenities: Vec<FilterValue> = self.amenities.iter().map(|a| a.trim()).filter(|a| !a.is_empty()).map(FilterValue::from).collect();
        if !amenities.is_empty() { set.insert(Attribute::Amenities, Constraint::OneOf(amenities)); }
        if let Some(status) = self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            set.insert(Attribute::Status, Constraint::Equals(status.to_lowercase().into()));
        }
        Ok(set)
    }
}
