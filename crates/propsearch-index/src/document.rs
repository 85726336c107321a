//! Stored document shape of the listings index and its conversion to [`Listing`].

use chrono::{DateTime, NaiveDate, Utc};
use propsearch_core::types::{GeoPoint, Listing, ListingStatus, Location, PropertyType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub location: DocumentLocation,
    pub details: DocumentDetails,
    #[serde(default = "default_status")]
    pub status: String,
    /// `yyyy-mm-dd` or RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentLocation {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetails {
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    pub property_type: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

fn default_status() -> String {
    "active".to_string()
}

fn parse_status(s: &str) -> Option<ListingStatus> {
    match s.trim().to_lowercase().as_str() {
        "active" => Some(ListingStatus::Active),
        "pending" | "under_contract" => Some(ListingStatus::Pending),
        "sold" | "closed" => Some(ListingStatus::Sold),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl ListingDocument {
    /// Convert a stored document into a [`Listing`]; `id` is the store's `_id`.
    pub fn into_listing(self, id: &str) -> Result<Listing, String> {
        let property_type = PropertyType::parse_loose(&self.details.property_type)
            .ok_or_else(|| format!("unknown property type '{}'", self.details.property_type))?;
        let status = parse_status(&self.status).ok_or_else(|| format!("unknown status '{}'", self.status))?;
        let geo = match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        };
        Ok(Listing {
            id: id.to_string(),
            title: self.title,
            description: self.description,
            price: self.price,
            bedrooms: self.details.bedrooms,
            bathrooms: self.details.bathrooms,
            square_feet: self.details.square_feet,
            property_type,
            location: Location {
                address: self.location.address,
                city: self.location.city,
                state: self.location.state,
                zip_code: self.location.zip_code,
                neighborhood: self.location.neighborhood,
                geo,
            },
            amenities: self.details.amenities,
            status,
            listed_at: self.listing_date.as_deref().and_then(parse_date),
            embedding: self.embedding,
        })
    }
}

impl From<&Listing> for ListingDocument {
    fn from(l: &Listing) -> Self {
        Self {
            id: Some(l.id.clone()),
            title: l.title.clone(),
            description: l.description.clone(),
            price: l.price,
            location: DocumentLocation {
                address: l.location.address.clone(),
                city: l.location.city.clone(),
                state: l.location.state.clone(),
                zip_code: l.location.zip_code.clone(),
                latitude: l.location.geo.map(|g| g.lat),
                longitude: l.location.geo.map(|g| g.lon),
                neighborhood: l.location.neighborhood.clone(),
            },
            details: DocumentDetails {
                bedrooms: l.bedrooms,
                bathrooms: l.bathrooms,
                square_feet: l.square_feet,
                property_type: l.property_type.as_str().to_string(),
                amenities: l.amenities.clone(),
            },
            status: l.status.as_str().to_string(),
            listing_date: l.listed_at.map(|d| d.to_rfc3339()),
            embedding: l.embedding.clone(),
        }
    }
}
