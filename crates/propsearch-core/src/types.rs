//! Domain types used by the interpreter, index clients and the hybrid engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::filters::{FilterSet, SearchFilters};

pub type ListingId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Condo,
    Townhouse,
    Land,
    MultiFamily,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Apartment => "apartment",
            PropertyType::Condo => "condo",
            PropertyType::Townhouse => "townhouse",
            PropertyType::Land => "land",
            PropertyType::MultiFamily => "multi_family",
        }
    }

    /// Lenient parse that accepts plurals and common synonyms ("homes", "townhome", "lot").
    pub fn parse_loose(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let s = s.trim_end_matches('s');
        match s {
            "house" | "home" | "single_family" | "single-family" | "single family" => Some(PropertyType::House),
            "apartment" | "apt" | "flat" => Some(PropertyType::Apartment),
            "condo" | "condominium" | "loft" => Some(PropertyType::Condo),
            "townhouse" | "townhome" | "rowhouse" => Some(PropertyType::Townhouse),
            "land" | "lot" => Some(PropertyType::Land),
            "multi_family" | "multi-family" | "multifamily" | "duplex" | "triplex" => Some(PropertyType::MultiFamily),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PropertyType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_loose(s).ok_or_else(|| Error::InvalidQuery(format!("unknown property type '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Active,
    Pending,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Pending => "pending",
            ListingStatus::Sold => "sold",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
}

impl Location {
    /// Region match used by location filters: city, state, neighborhood or zip, case-insensitive.
    pub fn matches_region(&self, region: &str) -> bool {
        let region = region.trim();
        [Some(self.city.as_str()), Some(self.state.as_str()), self.neighborhood.as_deref(), Some(self.zip_code.as_str())]
            .into_iter()
            .flatten()
            .any(|v| !v.is_empty() && v.eq_ignore_ascii_case(region))
    }
}

/// A property listing as stored in the document store.
///
/// Created by the ingestion pipeline; the search engine only reads it.
/// `embedding` is carried for indexing and never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    pub property_type: PropertyType,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

impl Listing {
    /// Text used for lexical indexing and for embedding the listing.
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.description.as_str(), self.location.address.as_str(), self.location.city.as_str()];
        if let Some(n) = self.location.neighborhood.as_deref() { parts.push(n); }
        parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
    }
}

/// Indicates which retrieval path produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lexical,
    Semantic,
}

/// One entry of a sub-query's ranked list.
///
/// `score` is engine-native (BM25, cosine, ...) and only comparable within
/// the same source list. `rank` is 1-based within that list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: ListingId,
    pub source: SourceKind,
    pub score: f32,
    pub rank: usize,
}

impl CandidateResult {
    pub fn new(id: impl Into<ListingId>, source: SourceKind, score: f32, rank: usize) -> Self {
        Self { id: id.into(), source, score, rank }
    }
}

/// A listing after fusion of both source lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: ListingId,
    pub score: f32,
    /// Min-max normalized lexical score, if the listing came from the lexical list.
    pub lexical_score: Option<f32>,
    /// Min-max normalized semantic score, if the listing came from the semantic list.
    pub semantic_score: Option<f32>,
    pub raw_lexical_score: Option<f32>,
    pub sources: Vec<SourceKind>,
    /// 1-based final position.
    pub rank: usize,
}

impl FusedResult {
    pub fn is_dual_source(&self) -> bool { self.lexical_score.is_some() && self.semantic_score.is_some() }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Relevance,
    Price,
    Date,
    Bedrooms,
    SquareFeet,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Requested ordering. Serialized as `field` or `field:direction`, e.g. `price:asc`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn relevance() -> Self { Self::default() }
    pub fn by(field: SortField, direction: SortDirection) -> Self { Self { field, direction } }
    pub fn is_relevance(&self) -> bool { self.field == SortField::Relevance }
}

impl FromStr for SortOrder {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (field, dir) = match s.split_once(':') { Some((f, d)) => (f.to_string(), Some(d.to_string())), None => (s.clone(), None) };
        let field = match field.as_str() {
            "" | "relevance" | "score" => SortField::Relevance,
            "price" => SortField::Price,
            "date" | "listing_date" | "listed_at" => SortField::Date,
            "bedrooms" | "beds" => SortField::Bedrooms,
            "sqft" | "square_feet" => SortField::SquareFeet,
            other => return Err(Error::InvalidQuery(format!("unknown sort field '{other}'"))),
        };
        let direction = match dir.as_deref() {
            None => if field == SortField::Relevance { SortDirection::Desc } else { SortDirection::Asc },
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(Error::InvalidQuery(format!("unknown sort direction '{other}'"))),
        };
        if field == SortField::Relevance && direction == SortDirection::Asc {
            return Err(Error::InvalidQuery("relevance can only be sorted descending".into()));
        }
        Ok(Self { field, direction })
    }
}

impl TryFrom<String> for SortOrder {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<SortOrder> for String {
    fn from(s: SortOrder) -> Self {
        let field = match s.field {
            SortField::Relevance => "relevance",
            SortField::Price => "price",
            SortField::Date => "date",
            SortField::Bedrooms => "bedrooms",
            SortField::SquareFeet => "square_feet",
        };
        let dir = match s.direction { SortDirection::Asc => "asc", SortDirection::Desc => "desc" };
        format!("{field}:{dir}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self { Self { offset: 0, limit: 10 } }
}

impl PageRequest {
    /// Build from a 1-based page number and a page size.
    pub fn from_page(page: usize, page_size: usize) -> crate::Result<Self> {
        if page == 0 { return Err(Error::InvalidQuery("page is 1-based".into())); }
        if page_size == 0 { return Err(Error::InvalidQuery("pageSize must be at least 1".into())); }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| Error::InvalidQuery("page out of range".into()))?;
        Ok(Self { offset, limit: page_size })
    }

    /// Number of top-ranked candidates needed to serve this page.
    pub fn window(&self) -> usize { self.offset.saturating_add(self.limit) }
}

/// Interpreted form of a search request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub raw: String,
    pub filters: FilterSet,
    /// Residual text used for both lexical matching and embedding.
    pub phrase: String,
    pub page: PageRequest,
    pub sort: SortOrder,
}

impl Query {
    pub fn with_page(mut self, page: PageRequest) -> Self { self.page = page; self }
    pub fn with_sort(mut self, sort: SortOrder) -> Self { self.sort = sort; self }
    pub fn has_phrase(&self) -> bool { !self.phrase.trim().is_empty() }
}

/// Inbound request surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

impl SearchRequest {
    pub fn text(text: impl Into<String>) -> Self { Self { text: text.into(), ..Default::default() } }
}

/// Why a response was served from fewer paths than requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    EmbeddingUnavailable,
    SemanticIndexUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingHit {
    pub score: f32,
    pub rank: usize,
    pub sources: Vec<SourceKind>,
    #[serde(flatten)]
    pub listing: Listing,
}

impl ListingHit {
    pub fn id(&self) -> &str { &self.listing.id }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<ListingHit>,
    pub total_estimate: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
    pub took_ms: u64,
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation: Option<Degradation>,
    /// Fused ids dropped because they could not be hydrated.
    pub dropped: usize,
}
