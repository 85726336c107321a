//! Translation of [`FilterSet`]s and sub-queries into OpenSearch query DSL.
//!
//! Field names follow the listings index mapping: scalar attributes live
//! under `details.*`, places under `location.*`.

use propsearch_core::{Attribute, Constraint, FilterSet, FilterValue};
use serde_json::{json, Value};

/// Fields searched by the lexical sub-query, with boosts.
pub const TEXT_FIELDS: [&str; 5] = ["title^2", "description", "location.address", "location.city", "location.neighborhood"];

pub const VECTOR_FIELD: &str = "embedding";

/// Keyword fields a location constraint may match.
static LOCATION_FIELDS: [&str; 4] = ["location.city", "location.state", "location.neighborhood", "location.zip_code"];

pub fn field_for(attr: Attribute) -> &'static str {
    match attr {
        Attribute::Price => "price",
        Attribute::Bedrooms => "details.bedrooms",
        Attribute::Bathrooms => "details.bathrooms",
        Attribute::SquareFeet => "details.square_feet",
        Attribute::PropertyType => "details.property_type",
        Attribute::Amenities => "details.amenities",
        Attribute::Location => "location.city",
        Attribute::Status => "status",
    }
}

/// Whole numbers go out as integers so integer-mapped fields match exactly.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn value(v: &FilterValue) -> Value {
    match v {
        FilterValue::Number(n) => number(*n),
        FilterValue::Text(t) => json!(t.trim().to_lowercase()),
    }
}

fn location_clause(places: &[&FilterValue]) -> Value {
    let should: Vec<Value> = places
        .iter()
        .filter_map(|p| p.as_text())
        .flat_map(|place| {
            LOCATION_FIELDS.iter().map(move |field| {
                json!({ "term": { *field: { "value": place.trim(), "case_insensitive": true } } })
            })
        })
        .collect();
    json!({ "bool": { "should": should, "minimum_should_match": 1 } })
}

/// Filter clauses for a `bool.filter` array. Always restricts to `active`
/// listings unless the set carries its own status constraint.
pub fn filter_clauses(filters: &FilterSet) -> Vec<Value> {
    let mut clauses = Vec::with_capacity(filters.len() + 1);
    for (attr, constraint) in filters.iter() {
        let field = field_for(*attr);
        match (attr, constraint) {
            (Attribute::Location, Constraint::Equals(v)) => clauses.push(location_clause(&[v])),
            (Attribute::Location, Constraint::OneOf(vs)) => clauses.push(location_clause(&vs.iter().collect::<Vec<_>>())),
            (Attribute::Amenities, Constraint::OneOf(vs)) => {
                clauses.extend(vs.iter().filter_map(FilterValue::as_text).map(|amenity| {
                    json!({ "term": { field: { "value": amenity.trim(), "case_insensitive": true } } })
                }));
            }
            (_, Constraint::Range { min, max }) => {
                let mut range = serde_json::Map::new();
                if let Some(lo) = min {
                    range.insert("gte".into(), number(*lo));
                }
                if let Some(hi) = max {
                    range.insert("lte".into(), number(*hi));
                }
                clauses.push(json!({ "range": { field: range } }));
            }
            (_, Constraint::Equals(v)) => clauses.push(json!({ "term": { field: value(v) } })),
            (_, Constraint::OneOf(vs)) => {
                let values: Vec<Value> = vs.iter().map(value).collect();
                clauses.push(json!({ "terms": { field: values } }));
            }
        }
    }
    if !filters.contains(Attribute::Status) {
        clauses.push(json!({ "term": { "status": "active" } }));
    }
    clauses
}

/// `bool { must: multi_match | match_all, filter }`. An empty phrase matches everything.
pub fn lexical_query(phrase: &str, filters: &FilterSet, size: usize) -> Value {
    let must = if phrase.trim().is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "multi_match": { "query": phrase, "fields": TEXT_FIELDS } })
    };
    json!({
        "size": size,
        "_source": false,
        "query": { "bool": { "must": [must], "filter": filter_clauses(filters) } }
    })
}

/// k-NN query on [`VECTOR_FIELD`] with the filter applied during the search.
pub fn knn_query(vector: &[f32], filters: &FilterSet, k: usize) -> Value {
    json!({
        "size": k,
        "_source": false,
        "query": {
            "knn": {
                VECTOR_FIELD: {
                    "vector": vector,
                    "k": k,
                    "filter": { "bool": { "filter": filter_clauses(filters) } }
                }
            }
        }
    })
}

/// Escape wildcard metacharacters so user text matches literally.
fn wildcard_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if matches!(c, '*' | '?' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Aggregation-only query collecting city and neighborhood names that contain `partial`.
pub fn suggest_query(partial: &str, limit: usize) -> Value {
    let pattern = format!("*{}*", wildcard_literal(partial.trim()));
    json!({
        "size": 0,
        "query": {
            "bool": {
                "should": [
                    { "wildcard": { "location.city": { "value": pattern, "case_insensitive": true, "boost": 2.0 } } },
                    { "wildcard": { "location.neighborhood": { "value": pattern, "case_insensitive": true } } },
                    { "term": { "location.state": { "value": partial.trim(), "case_insensitive": true } } }
                ],
                "minimum_should_match": 1
            }
        },
        "aggs": {
            "unique_cities": { "terms": { "field": "location.city", "size": limit } },
            "unique_neighborhoods": { "terms": { "field": "location.neighborhood", "size": limit } }
        }
    })
}

pub fn mget_body(ids: &[String]) -> Value {
    json!({ "ids": ids })
}
