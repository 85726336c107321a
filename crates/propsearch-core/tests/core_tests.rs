use std::fs;
use tempfile::TempDir;

use propsearch_core::config::Config;
use propsearch_core::types::{Listing, ListingStatus, Location, PropertyType, SearchRequest, SortDirection, SortField};
use propsearch_core::{Attribute, Constraint, Error, FilterSet, SearchFilters};

fn listing(id: &str, price: f64, bedrooms: u32, kind: PropertyType) -> Listing {
    Listing {
        id: id.into(),
        title: format!("Listing {id}"),
        description: String::new(),
        price,
        bedrooms,
        bathrooms: 2.0,
        square_feet: Some(1_400),
        property_type: kind,
        location: Location { city: "Austin".into(), state: "TX".into(), neighborhood: Some("Downtown".into()), ..Location::default() },
        amenities: vec!["pool".into(), "garage".into()],
        status: ListingStatus::Active,
        listed_at: None,
        embedding: None,
    }
}

#[test]
fn filter_set_matches_ranges_and_types() {
    let l = listing("a", 550_000.0, 3, PropertyType::House);
    let set = FilterSet::new()
        .with(Attribute::Price, Constraint::at_most(600_000.0))
        .with(Attribute::Bedrooms, Constraint::Equals(3u32.into()))
        .with(Attribute::PropertyType, Constraint::Equals("house".into()));
    assert!(set.matches(&l));

    let too_cheap = FilterSet::new().with(Attribute::Price, Constraint::at_most(500_000.0));
    assert!(!too_cheap.matches(&l));
}

#[test]
fn inactive_listings_hidden_unless_status_filtered() {
    let mut l = listing("s", 400_000.0, 2, PropertyType::Condo);
    l.status = ListingStatus::Sold;
    assert!(!FilterSet::new().matches(&l));
    let sold = FilterSet::new().with(Attribute::Status, Constraint::Equals("sold".into()));
    assert!(sold.matches(&l));
}

#[test]
fn amenities_require_every_value() {
    let l = listing("p", 300_000.0, 2, PropertyType::Condo);
    let both = FilterSet::new().with(Attribute::Amenities, Constraint::OneOf(vec!["Pool".into(), "garage".into()]));
    assert!(both.matches(&l));
    let missing = FilterSet::new().with(Attribute::Amenities, Constraint::OneOf(vec!["pool".into(), "gym".into()]));
    assert!(!missing.matches(&l));
}

#[test]
fn location_matches_city_or_neighborhood() {
    let l = listing("l", 300_000.0, 2, PropertyType::Condo);
    for place in ["austin", "Downtown", "TX"] {
        let set = FilterSet::new().with(Attribute::Location, Constraint::Equals(place.into()));
        assert!(set.matches(&l), "{place} should match");
    }
    let elsewhere = FilterSet::new().with(Attribute::Location, Constraint::Equals("Denver".into()));
    assert!(!elsewhere.matches(&l));
}

#[test]
fn validate_rejects_contradictions() {
    let bad = FilterSet::new().with(Attribute::Price, Constraint::between(700_000.0, 500_000.0));
    assert!(matches!(bad.validate(), Err(Error::InvalidQuery(_))));

    let negative = FilterSet::new().with(Attribute::SquareFeet, Constraint::at_least(-1.0));
    assert!(negative.validate().is_err());

    let empty = FilterSet::new().with(Attribute::PropertyType, Constraint::OneOf(vec![]));
    assert!(empty.validate().is_err());

    let unknown = FilterSet::new().with(Attribute::PropertyType, Constraint::Equals("castle".into()));
    assert!(unknown.validate().is_err());

    let ok = FilterSet::new().with(Attribute::Price, Constraint::between(500_000.0, 700_000.0));
    ok.validate().expect("valid range");
}

#[test]
fn search_filters_convert_to_filter_set() {
    let f = SearchFilters {
        location: Some("Austin".into()),
        min_price: Some(200_000.0),
        max_price: Some(400_000.0),
        min_bedrooms: Some(2),
        property_type: Some("condo, townhome".into()),
        amenities: vec!["pool".into()],
        ..SearchFilters::default()
    };
    let set = f.to_filter_set().expect("convert");
    assert_eq!(set.get(Attribute::Price), Some(&Constraint::between(200_000.0, 400_000.0)));
    assert_eq!(set.get(Attribute::Bedrooms), Some(&Constraint::at_least(2.0)));
    assert_eq!(
        set.get(Attribute::PropertyType),
        Some(&Constraint::OneOf(vec!["condo".into(), "townhouse".into()]))
    );
    assert!(set.contains(Attribute::Location));
    assert!(set.contains(Attribute::Amenities));
    set.validate().expect("valid");
}

#[test]
fn search_filters_bedrooms_outside_bounds_is_invalid() {
    let f = SearchFilters { bedrooms: Some(5), max_bedrooms: Some(3), ..SearchFilters::default() };
    assert!(matches!(f.to_filter_set(), Err(Error::InvalidQuery(_))));
}

#[test]
fn search_request_accepts_camel_case() {
    let json = r#"{
        "text": "quiet street",
        "filters": { "maxPrice": 600000, "minBathrooms": 1.5, "propertyType": "house" },
        "page": 2,
        "pageSize": 20,
        "sort": "price:desc"
    }"#;
    let req: SearchRequest = serde_json::from_str(json).expect("parse");
    assert_eq!(req.page, Some(2));
    assert_eq!(req.page_size, Some(20));
    let sort = req.sort.expect("sort");
    assert_eq!(sort.field, SortField::Price);
    assert_eq!(sort.direction, SortDirection::Desc);
    let filters = req.filters.expect("filters");
    assert_eq!(filters.max_price, Some(600_000.0));
    assert_eq!(filters.min_bathrooms, Some(1.5));
}

#[test]
fn search_request_rejects_unknown_sort() {
    let json = r#"{ "text": "x", "sort": "colour" }"#;
    assert!(serde_json::from_str::<SearchRequest>(json).is_err());
}

#[test]
fn listing_embedding_never_serialized() {
    let mut l = listing("e", 1.0, 1, PropertyType::Land);
    l.embedding = Some(vec![0.1, 0.2]);
    let json = serde_json::to_string(&l).expect("serialize");
    assert!(!json.contains("embedding"));
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(
        &path,
        r#"
[store]
endpoint = "http://search.internal:9200"
index = "homes"

[search]
lexical_weight = 0.7
semantic_weight = 0.3
"#,
    )
    .unwrap();

    let settings = Config::load_from(&path).settings().expect("settings");
    assert_eq!(settings.store.endpoint, "http://search.internal:9200");
    assert_eq!(settings.store.index, "homes");
    assert!((settings.search.lexical_weight - 0.7).abs() < f32::EPSILON);
    // untouched sections keep their defaults
    assert_eq!(settings.embedding.max_retries, 2);
    assert_eq!(settings.search.over_fetch_factor, 3);
    assert_eq!(settings.cache.listing_ttl_secs, 300);
}

#[test]
fn config_rejects_invalid_weights() {
    let cfg = Config::from_toml_str("[search]\nlexical_weight = -1.0\n");
    assert!(matches!(cfg.settings(), Err(Error::InvalidConfig(_))));
}

#[test]
fn config_get_reads_nested_key() {
    let cfg = Config::from_toml_str("[embedding]\nmodel = \"text-embedding-3-large\"\n");
    let model: String = cfg.get("embedding.model").expect("model");
    assert_eq!(model, "text-embedding-3-large");
}
