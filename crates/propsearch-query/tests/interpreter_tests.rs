use propsearch_core::{Attribute, Constraint, Error, FilterValue, SearchFilters};
use propsearch_query::{extract, interpret};

fn price(q: &propsearch_core::types::Query) -> Option<&Constraint> {
    q.filters.get(Attribute::Price)
}

#[test]
fn bedroom_house_under_price_near_downtown() {
    let q = interpret("3 bedroom house under $600k near downtown", None).expect("interpret");
    assert_eq!(q.filters.get(Attribute::Bedrooms), Some(&Constraint::Equals(FilterValue::Number(3.0))));
    assert_eq!(price(&q), Some(&Constraint::at_most(600_000.0)));
    assert_eq!(q.filters.get(Attribute::PropertyType), Some(&Constraint::Equals("house".into())));
    assert_eq!(q.filters.len(), 3, "near downtown must not become a location filter");
    assert_eq!(q.phrase, "near downtown");
}

#[test]
fn price_range_forms() {
    for text in [
        "$500k-$700k condo",
        "condo $500,000 to $700,000",
        "condo 500k-700k",
        "condo between $500k and $700k",
        "condo $500,000-700k",
    ] {
        let q = interpret(text, None).expect(text);
        assert_eq!(price(&q), Some(&Constraint::between(500_000.0, 700_000.0)), "{text}");
        assert!(q.phrase.is_empty(), "{text} left '{}'", q.phrase);
    }
}

#[test]
fn range_suffix_carries_to_lower_bound() {
    let q = interpret("$500-700k lakefront", None).expect("interpret");
    assert_eq!(price(&q), Some(&Constraint::between(500_000.0, 700_000.0)));
    assert_eq!(q.phrase, "lakefront");
}

#[test]
fn ceiling_and_floor_merge() {
    let q = interpret("over $300k under $1.2m with a yard", None).expect("interpret");
    assert_eq!(price(&q), Some(&Constraint::between(300_000.0, 1_200_000.0)));
    assert_eq!(q.phrase, "yard");
}

#[test]
fn bedroom_ranges() {
    for text in ["2-3 bedroom condo", "2 to 3 bedrooms condo", "two-three bed condo"] {
        let q = interpret(text, None).expect(text);
        assert_eq!(q.filters.get(Attribute::Bedrooms), Some(&Constraint::between(2.0, 3.0)), "{text}");
        assert!(q.phrase.is_empty(), "{text} left '{}'", q.phrase);
    }
}

#[test]
fn bedroom_minimums() {
    for text in ["3+ bedrooms", "at least 3 bedrooms", "3 or more beds"] {
        let q = interpret(text, None).expect(text);
        assert_eq!(q.filters.get(Attribute::Bedrooms), Some(&Constraint::at_least(3.0)), "{text}");
    }
    let q = interpret("three bedroom cottage", None).expect("words");
    assert_eq!(q.filters.get(Attribute::Bedrooms), Some(&Constraint::Equals(3.0.into())));
    let q = interpret("4br ranch", None).expect("br");
    assert_eq!(q.filters.get(Attribute::Bedrooms), Some(&Constraint::Equals(4.0.into())));
    assert_eq!(q.phrase, "ranch");
}

#[test]
fn bathrooms_are_minimums() {
    let q = interpret("2.5 baths modern kitchen", None).expect("interpret");
    assert_eq!(q.filters.get(Attribute::Bathrooms), Some(&Constraint::at_least(2.5)));
    assert_eq!(q.phrase, "modern kitchen");
}

#[test]
fn square_footage_is_a_minimum() {
    for text in ["1500 sqft", "1,500 sq ft", "1500 square feet", "over 1500 sqft"] {
        let (hints, residual) = extract(text);
        assert_eq!(hints.min_square_feet, Some(1_500.0), "{text}");
        assert!(hints.min_price.is_none(), "{text} must not read as a price");
        assert!(residual.is_empty(), "{text} left '{residual}'");
    }
}

#[test]
fn several_property_types_become_one_of() {
    let q = interpret("condo or townhome with gym", None).expect("interpret");
    assert_eq!(
        q.filters.get(Attribute::PropertyType),
        Some(&Constraint::OneOf(vec!["condo".into(), "townhouse".into()]))
    );
    assert_eq!(q.phrase, "gym");
}

#[test]
fn capitalized_place_becomes_location() {
    let q = interpret("craftsman bungalow in San Diego, CA", None).expect("interpret");
    assert_eq!(q.filters.get(Attribute::Location), Some(&Constraint::Equals("San Diego".into())));
    assert_eq!(q.phrase, "craftsman bungalow");
}

#[test]
fn sentence_punctuation_is_not_part_of_place() {
    let q = interpret("lakefront house in Austin.", None).expect("interpret");
    assert_eq!(q.filters.get(Attribute::Location), Some(&Constraint::Equals("Austin".into())));
    assert_eq!(q.phrase, "lakefront");

    let q = interpret("townhome in Winston-Salem, NC!", None).expect("interpret");
    assert_eq!(q.filters.get(Attribute::Location), Some(&Constraint::Equals("Winston-Salem".into())));
}

#[test]
fn lowercase_place_stays_in_phrase() {
    let q = interpret("quiet street in the arts district", None).expect("interpret");
    assert!(!q.filters.contains(Attribute::Location));
    assert_eq!(q.phrase, "quiet street in the arts district");
}

#[test]
fn years_and_counts_are_not_prices() {
    let q = interpret("built 1990-2005 garage for 2 cars", None).expect("interpret");
    assert!(price(&q).is_none());
    assert!(q.phrase.contains("1990-2005"));
}

#[test]
fn explicit_filters_win_over_hints() {
    let explicit = SearchFilters { max_price: Some(450_000.0), ..SearchFilters::default() };
    let q = interpret("house under $600k", Some(&explicit)).expect("interpret");
    assert_eq!(price(&q), Some(&Constraint::at_most(450_000.0)));
    assert!(q.filters.contains(Attribute::PropertyType));
}

#[test]
fn hints_fill_unset_attributes() {
    let explicit = SearchFilters { location: Some("Austin".into()), ..SearchFilters::default() };
    let q = interpret("2 bed apartment", Some(&explicit)).expect("interpret");
    assert!(q.filters.contains(Attribute::Location));
    assert!(q.filters.contains(Attribute::Bedrooms));
    assert!(q.filters.contains(Attribute::PropertyType));
}

#[test]
fn contradictory_range_is_invalid() {
    let err = interpret("$700k-$500k house", None).unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[test]
fn empty_query_without_filters_is_invalid() {
    assert!(matches!(interpret("   ", None), Err(Error::InvalidQuery(_))));
    assert!(matches!(interpret("with the", None), Err(Error::InvalidQuery(_))));
}

#[test]
fn filter_only_query_is_valid_with_empty_phrase() {
    let q = interpret("condo under $400k", None).expect("interpret");
    assert!(q.phrase.is_empty());
    assert!(!q.has_phrase());
    assert_eq!(q.filters.len(), 2);
}

#[test]
fn interpret_is_pure() {
    let a = interpret("3 bed house in Austin", None).expect("a");
    let b = interpret("3 bed house in Austin", None).expect("b");
    assert_eq!(a, b);
}
