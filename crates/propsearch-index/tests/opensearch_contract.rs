//! OpenSearch client contract tests against a mock HTTP server.

use std::time::Duration;

use propsearch_core::config::StoreSettings;
use propsearch_core::error::Error;
use propsearch_core::traits::{ListingIndex, ListingStore, LocationSuggester};
use propsearch_core::types::SourceKind;
use propsearch_core::{Attribute, Constraint, FilterSet};
use propsearch_index::OpenSearchClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenSearchClient {
    let settings = StoreSettings {
        endpoint: server.uri(),
        index: "listings".into(),
        username: Some("admin".into()),
        password: Some("admin".into()),
        timeout_ms: 500,
    };
    OpenSearchClient::new(&settings).unwrap_or_else(|e| panic!("client: {e}"))
}

fn search_hits(hits: &[(&str, f64)]) -> serde_json::Value {
    let hits: Vec<_> = hits.iter().map(|(id, score)| json!({"_index": "listings", "_id": id, "_score": score})).collect();
    json!({"took": 3, "timed_out": false, "hits": {"total": {"value": hits.len(), "relation": "eq"}, "hits": hits}})
}

#[tokio::test]
async fn lexical_sends_multi_match_with_filters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_search"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "size": 30,
            "query": {"bool": {
                "must": [{"multi_match": {"query": "near downtown"}}],
                "filter": [
                    {"range": {"price": {"lte": 600000}}},
                    {"term": {"status": "active"}}
                ]
            }}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_hits(&[("a", 7.5), ("b", 3.1)])))
        .expect(1)
        .mount(&server)
        .await;

    let filters = FilterSet::new().with(Attribute::Price, Constraint::at_most(600_000.0));
    let hits = client(&server).search_lexical("near downtown", &filters, 30).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "a");
    assert_eq!(hits[0].rank, 1);
    assert_eq!(hits[1].rank, 2);
    assert!((hits[0].score - 7.5).abs() < 1e-6);
    assert_eq!(hits[0].source, SourceKind::Lexical);
}

#[tokio::test]
async fn semantic_sends_knn_with_embedded_filter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_search"))
        .and(body_partial_json(json!({
            "query": {"knn": {"embedding": {"vector": [0.5, 0.25], "k": 12}}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_hits(&[("c", 0.91)])))
        .expect(1)
        .mount(&server)
        .await;

    let hits = client(&server).search_semantic(&[0.5, 0.25], &FilterSet::new(), 12).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, SourceKind::Semantic);
}

#[tokio::test]
async fn server_error_is_index_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("cluster_block_exception"))
        .mount(&server)
        .await;

    let err = client(&server).search_lexical("x", &FilterSet::new(), 10).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(ref m) if m.contains("503")), "got {err:?}");
}

#[tokio::test]
async fn garbage_body_is_index_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).search_lexical("x", &FilterSet::new(), 10).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
}

#[tokio::test]
async fn slow_store_is_index_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_hits(&[])).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = client(&server).search_lexical("x", &FilterSet::new(), 10).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
}

#[tokio::test]
async fn get_many_uses_one_mget_and_skips_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_mget"))
        .and(body_partial_json(json!({"ids": ["a", "gone", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [
                {"_index": "listings", "_id": "a", "found": true, "_source": {
                    "title": "Lake cabin", "price": 300000.0,
                    "location": {"city": "Austin", "state": "TX"},
                    "details": {"bedrooms": 2, "bathrooms": 1.0, "property_type": "house"},
                    "status": "active"
                }},
                {"_index": "listings", "_id": "gone", "found": false},
                {"_index": "listings", "_id": "b", "found": true, "_source": {"title": "broken"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["a".to_string(), "gone".to_string(), "b".to_string()];
    let got = client(&server).get_many(&ids).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].id, "a");
    assert_eq!(got[0].location.city, "Austin");
}

#[tokio::test]
async fn health_reports_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "node-1", "cluster_name": "homes",
            "version": {"distribution": "opensearch", "number": "2.11.0"}
        })))
        .mount(&server)
        .await;

    let health = client(&server).health().await.unwrap();
    assert_eq!(health.version, "2.11.0");
    assert_eq!(health.cluster_name.as_deref(), Some("homes"));
}

#[tokio::test]
async fn location_suggestions_use_terms_aggregations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listings/_search"))
        .and(body_partial_json(json!({
            "size": 0,
            "aggs": {
                "unique_cities": {"terms": {"field": "location.city", "size": 5}},
                "unique_neighborhoods": {"terms": {"field": "location.neighborhood", "size": 5}}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 2, "timed_out": false,
            "hits": {"total": {"value": 6, "relation": "eq"}, "hits": []},
            "aggregations": {
                "unique_cities": {"buckets": [
                    {"key": "Austin", "doc_count": 4},
                    {"key": "Dallas", "doc_count": 9}
                ]},
                "unique_neighborhoods": {"buckets": [
                    {"key": "Austin", "doc_count": 1},
                    {"key": "Old West Austin", "doc_count": 2}
                ]}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let got = client(&server).suggest_locations("aus", 5).await.unwrap();
    assert_eq!(got, vec!["Austin", "Old West Austin"]);
}

#[tokio::test]
async fn blank_suggestion_input_never_reaches_the_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let err = client(&server).suggest_locations("   ", 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}
