//! HTTP-level tests for the engine and listing adapters (§6), against real
//! wire bodies served by `wiremock` rather than hand-rolled fakes - these are
//! the only two components in the crate that actually speak HTTP, so they're
//! the only ones worth testing at that layer.

use std::time::Duration;

use igo_dispatch::engine::HttpEngineClient;
use igo_dispatch::listing::HttpListingApiClient;
use igo_dispatch::ports::{EngineClient, ListingApiClient};
use igo_dispatch::types::enums::{MatchStatus, Player};
use igo_dispatch::types::primitives::Coord;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn engine_client_parses_a_successful_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rootInfo": { "winrate": 0.62, "scoreLead": 3.4 },
            "moveInfos": [
                { "move": "Q16", "winrate": 0.6, "scoreLead": 3.0, "visits": 500, "prior": 0.3, "pv": ["Q16", "D4"] }
            ]
        })))
        .mount(&server)
        .await;

    let client = HttpEngineClient::new(reqwest::Client::new(), server.uri());
    let request = igo_dispatch::ports::AnalysisRequest {
        request_id: "m1-3".to_string(),
        moves: vec![igo_dispatch::ports::EngineMove { player: Player::Black, coord: "Q16".to_string() }],
        rules: "chinese".to_string(),
        komi: 7.5,
        board_size: 19,
        max_visits: 500,
        priority: 1000,
    };

    let result = client.analyze(&request).await.unwrap().expect("engine returned a result");
    assert!((result.winrate - 0.62).abs() < f64::EPSILON);
    assert_eq!(result.top_moves.len(), 1);
    assert_eq!(result.top_moves[0].coord, Coord::new("Q16").unwrap());
}

#[tokio::test]
async fn engine_client_maps_server_error_to_infra_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpEngineClient::new(reqwest::Client::new(), server.uri());
    let request = igo_dispatch::ports::AnalysisRequest {
        request_id: "m1-3".to_string(),
        moves: vec![],
        rules: "chinese".to_string(),
        komi: 7.5,
        board_size: 19,
        max_visits: 500,
        priority: 1000,
    };

    assert!(client.analyze(&request).await.is_err());
}

#[tokio::test]
async fn engine_client_health_check_reflects_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = HttpEngineClient::new(reqwest::Client::new(), server.uri());
    assert!(client.health_check().await);
}

#[tokio::test]
async fn listing_client_parses_bare_array_and_nested_live_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "liveId": "m1", "blackName": "Kim Jiseok", "whiteName": "Gu Zihao", "status": "live" },
            { "liveMatch": { "liveId": "m2", "blackName": "Shin Jinseo", "whiteName": "Park Junghwan", "status": "live" } }
        ])))
        .mount(&server)
        .await;

    let client = HttpListingApiClient::new(reqwest::Client::new(), server.uri(), 2, Duration::from_millis(10));
    let mut ids = client.list_live_matches().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["m1".to_string(), "m2".to_string()]);
}

#[tokio::test]
async fn listing_client_get_situation_returns_none_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/situation/unknown"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpListingApiClient::new(reqwest::Client::new(), server.uri(), 2, Duration::from_millis(10));
    assert!(client.get_situation("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn listing_client_retries_on_server_error_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/situation/m1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/situation/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "liveId": "m1",
            "blackName": "Kim Jiseok",
            "whiteName": "Gu Zihao",
            "status": "finished",
            "moves": ["Q16", "D4"],
            "result": "B+3.5"
        })))
        .mount(&server)
        .await;

    let client = HttpListingApiClient::new(reqwest::Client::new(), server.uri(), 2, Duration::from_millis(5));
    let situation = client.get_situation("m1").await.unwrap().expect("situation parsed after retry");
    assert_eq!(situation.status, MatchStatus::Finished);
    assert_eq!(situation.result.as_deref(), Some("B+3.5"));
}

#[tokio::test]
async fn listing_client_falls_back_to_empty_moves_on_malformed_move_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/situation/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "liveId": "m1",
            "blackName": "Kim Jiseok",
            "whiteName": "Gu Zihao",
            "status": "live",
            "moves": ["Q16", "not-a-coord", "D4"]
        })))
        .mount(&server)
        .await;

    let client = HttpListingApiClient::new(reqwest::Client::new(), server.uri(), 2, Duration::from_millis(10));
    let situation = client.get_situation("m1").await.unwrap().expect("descriptor still parses despite bad move");
    assert!(situation.moves.is_empty(), "malformed move list falls back to empty rather than erroring the whole descriptor");
}

#[tokio::test]
async fn listing_client_fails_fast_on_non_retryable_4xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/situation/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = HttpListingApiClient::new(reqwest::Client::new(), server.uri(), 5, Duration::from_millis(5));
    assert!(client.get_situation("forbidden").await.is_err());
}
