use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use mandi_market_data::{
    format_arrival_date, MarketDataError, PageRequest, PricePage, PriceProvider, RateLimit,
    RawPriceRow, DEFAULT_BASE_URL, DEFAULT_RESOURCE_ID,
};
use mandi_server::{api::app_router, build_state_with_provider, config::Config};

/// Serves two listings for any state and day.
struct StubProvider;

#[async_trait]
impl PriceProvider for StubProvider {
    fn id(&self) -> &'static str {
        "STUB"
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 6000,
            burst: 100,
            min_delay: Duration::ZERO,
        }
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError> {
        if request.offset > 0 {
            return Ok(PricePage::default());
        }
        let day = request
            .date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let rows = [("Kolar", "Tomato", 3000i64), ("Mysore", "Onion", 2000i64)]
            .into_iter()
            .map(|(market, commodity, modal)| RawPriceRow {
                state: request.state.clone(),
                district: market.to_string(),
                market: market.to_string(),
                commodity: commodity.to_string(),
                variety: "Local".to_string(),
                grade: "FAQ".to_string(),
                arrival_date: format_arrival_date(day),
                min_price: Some(modal.into()),
                max_price: Some(modal.into()),
                modal_price: Some(modal.into()),
            })
            .collect();
        Ok(PricePage::from_rows(rows, request.limit))
    }
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        db_path: dir.path().join("test.db").to_string_lossy().to_string(),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(30),
        data_gov_api_key: None,
        data_gov_base_url: DEFAULT_BASE_URL.to_string(),
        data_gov_resource_id: DEFAULT_RESOURCE_ID.to_string(),
        requests_per_minute: 6000,
        page_size: 100,
        hot_states: vec!["Karnataka".to_string()],
        cache_window_days: 1,
        cache_preload: false,
        backfill_delay: Duration::ZERO,
        sync_interval: None,
    }
}

async fn build_test_router(dir: &TempDir) -> Router {
    let config = test_config(dir);
    let state = build_state_with_provider(&config, Arc::new(StubProvider))
        .await
        .unwrap();
    app_router(state, &config)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn healthz_works() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn point_query_fetches_upstream_then_serves_store() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;
    let uri = "/api/v1/market/data?state=Karnataka&date=2025-01-15";

    let (status, body) = send(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "upstream");
    assert_eq!(body["total_records"], 2);
    assert_eq!(body["data"][0]["id"], "Karnataka_2025-01-15_Mysore_Onion");

    let (status, body) = send(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "store");
    assert_eq!(body["total_records"], 2);
}

#[tokio::test]
async fn invalid_limit_is_bad_request() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/market/data?state=Karnataka&limit=0",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn price_update_reports_missing_and_conflicting_records() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;

    let update = json!({
        "state": "Karnataka",
        "market": "Kolar",
        "commodity": "Tomato",
        "date": "2025-01-15",
        "new_price": 3200,
        "updated_by": "tester"
    });

    let (status, body) = send(&app, Method::PUT, "/api/v1/market/price", Some(update.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("No record found"));

    send(
        &app,
        Method::GET,
        "/api/v1/market/data?state=Karnataka&date=2025-01-15",
        None,
    )
    .await;

    let (status, body) = send(&app, Method::PUT, "/api/v1/market/price", Some(update.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["version"], 2);

    let mut stale = update;
    stale["expected_version"] = json!(1);
    let (status, _) = send(&app, Method::PUT, "/api/v1/market/price", Some(stale)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cache_endpoints_follow_load_state() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/market/cache/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loading_status"], "not_started");

    let trend = "/api/v1/market/trend?state=Karnataka&commodity=Tomatoes";
    let (status, _) = send(&app, Method::GET, trend, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(&app, Method::POST, "/api/v1/market/cache/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total_records"], 4);

    let (status, body) = send(&app, Method::GET, trend, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn backfill_rejects_inverted_range() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;

    let request = json!({
        "states": ["Karnataka"],
        "start_date": "2025-01-10",
        "end_date": "2025-01-01"
    });
    let (status, _) = send(&app, Method::POST, "/api/v1/market/backfill", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backfill_stores_requested_days() {
    let tmp = tempdir().unwrap();
    let app = build_test_router(&tmp).await;

    let request = json!({
        "states": ["Karnataka"],
        "start_date": "2025-01-01",
        "end_date": "2025-01-03"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/market/backfill", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records_stored"], 6);
    assert_eq!(body["errors"], 0);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/v1/market/filtered?state=Karnataka&commodity=tom&start_date=2025-01-01&end_date=2025-01-03",
        None,
    )
    .await;
    assert_eq!(body["total_records"], 3);
    assert_eq!(body["data"][0]["date"], "2025-01-03");
}
