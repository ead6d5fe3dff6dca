mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::{seed_signal, test_store, HOUR_MS};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use vigil::engine::Aggregator;
use vigil::store::{SignalRepository, SqliteStore};
use vigil::types::{OutcomeClass, SignalDirection, SignalOutcome, SignalStatus};
use vigil::{AppState, Config};

fn app(store: Arc<SqliteStore>) -> Router {
    let store: Arc<dyn SignalRepository> = store;
    let state = AppState {
        config: Arc::new(Config::from_env()),
        store: store.clone(),
        aggregator: Aggregator::new(store),
    };
    vigil::api::router().with_state(state)
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app(test_store());
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn signal_list_envelope_and_pagination() {
    let store = test_store();
    for i in 0i64..3 {
        seed_signal(
            &store,
            "BTCUSDT",
            SignalDirection::Long,
            "trend",
            100.0,
            SignalStatus::Tracking,
            i * HOUR_MS,
        );
    }
    let app = app(store);

    let response = get(&app, "/api/signals?limit=2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["message"], "ok");
    let data = &body["data"];
    assert_eq!(data["items"].as_array().unwrap().len(), 2);
    assert_eq!(data["pagination"]["page"], 1);
    assert_eq!(data["pagination"]["limit"], 2);
    assert_eq!(data["pagination"]["total"], 3);
    assert_eq!(data["pagination"]["total_pages"], 2);
    // Newest first.
    assert_eq!(
        data["items"][0]["generated_at"].as_i64().unwrap(),
        2 * HOUR_MS
    );
    assert_eq!(data["items"][0]["status"], "TRACKING");
}

#[tokio::test]
async fn signal_list_rejects_unknown_status() {
    let app = app(test_store());
    let response = get(&app, "/api/signals?status=BOGUS").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Errors share the envelope shape.
    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["data"], Value::Null);
    assert!(body["message"].as_str().unwrap().contains("BOGUS"));
}

#[tokio::test]
async fn unknown_signal_maps_to_404() {
    let app = app(test_store());
    for uri in [
        "/api/signals/no-such-id",
        "/api/signals/no-such-id/tracking",
        "/api/signals/no-such-id/klines",
    ] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["code"], 404);
    }
}

#[tokio::test]
async fn signal_detail_carries_outcome_when_resolved() {
    let store = test_store();
    let signal = seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Closed,
        0,
    );
    store
        .write_outcome(
            &SignalOutcome {
                signal_id: signal.signal_id.clone(),
                classification: OutcomeClass::Profit,
                final_pnl_pct: 4.2,
                max_profit_pct: 5.0,
                max_drawdown_pct: -1.0,
                risk_reward_ratio: Some(5.0),
                total_tracking_hours: 9.0,
            },
            false,
        )
        .unwrap();
    let app = app(store);

    let response = get(&app, &format!("/api/signals/{}", signal.signal_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["signal_id"], signal.signal_id.as_str());
    assert_eq!(data["outcome"]["classification"], "PROFIT");
    assert_eq!(data["outcome"]["final_pnl_pct"].as_f64().unwrap(), 4.2);
}

#[tokio::test]
async fn unresolved_signal_has_no_outcome_field() {
    let store = test_store();
    let signal = seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Tracking,
        0,
    );
    let app = app(store);

    let response = get(&app, &format!("/api/signals/{}", signal.signal_id)).await;
    let body = body_json(response).await;
    assert!(body["data"].get("outcome").is_none());

    // Known signal with no history: empty array, not 404.
    let response = get(&app, &format!("/api/signals/{}/tracking", signal.signal_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn active_endpoint_lists_only_live_signals() {
    let store = test_store();
    seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Tracking,
        0,
    );
    seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Invalidated,
        0,
    );
    let app = app(store);

    let body = body_json(get(&app, "/api/signals/active").await).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "TRACKING");
}

#[tokio::test]
async fn statistics_overview_on_empty_store_has_absent_rates() {
    let app = app(test_store());
    let response = get(&app, "/api/statistics/overview?period=7d").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["period"], "7d");
    assert_eq!(data["total_signals"], 0);
    // Absent, not null or zero.
    assert!(data.get("win_rate").is_none());
    assert!(data.get("profit_factor").is_none());
}

#[tokio::test]
async fn statistics_rejects_unknown_period() {
    let app = app(test_store());
    let response = get(&app, "/api/statistics/overview?period=14d").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strategy_compare_returns_one_entry_per_strategy() {
    let store = test_store();
    seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Tracking,
        chrono::Utc::now().timestamp_millis() - HOUR_MS,
    );
    let app = app(store);

    let response = get(&app, "/api/statistics/compare?strategies=trend,meanrev").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["strategy"], "trend");
    assert_eq!(entries[0]["total_signals"], 1);
    assert_eq!(entries[1]["strategy"], "meanrev");
    assert_eq!(entries[1]["total_signals"], 0);

    let response = get(&app, "/api/statistics/compare?strategies=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn statistics_history_reads_stored_snapshots() {
    let store = test_store();
    seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Tracking,
        chrono::Utc::now().timestamp_millis() - HOUR_MS,
    );
    let aggregator = Aggregator::new(store.clone());
    aggregator
        .run_pass(
            &[vigil::types::StatPeriod::Day],
            chrono::Utc::now().timestamp_millis(),
        )
        .unwrap();
    let app = app(store);

    let response = get(&app, "/api/statistics/history?period=24h").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["period"], "24h");
    assert_eq!(entries[0]["total_signals"], 1);
}
