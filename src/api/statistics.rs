//! Read-only statistics endpoints.
//!
//! Overview/strategy/symbol endpoints recompute on demand (statistics
//! are purely derived); history reads stored snapshots.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::response::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{StatPeriod, StatScope, Statistics};
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StatsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub strategy: Option<String>,
    pub symbol: Option<String>,
    pub period: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    /// Comma-separated strategy names.
    pub strategies: String,
    pub period: Option<String>,
}

/// Create the statistics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/strategy/:strategy", get(by_strategy))
        .route("/symbol/:symbol", get(by_symbol))
        .route("/history", get(history))
        .route("/compare", get(compare))
}

fn parse_period(period: &Option<String>) -> Result<StatPeriod> {
    match period {
        Some(p) => {
            StatPeriod::from_str(p).ok_or_else(|| AppError::BadRequest(format!("unknown period: {p}")))
        }
        None => Ok(StatPeriod::default()),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Overall statistics for a period.
async fn overview(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<Statistics>>> {
    let period = parse_period(&query.period)?;
    let stats = state
        .aggregator
        .aggregate(&StatScope::overall(), period, now_millis())?;
    Ok(ApiResponse::ok(stats))
}

/// Statistics for one strategy.
async fn by_strategy(
    State(state): State<AppState>,
    Path(strategy): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<Statistics>>> {
    let period = parse_period(&query.period)?;
    let stats = state
        .aggregator
        .aggregate(&StatScope::strategy(strategy), period, now_millis())?;
    Ok(ApiResponse::ok(stats))
}

/// Statistics for one symbol.
async fn by_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<Statistics>>> {
    let period = parse_period(&query.period)?;
    let stats = state
        .aggregator
        .aggregate(&StatScope::symbol(symbol), period, now_millis())?;
    Ok(ApiResponse::ok(stats))
}

/// Stored snapshot history for a scope.
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<Statistics>>>> {
    let period = parse_period(&query.period)?;
    let scope = StatScope {
        strategy: query.strategy,
        symbol: query.symbol,
    };
    let limit = query.limit.unwrap_or(30).clamp(1, 500);
    let snapshots = state
        .store
        .fetch_statistics_history(&scope, period, limit)?;
    Ok(ApiResponse::ok(snapshots))
}

/// Side-by-side comparison of strategies over one period.
async fn compare(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ApiResponse<Vec<Statistics>>>> {
    let period = parse_period(&query.period)?;
    let now = now_millis();

    let mut results = Vec::new();
    for strategy in query.strategies.split(',').map(str::trim) {
        if strategy.is_empty() {
            continue;
        }
        let stats = state
            .aggregator
            .aggregate(&StatScope::strategy(strategy), period, now)?;
        results.push(stats);
    }
    if results.is_empty() {
        return Err(AppError::BadRequest("no strategies given".to_string()));
    }
    Ok(ApiResponse::ok(results))
}
