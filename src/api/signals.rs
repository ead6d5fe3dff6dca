//! Read-only signal endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::api::response::{ApiResponse, Page, Pagination};
use crate::error::Result;
use crate::store::SignalFilter;
use crate::types::{Signal, SignalDirection, SignalKlineTracking, SignalOutcome, SignalStatus,
    SignalTracking};
use crate::AppState;

const MAX_PAGE_SIZE: u32 = 200;

/// A signal together with its outcome, when resolved.
#[derive(Debug, Serialize)]
pub struct SignalWithOutcome {
    #[serde(flatten)]
    pub signal: Signal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SignalOutcome>,
}

/// Query parameters for the signal list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct SignalListQuery {
    pub status: Option<String>,
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub direction: Option<String>,
    /// Inclusive start of the generated_at range (milliseconds).
    pub start: Option<i64>,
    /// Exclusive end of the generated_at range (milliseconds).
    pub end: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Create the signals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_signals))
        .route("/active", get(active_signals))
        .route("/:id", get(get_signal))
        .route("/:id/tracking", get(get_tracking))
        .route("/:id/klines", get(get_kline_tracking))
}

fn build_filter(query: &SignalListQuery) -> Result<SignalFilter> {
    let status = match &query.status {
        Some(s) => Some(SignalStatus::from_str(s).ok_or_else(|| {
            crate::error::AppError::BadRequest(format!("unknown status: {s}"))
        })?),
        None => None,
    };
    let direction = match &query.direction {
        Some(d) => Some(SignalDirection::from_str(d).ok_or_else(|| {
            crate::error::AppError::BadRequest(format!("unknown direction: {d}"))
        })?),
        None => None,
    };

    Ok(SignalFilter {
        status,
        symbol: query.symbol.clone(),
        strategy: query.strategy.clone(),
        direction,
        generated_from: query.start,
        generated_to: query.end,
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE),
        ..Default::default()
    })
}

/// Attach outcomes to signals. Outcomes are supplementary: a failing
/// batch lookup degrades to absent outcomes instead of failing the
/// request.
fn with_outcomes(state: &AppState, signals: Vec<Signal>) -> Vec<SignalWithOutcome> {
    let ids: Vec<String> = signals.iter().map(|s| s.signal_id.clone()).collect();
    let outcomes = state.store.fetch_outcomes(&ids).unwrap_or_else(|e| {
        warn!(error = %e, "outcome batch lookup failed, degrading to absent");
        HashMap::new()
    });
    signals
        .into_iter()
        .map(|signal| {
            let outcome = outcomes.get(&signal.signal_id).cloned();
            SignalWithOutcome { signal, outcome }
        })
        .collect()
}

/// Paginated signal listing with filters.
async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<SignalListQuery>,
) -> Result<Json<ApiResponse<Page<SignalWithOutcome>>>> {
    let filter = build_filter(&query)?;
    let page = state.store.fetch_signals(&filter)?;
    let pagination = Pagination::new(filter.page, filter.limit, page.total);
    let items = with_outcomes(&state, page.items);
    Ok(ApiResponse::ok(Page { items, pagination }))
}

/// All signals in a non-terminal status.
async fn active_signals(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Signal>>>> {
    let signals = state.store.fetch_active_signals()?;
    Ok(ApiResponse::ok(signals))
}

/// Single signal with its outcome.
async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SignalWithOutcome>>> {
    let signal = state.store.fetch_signal(&id)?;
    let outcome = state.store.fetch_outcome(&id).unwrap_or_else(|e| {
        warn!(signal_id = %id, error = %e, "outcome lookup failed, degrading to absent");
        None
    });
    Ok(ApiResponse::ok(SignalWithOutcome { signal, outcome }))
}

/// Tracking history for a signal.
async fn get_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<SignalTracking>>>> {
    // 404 for unknown ids rather than an empty history.
    state.store.fetch_signal(&id)?;
    let history = state.store.fetch_tracking(&id)?;
    Ok(ApiResponse::ok(history))
}

/// Kline-tracking history for a signal.
async fn get_kline_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<SignalKlineTracking>>>> {
    state.store.fetch_signal(&id)?;
    let history = state.store.fetch_kline_tracking(&id)?;
    Ok(ApiResponse::ok(history))
}
