pub mod health;
pub mod response;
pub mod signals;
pub mod statistics;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/signals", signals::router())
        .nest("/api/statistics", statistics::router())
}
