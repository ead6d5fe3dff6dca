//! Vigil - futures signal lifecycle tracking and performance analytics server.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod store;
pub mod types;

use engine::Aggregator;
use std::sync::Arc;
use store::SignalRepository;

pub use config::Config;
pub use error::{AppError, Result};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SignalRepository>,
    pub aggregator: Arc<Aggregator>,
}
