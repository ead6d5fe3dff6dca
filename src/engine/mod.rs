//! Signal lifecycle and performance analytics engine.
//!
//! Lifecycle management, price-path tracking, outcome resolution and
//! statistics aggregation. All components talk to each other only
//! through the signal store.

pub mod aggregator;
pub mod lifecycle;
pub mod resolver;
pub mod scheduler;
pub mod tracker;

pub use aggregator::{compute_statistics, Aggregator};
pub use lifecycle::{LifecycleManager, MarketSnapshot, SignalVerdict};
pub use resolver::{resolve, BREAKEVEN_EPSILON_PCT};
pub use scheduler::Scheduler;
pub use tracker::Tracker;
