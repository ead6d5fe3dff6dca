pub mod market;
pub mod outcome;
pub mod signal;
pub mod statistics;
pub mod tracking;

pub use market::{Kline, KlineInterval};
pub use outcome::{OutcomeClass, SignalOutcome};
pub use signal::{MarketContext, Signal, SignalDirection, SignalStatus};
pub use statistics::{StatPeriod, StatScope, Statistics};
pub use tracking::{SignalKlineTracking, SignalTracking};
