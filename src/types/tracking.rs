use serde::{Deserialize, Serialize};

/// One sampled observation of a signal's price path. Immutable once
/// written; `tracked_at` is strictly increasing per signal and the
/// highest/lowest fields are running extrema over the signal's history,
/// not point-in-time values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTracking {
    pub signal_id: String,
    /// Unix timestamp (milliseconds) of the sample.
    pub tracked_at: i64,
    pub current_price: f64,
    /// Raw change versus price-at-signal, in percent.
    pub price_change_pct: f64,
    /// Running maximum price since the signal was generated.
    pub highest_price: f64,
    pub highest_change_pct: f64,
    /// Running minimum price since the signal was generated.
    pub lowest_price: f64,
    pub lowest_change_pct: f64,
    /// Elapsed hours since confirmation.
    pub hours_tracked: f64,
    pub is_profit_target_hit: bool,
    pub is_stop_loss_hit: bool,
}

/// One completed kline since signal generation, annotated with
/// performance versus the generation price. Append-only, owned by the
/// signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalKlineTracking {
    pub signal_id: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_change_pct: f64,
    pub high_change_pct: f64,
    pub low_change_pct: f64,
    pub close_change_pct: f64,
    /// Within-bar return, (close - open) / open in percent.
    pub hourly_return_pct: f64,
    /// Direction-aware: was the favorable extreme of this bar on the
    /// profitable side of the entry price.
    pub profitable_at_high: bool,
    /// Direction-aware: was the bar close on the profitable side.
    pub profitable_at_close: bool,
}
