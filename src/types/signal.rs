use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a futures signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Long,
    Short,
}

impl SignalDirection {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LONG" => Some(Self::Long),
            "SHORT" => Some(Self::Short),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }

    /// Adjust a raw price change percentage for direction so that a
    /// favorable move is always positive. For SHORT a price decrease
    /// yields a positive value.
    pub fn adjust_pct(&self, raw_change_pct: f64) -> f64 {
        match self {
            Self::Long => raw_change_pct,
            Self::Short => -raw_change_pct,
        }
    }

    /// Whether a price is on the profitable side of the entry.
    pub fn is_profitable(&self, price: f64, entry: f64) -> bool {
        match self {
            Self::Long => price > entry,
            Self::Short => price < entry,
        }
    }
}

/// Signal lifecycle status.
///
/// Legal transitions:
/// PENDING -> CONFIRMED -> TRACKING -> CLOSED
/// PENDING -> INVALIDATED, TRACKING -> INVALIDATED.
/// CLOSED and INVALIDATED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Pending,
    Confirmed,
    Tracking,
    Closed,
    Invalidated,
}

impl SignalStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "TRACKING" => Some(Self::Tracking),
            "CLOSED" => Some(Self::Closed),
            "INVALIDATED" => Some(Self::Invalidated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Tracking => "TRACKING",
            Self::Closed => "CLOSED",
            Self::Invalidated => "INVALIDATED",
        }
    }

    /// Terminal states accept no further transitions or tracking.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Invalidated)
    }

    /// States in which the tracker samples price data.
    pub fn is_trackable(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Tracking)
    }
}

/// Market context captured when the signal was generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_short_account_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_short_position_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_trader_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_trader_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_interest: Option<f64>,
}

/// A directional call on a futures contract, tracked from generation to
/// closure. Append-only: status changes supersede, rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Immutable unique id.
    pub signal_id: String,
    pub symbol: String,
    pub direction: SignalDirection,
    pub strategy: String,
    pub status: SignalStatus,
    /// Unix timestamp (milliseconds) when the signal was generated.
    pub generated_at: i64,
    pub price_at_signal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<f64>,
    #[serde(default)]
    pub context: MarketContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Set iff the signal has passed CONFIRMED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<i64>,
    /// Set iff status == CLOSED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    /// Flagged when outcome resolution hit an invariant violation and the
    /// signal needs manual inspection.
    #[serde(default)]
    pub needs_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

impl Signal {
    /// Create a new PENDING signal.
    pub fn new(
        symbol: impl Into<String>,
        direction: SignalDirection,
        strategy: impl Into<String>,
        price_at_signal: f64,
    ) -> Self {
        Self {
            signal_id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            direction,
            strategy: strategy.into(),
            status: SignalStatus::Pending,
            generated_at: chrono::Utc::now().timestamp_millis(),
            price_at_signal,
            target_price: None,
            stop_loss_price: None,
            context: MarketContext::default(),
            rationale: None,
            confirmed_at: None,
            closed_at: None,
            needs_review: false,
            review_reason: None,
        }
    }

    /// Raw price change percentage versus the generation price.
    pub fn change_pct(&self, price: f64) -> f64 {
        (price - self.price_at_signal) / self.price_at_signal * 100.0
    }

    /// Whether the profit target is hit at the given price.
    pub fn target_hit(&self, price: f64) -> bool {
        match (self.target_price, self.direction) {
            (Some(target), SignalDirection::Long) => price >= target,
            (Some(target), SignalDirection::Short) => price <= target,
            (None, _) => false,
        }
    }

    /// Whether the stop loss is hit at the given price.
    pub fn stop_hit(&self, price: f64) -> bool {
        match (self.stop_loss_price, self.direction) {
            (Some(stop), SignalDirection::Long) => price <= stop,
            (Some(stop), SignalDirection::Short) => price >= stop,
            (None, _) => false,
        }
    }
}
