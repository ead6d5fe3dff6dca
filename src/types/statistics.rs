use serde::{Deserialize, Serialize};

/// Aggregation scope: overall, per strategy, per symbol, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl StatScope {
    pub fn overall() -> Self {
        Self::default()
    }

    pub fn strategy(strategy: impl Into<String>) -> Self {
        Self {
            strategy: Some(strategy.into()),
            symbol: None,
        }
    }

    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            strategy: None,
            symbol: Some(symbol.into()),
        }
    }
}

/// Rolling statistics window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatPeriod {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "all")]
    All,
}

impl StatPeriod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "24h" | "1d" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "30d" => Some(Self::Month),
            "90d" => Some(Self::Quarter),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::All => "all",
        }
    }

    /// Half-open window `[start, end)` ending at `now` (milliseconds).
    pub fn window(&self, now: i64) -> (i64, i64) {
        let start = match self {
            Self::Day => now - 86_400_000,
            Self::Week => now - 7 * 86_400_000,
            Self::Month => now - 30 * 86_400_000,
            Self::Quarter => now - 90 * 86_400_000,
            Self::All => 0,
        };
        (start.max(0), now)
    }
}

/// Aggregate snapshot over a (strategy?, symbol?, period) slice. Purely
/// derived from immutable signal history; safe to discard and rebuild.
///
/// All derived rates are absent, not zero or NaN, when their denominator
/// is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub period: StatPeriod,

    /// Signals generated in the window.
    pub total_signals: u64,
    /// Signals that passed confirmation.
    pub confirmed_signals: u64,
    pub invalidated_signals: u64,
    /// Signals closed in the window (the performance denominator below).
    pub closed_signals: u64,
    pub profitable_signals: u64,
    pub losing_signals: u64,
    pub neutral_signals: u64,

    /// profitable / (profitable + losing). Breakeven signals are excluded
    /// from the denominator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    /// sum(positive pnl) / |sum(negative pnl)|; absent when no losses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_factor: Option<f64>,
    /// Fraction of kline rows profitable at their favorable extreme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kline_theoretical_win_rate: Option<f64>,
    /// Fraction of kline rows profitable at close.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kline_close_win_rate: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_hourly_return_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hourly_return_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_hourly_return_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_max_profit_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_max_drawdown_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_final_pnl_pct: Option<f64>,

    /// Unix timestamp (milliseconds) when this snapshot was computed.
    pub calculated_at: i64,
}
