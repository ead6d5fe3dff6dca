use serde::{Deserialize, Serialize};

/// Terminal classification of a closed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeClass {
    Profit,
    Loss,
    Breakeven,
}

impl OutcomeClass {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PROFIT" => Some(Self::Profit),
            "LOSS" => Some(Self::Loss),
            "BREAKEVEN" => Some(Self::Breakeven),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profit => "PROFIT",
            Self::Loss => "LOSS",
            Self::Breakeven => "BREAKEVEN",
        }
    }
}

/// Terminal resolution of a CLOSED signal, computed exactly once from the
/// accumulated tracking history. Contains no wall-clock field so that
/// resolving the same history twice yields byte-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub signal_id: String,
    pub classification: OutcomeClass,
    /// Direction-adjusted final PnL in percent: for SHORT a price decrease
    /// is positive.
    pub final_pnl_pct: f64,
    /// Maximum favorable excursion over the tracking history, in percent.
    pub max_profit_pct: f64,
    /// Maximum adverse excursion over the tracking history, in percent
    /// (negative when any adverse move was observed).
    pub max_drawdown_pct: f64,
    /// max_profit_pct / |max_drawdown_pct|; absent when no drawdown was
    /// observed (never zero or infinity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_reward_ratio: Option<f64>,
    /// Elapsed hours between confirmation and closure.
    pub total_tracking_hours: f64,
}
