//! Terminal outcome resolution for closed signals.
//!
//! Resolution is a pure function of the signal and its tracking history:
//! the same inputs always produce byte-identical output, which makes
//! recomputation and backfill safe.

use crate::error::{AppError, Result};
use crate::types::{OutcomeClass, Signal, SignalOutcome, SignalTracking};

/// Band around zero (in percent) classified as BREAKEVEN. Final PnL is a
/// float percentage, so an exact-zero comparison would almost never fire;
/// anything within ±0.05% of flat is treated as breakeven.
pub const BREAKEVEN_EPSILON_PCT: f64 = 0.05;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Compute the terminal outcome of a closed signal from its tracking
/// history.
///
/// Requires `closed_at` and `confirmed_at` to be set and a non-empty
/// history; anything else is a lifecycle bug surfaced as an invariant
/// violation, never a silently wrong outcome.
pub fn resolve(signal: &Signal, history: &[SignalTracking]) -> Result<SignalOutcome> {
    let closed_at = signal.closed_at.ok_or_else(|| {
        AppError::InvariantViolation(format!(
            "resolving outcome for signal {} without closed_at (status {})",
            signal.signal_id,
            signal.status.as_str()
        ))
    })?;
    let confirmed_at = signal.confirmed_at.ok_or_else(|| {
        AppError::InvariantViolation(format!(
            "resolving outcome for signal {} without confirmed_at",
            signal.signal_id
        ))
    })?;
    if history.is_empty() {
        return Err(AppError::InvariantViolation(format!(
            "resolving outcome for signal {} with empty tracking history",
            signal.signal_id
        )));
    }

    // Final PnL comes from the tracking point nearest closure,
    // direction-adjusted so a favorable move is positive.
    let final_point = history
        .iter()
        .min_by_key(|t| (t.tracked_at - closed_at).abs())
        .expect("non-empty history");
    let final_pnl_pct = signal.direction.adjust_pct(final_point.price_change_pct);

    // MFE/MAE over the whole history, independent of the exit point.
    let mut max_profit_pct = f64::NEG_INFINITY;
    let mut max_drawdown_pct = f64::INFINITY;
    for point in history {
        let adjusted = signal.direction.adjust_pct(point.price_change_pct);
        max_profit_pct = max_profit_pct.max(adjusted);
        max_drawdown_pct = max_drawdown_pct.min(adjusted);
    }

    // Absent, not zero or infinity, when no adverse move was observed.
    let risk_reward_ratio = if max_drawdown_pct < 0.0 {
        Some(max_profit_pct / max_drawdown_pct.abs())
    } else {
        None
    };

    let classification = if final_pnl_pct.abs() <= BREAKEVEN_EPSILON_PCT {
        OutcomeClass::Breakeven
    } else if final_pnl_pct > 0.0 {
        OutcomeClass::Profit
    } else {
        OutcomeClass::Loss
    };

    Ok(SignalOutcome {
        signal_id: signal.signal_id.clone(),
        classification,
        final_pnl_pct,
        max_profit_pct,
        max_drawdown_pct,
        risk_reward_ratio,
        total_tracking_hours: (closed_at - confirmed_at) as f64 / MILLIS_PER_HOUR,
    })
}
