//! Signal lifecycle state machine.
//!
//! The only legal edges are:
//! PENDING -> CONFIRMED -> TRACKING -> {CLOSED, INVALIDATED} and
//! PENDING -> INVALIDATED. Every write goes through the store's
//! optimistic expected-status transition, so two workers racing on the
//! same signal resolve to exactly one winner; the loser observes the
//! already-applied state and performs no write.

use crate::config::LifecycleConfig;
use crate::engine::resolver;
use crate::error::{AppError, Result};
use crate::store::SignalRepository;
use crate::types::{Signal, SignalStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Externally supplied lifecycle condition from the signal generation
/// process (out of scope here): confirm the premise or declare it
/// violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalVerdict {
    Confirm,
    Invalidate,
}

/// Point-in-time market observation driving a lifecycle step.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot {
    /// Unix timestamp (milliseconds) of the observation.
    pub observed_at: i64,
    /// Current price, when available. Deadline checks run without one.
    pub price: Option<f64>,
    /// Externally supplied confirmation/invalidation condition.
    pub verdict: Option<SignalVerdict>,
}

impl MarketSnapshot {
    pub fn at_price(observed_at: i64, price: f64) -> Self {
        Self {
            observed_at,
            price: Some(price),
            verdict: None,
        }
    }

    pub fn time_only(observed_at: i64) -> Self {
        Self {
            observed_at,
            price: None,
            verdict: None,
        }
    }

    pub fn with_verdict(mut self, verdict: SignalVerdict) -> Self {
        self.verdict = Some(verdict);
        self
    }
}

/// Owns status transitions and synchronously resolves outcomes at
/// closure.
pub struct LifecycleManager {
    store: Arc<dyn SignalRepository>,
    policy: LifecycleConfig,
}

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

impl LifecycleManager {
    pub fn new(store: Arc<dyn SignalRepository>, policy: LifecycleConfig) -> Arc<Self> {
        Arc::new(Self { store, policy })
    }

    fn confirm_deadline_ms(&self) -> i64 {
        (self.policy.confirm_deadline_hours * MILLIS_PER_HOUR) as i64
    }

    fn max_holding_ms(&self) -> i64 {
        (self.policy.max_holding_hours * MILLIS_PER_HOUR) as i64
    }

    /// Advance one signal through the state machine given a market
    /// snapshot. Returns the (possibly unchanged) status and whether a
    /// transition was applied. Idempotent: re-invoking on a terminal
    /// signal is a no-op, not an error.
    pub fn advance(&self, signal: &Signal, snap: &MarketSnapshot) -> Result<(SignalStatus, bool)> {
        match signal.status {
            SignalStatus::Closed | SignalStatus::Invalidated => Ok((signal.status, false)),
            SignalStatus::Pending => self.advance_pending(signal, snap),
            // CONFIRMED is transient: monitoring starts immediately.
            SignalStatus::Confirmed => {
                self.transition(signal, SignalStatus::Confirmed, SignalStatus::Tracking, snap)
            }
            SignalStatus::Tracking => self.advance_tracking(signal, snap),
        }
    }

    fn advance_pending(
        &self,
        signal: &Signal,
        snap: &MarketSnapshot,
    ) -> Result<(SignalStatus, bool)> {
        if snap.verdict == Some(SignalVerdict::Invalidate) {
            return self.transition(signal, SignalStatus::Pending, SignalStatus::Invalidated, snap);
        }

        let deadline = signal.generated_at + self.confirm_deadline_ms();
        if snap.verdict == Some(SignalVerdict::Confirm) && snap.observed_at <= deadline {
            let (status, transitioned) =
                self.transition(signal, SignalStatus::Pending, SignalStatus::Confirmed, snap)?;
            if !transitioned {
                return Ok((status, false));
            }
            // Enter active monitoring immediately; no separate gate.
            let confirmed = self.store.fetch_signal(&signal.signal_id)?;
            return self.transition(
                &confirmed,
                SignalStatus::Confirmed,
                SignalStatus::Tracking,
                snap,
            );
        }

        if snap.observed_at > deadline {
            info!(
                signal_id = %signal.signal_id,
                "confirmation deadline elapsed, invalidating"
            );
            return self.transition(signal, SignalStatus::Pending, SignalStatus::Invalidated, snap);
        }

        Ok((SignalStatus::Pending, false))
    }

    fn advance_tracking(
        &self,
        signal: &Signal,
        snap: &MarketSnapshot,
    ) -> Result<(SignalStatus, bool)> {
        if snap.verdict == Some(SignalVerdict::Invalidate) {
            return self.transition(
                signal,
                SignalStatus::Tracking,
                SignalStatus::Invalidated,
                snap,
            );
        }

        let price_closes = snap
            .price
            .map(|p| signal.target_hit(p) || signal.stop_hit(p))
            .unwrap_or(false);
        let held_out = signal
            .confirmed_at
            .map(|confirmed| snap.observed_at - confirmed >= self.max_holding_ms())
            .unwrap_or(false);

        if price_closes || held_out {
            return self.close(signal, snap);
        }

        Ok((SignalStatus::Tracking, false))
    }

    /// Close a tracking signal and resolve its outcome in the same
    /// logical operation, so there is no schedulable window in which the
    /// signal is CLOSED without an outcome.
    fn close(&self, signal: &Signal, snap: &MarketSnapshot) -> Result<(SignalStatus, bool)> {
        let (status, transitioned) =
            self.transition(signal, SignalStatus::Tracking, SignalStatus::Closed, snap)?;
        if !transitioned {
            return Ok((status, false));
        }

        let closed = self.store.fetch_signal(&signal.signal_id)?;
        self.resolve_and_store(&closed, false)?;
        Ok((SignalStatus::Closed, true))
    }

    /// Resolve and persist an outcome for a closed signal. An invariant
    /// violation is logged and flags the signal for manual inspection
    /// instead of producing a wrong outcome.
    fn resolve_and_store(&self, signal: &Signal, replace: bool) -> Result<bool> {
        let history = self.store.fetch_tracking(&signal.signal_id)?;
        match resolver::resolve(signal, &history) {
            Ok(outcome) => {
                self.store.write_outcome(&outcome, replace)?;
                info!(
                    signal_id = %signal.signal_id,
                    classification = outcome.classification.as_str(),
                    final_pnl_pct = outcome.final_pnl_pct,
                    "signal closed and resolved"
                );
                Ok(true)
            }
            Err(AppError::InvariantViolation(reason)) => {
                error!(signal_id = %signal.signal_id, %reason, "outcome resolution failed");
                self.store.flag_for_review(&signal.signal_id, &reason)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply one optimistic transition. A `Conflict` means a concurrent
    /// worker already moved the signal; the current state is re-read and
    /// reported as a no-op.
    fn transition(
        &self,
        signal: &Signal,
        expected: SignalStatus,
        new: SignalStatus,
        snap: &MarketSnapshot,
    ) -> Result<(SignalStatus, bool)> {
        match self
            .store
            .apply_transition(&signal.signal_id, expected, new, snap.observed_at)
        {
            Ok(()) => Ok((new, true)),
            Err(AppError::Conflict(_)) => {
                let current = self.store.fetch_signal(&signal.signal_id)?;
                warn!(
                    signal_id = %signal.signal_id,
                    intended = new.as_str(),
                    actual = current.status.as_str(),
                    "lost transition race, discarding"
                );
                Ok((current.status, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Startup repair sweep: re-resolve any CLOSED signal missing an
    /// outcome. Resolution is deterministic, so this is safe to re-run.
    pub fn repair_missing_outcomes(&self) -> Result<usize> {
        let ids = self.store.closed_without_outcome()?;
        let mut repaired = 0;
        for id in &ids {
            let signal = self.store.fetch_signal(id)?;
            if self.resolve_and_store(&signal, false)? {
                repaired += 1;
            }
        }
        if !ids.is_empty() {
            info!(
                candidates = ids.len(),
                repaired, "repaired closed signals missing outcomes"
            );
        }
        Ok(repaired)
    }
}
