//! Durable storage contract for signals and their derived history.
//!
//! The store is the single source of truth: the tracker, lifecycle
//! manager, resolver and aggregator communicate only through it, never
//! through in-process shared state.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::{
    Signal, SignalDirection, SignalKlineTracking, SignalOutcome, SignalStatus, SignalTracking,
    StatPeriod, StatScope, Statistics,
};
use std::collections::HashMap;

/// Filtered signal query with pagination.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub status: Option<SignalStatus>,
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub direction: Option<SignalDirection>,
    /// Range over `generated_at` (milliseconds, half-open).
    pub generated_from: Option<i64>,
    pub generated_to: Option<i64>,
    /// Range over `closed_at` (milliseconds, half-open).
    pub closed_from: Option<i64>,
    pub closed_to: Option<i64>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl SignalFilter {
    pub fn new() -> Self {
        Self {
            page: 1,
            limit: 20,
            ..Default::default()
        }
    }

    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1) * self.limit
    }
}

/// One page of signals plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct SignalPage {
    pub items: Vec<Signal>,
    pub total: u64,
}

/// Repository contract the engine depends on. The storage engine is a
/// swappable implementation, never a concrete dependency of the core
/// logic.
pub trait SignalRepository: Send + Sync {
    /// Fetch a signal by id. `NotFound` for unknown ids.
    fn fetch_signal(&self, signal_id: &str) -> Result<Signal>;

    /// Fetch signals matching the filter, newest first, plus the total
    /// match count.
    fn fetch_signals(&self, filter: &SignalFilter) -> Result<SignalPage>;

    /// All signals in a non-terminal status.
    fn fetch_active_signals(&self) -> Result<Vec<Signal>>;

    /// Insert a freshly generated signal.
    fn insert_signal(&self, signal: &Signal) -> Result<()>;

    /// Append one tracking point. Rejects non-monotonic `tracked_at` with
    /// an invariant violation.
    fn insert_tracking(&self, tracking: &SignalTracking) -> Result<()>;

    /// Append one kline tracking point. Idempotent per
    /// (signal_id, open_time): re-inserting an already recorded bar is a
    /// no-op.
    fn insert_kline_tracking(&self, kline: &SignalKlineTracking) -> Result<()>;

    /// Full tracking history, ascending by `tracked_at`.
    fn fetch_tracking(&self, signal_id: &str) -> Result<Vec<SignalTracking>>;

    /// Most recent tracking point, if any.
    fn latest_tracking(&self, signal_id: &str) -> Result<Option<SignalTracking>>;

    /// Full kline history, ascending by `open_time`.
    fn fetch_kline_tracking(&self, signal_id: &str) -> Result<Vec<SignalKlineTracking>>;

    /// Open time of the most recently recorded kline, if any.
    fn latest_kline_open_time(&self, signal_id: &str) -> Result<Option<i64>>;

    /// Write the terminal outcome. Fails with `Conflict` if an outcome
    /// already exists, unless `replace` is set (replacement is atomic and
    /// whole-record).
    fn write_outcome(&self, outcome: &SignalOutcome, replace: bool) -> Result<()>;

    /// Fetch the outcome for one signal, if resolved.
    fn fetch_outcome(&self, signal_id: &str) -> Result<Option<SignalOutcome>>;

    /// Batch outcome lookup. Absent entries are tolerated, not errors.
    fn fetch_outcomes(&self, signal_ids: &[String]) -> Result<HashMap<String, SignalOutcome>>;

    /// Atomically transition a signal's status. Fails with `Conflict` when
    /// the stored status does not match `expected` (optimistic
    /// concurrency), `NotFound` for unknown ids. Sets `confirmed_at` /
    /// `closed_at` to `at` when entering CONFIRMED / CLOSED.
    fn apply_transition(
        &self,
        signal_id: &str,
        expected: SignalStatus,
        new: SignalStatus,
        at: i64,
    ) -> Result<()>;

    /// Persist an aggregate snapshot.
    fn write_statistics(&self, stats: &Statistics) -> Result<()>;

    /// Stored snapshots for a scope/period, newest first.
    fn fetch_statistics_history(
        &self,
        scope: &StatScope,
        period: StatPeriod,
        limit: u32,
    ) -> Result<Vec<Statistics>>;

    /// Distinct strategies seen across all signals.
    fn distinct_strategies(&self) -> Result<Vec<String>>;

    /// Distinct symbols seen across all signals.
    fn distinct_symbols(&self) -> Result<Vec<String>>;

    /// CLOSED signals missing an outcome (repair sweep input).
    fn closed_without_outcome(&self) -> Result<Vec<String>>;

    /// Flag a signal for manual inspection.
    fn flag_for_review(&self, signal_id: &str, reason: &str) -> Result<()>;
}
