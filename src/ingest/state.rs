//! Run state for one ingestion process.
//!
//! `RunState` is owned by the controller and mutated only through the
//! transition methods below. Nothing here is persisted; the resume index is
//! reported to the operator on exit.

use std::fmt;

use crate::types::LedgerIndex;

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Iterations keep starting.
    Running,
    /// A stop was requested; no new iteration starts.
    StopRequested,
    /// The loop has exited.
    Stopped,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Running => "running",
            RunPhase::StopRequested => "stop_requested",
            RunPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Progress of the ingestion loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    phase: RunPhase,
    start: LedgerIndex,
    cursor: LedgerIndex,
    stop_at: Option<LedgerIndex>,
    last_completed: Option<LedgerIndex>,
    /// Set once `u64::MAX` has been completed; there is no index after it.
    exhausted: bool,
    ledgers_written: u64,
    transactions_written: u64,
}

impl RunState {
    /// A fresh run starting at `start`. `stop_at`, if set, is exclusive.
    pub fn new(start: LedgerIndex, stop_at: Option<LedgerIndex>) -> Self {
        Self {
            phase: RunPhase::Running,
            start,
            cursor: start,
            stop_at,
            last_completed: None,
            exhausted: false,
            ledgers_written: 0,
            transactions_written: 0,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn start(&self) -> LedgerIndex {
        self.start
    }

    /// The next ledger to ingest.
    pub fn cursor(&self) -> LedgerIndex {
        self.cursor
    }

    pub fn stop_at(&self) -> Option<LedgerIndex> {
        self.stop_at
    }

    /// The last ledger whose ledger and transaction writes both committed.
    pub fn last_completed(&self) -> Option<LedgerIndex> {
        self.last_completed
    }

    pub fn ledgers_written(&self) -> u64 {
        self.ledgers_written
    }

    pub fn transactions_written(&self) -> u64 {
        self.transactions_written
    }

    /// Returns true if a new iteration may start.
    pub fn can_advance(&self) -> bool {
        self.phase == RunPhase::Running
            && !self.exhausted
            && self.stop_at.is_none_or(|stop| self.cursor < stop)
    }

    /// Returns true if the stop index, or the last representable index, has
    /// been reached.
    pub fn reached_bound(&self) -> bool {
        self.exhausted || self.stop_at.is_some_and(|stop| self.cursor >= stop)
    }

    /// Records that the ledger at the cursor was fully written with
    /// `transactions` transactions, and advances the cursor by one. Completing
    /// `u64::MAX` ends the run instead.
    pub fn complete(&mut self, transactions: usize) {
        self.last_completed = Some(self.cursor);
        match self.cursor.0.checked_add(1) {
            Some(next) => self.cursor = LedgerIndex(next),
            None => self.exhausted = true,
        }
        self.ledgers_written += 1;
        self.transactions_written += transactions as u64;
    }

    /// Running -> StopRequested. No-op in any other phase.
    pub fn request_stop(&mut self) {
        if self.phase == RunPhase::Running {
            self.phase = RunPhase::StopRequested;
        }
    }

    /// Any phase -> Stopped.
    pub fn stop(&mut self) {
        self.phase = RunPhase::Stopped;
    }

    /// The index the next run should start from, if anything completed.
    pub fn resume_index(&self) -> Option<LedgerIndex> {
        self.last_completed.map(LedgerIndex::next)
    }
}
