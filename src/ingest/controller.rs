//! The ingestion loop.
//!
//! One ledger at a time, in strictly increasing order. Each iteration fetches
//! the header at the cursor, writes the ledger record, resolves and writes its
//! transactions, and only then advances. No two indices ever overlap.
//!
//! Shutdown is observed at the top of each iteration. The signal path only
//! cancels the token; the source connection watches the same token and
//! closes, so a request in flight at that moment may fail. That failure ends
//! the run quietly instead of as an error.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::IngestError;
use super::state::RunState;
use crate::effects::LedgerSource;
use crate::mapper::{map_ledger, map_transaction};
use crate::resolve::resolve_transactions;
use crate::sink::{DocumentStore, RecordSink};
use crate::source::fetch_header;
use crate::types::{LedgerIndex, TransactionRecord};

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled.
    Shutdown,
    /// The cursor reached the configured stop index.
    Bound,
}

/// What a finished run accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub start: LedgerIndex,
    pub last_completed: Option<LedgerIndex>,
    /// Where the next run should start. `None` if nothing completed.
    pub resume_index: Option<LedgerIndex>,
    pub ledgers_written: u64,
    pub transactions_written: u64,
    pub reason: StopReason,
}

/// Drives ingestion from a ledger source into a record sink.
pub struct IngestController<S, D> {
    source: S,
    sink: RecordSink<D>,
    state: RunState,
    shutdown: CancellationToken,
}

impl<S, D> IngestController<S, D>
where
    S: LedgerSource,
    D: DocumentStore,
{
    pub fn new(
        source: S,
        sink: RecordSink<D>,
        state: RunState,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            sink,
            state,
            shutdown,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs until shutdown, the stop index, or the first failure.
    ///
    /// On failure the state still reports the last completed ledger, so the
    /// caller can print where to resume.
    #[instrument(skip(self), fields(start = %self.state.start()))]
    pub async fn run(&mut self) -> Result<RunSummary, IngestError> {
        info!(stop_at = ?self.state.stop_at(), "Ingestion started");

        loop {
            if self.shutdown.is_cancelled() {
                self.state.request_stop();
            }
            if !self.state.can_advance() {
                break;
            }

            let index = self.state.cursor();
            match self.ingest_ledger(index).await {
                Ok(written) => self.state.complete(written),
                Err(e) if e.is_disconnect() && self.shutdown.is_cancelled() => {
                    warn!(ledger_index = %index, error = %e, "Shutdown interrupted ledger, abandoning it");
                    self.state.request_stop();
                    break;
                }
                Err(e) => {
                    error!(ledger_index = %e.index(), error = %e, "Ingestion failed");
                    self.state.stop();
                    return Err(e);
                }
            }
        }

        let reason = if self.state.reached_bound() {
            StopReason::Bound
        } else {
            StopReason::Shutdown
        };
        self.state.stop();

        let summary = self.summary(reason);
        info!(
            ledgers = summary.ledgers_written,
            transactions = summary.transactions_written,
            last_completed = ?summary.last_completed,
            ?reason,
            "Ingestion stopped"
        );
        Ok(summary)
    }

    /// Ingests one ledger and returns how many transactions were written.
    #[instrument(skip(self), fields(ledger_index = %index))]
    async fn ingest_ledger(&self, index: LedgerIndex) -> Result<usize, IngestError> {
        let source_err = |source| IngestError::Source { index, source };
        let map_err = |source| IngestError::Map { index, source };
        let sink_err = |source| IngestError::Sink { index, source };

        let header = fetch_header(&self.source, index).await.map_err(source_err)?;
        let hashes = header.transaction_hashes().map_err(source_err)?;

        let ledger = map_ledger(header.into_raw()).map_err(map_err)?;
        self.sink.write_ledger(&ledger).await.map_err(sink_err)?;
        debug!(ledger_hash = %ledger.id, "Wrote ledger record");

        let resolved = resolve_transactions(&self.source, index, &hashes)
            .await
            .map_err(source_err)?;
        let records = resolved
            .into_iter()
            .map(map_transaction)
            .collect::<Result<Vec<TransactionRecord>, _>>()
            .map_err(map_err)?;
        let written = self
            .sink
            .write_transactions(&records)
            .await
            .map_err(sink_err)?;

        info!(
            ledger_hash = %ledger.id,
            transactions = written,
            "Ingested ledger"
        );
        Ok(written)
    }

    fn summary(&self, reason: StopReason) -> RunSummary {
        RunSummary {
            start: self.state.start(),
            last_completed: self.state.last_completed(),
            resume_index: self.state.resume_index(),
            ledgers_written: self.state.ledgers_written(),
            transactions_written: self.state.transactions_written(),
            reason,
        }
    }
}
