//! Ingestion error types.

use thiserror::Error;

use crate::mapper::MapError;
use crate::sink::SinkError;
use crate::source::SourceError;
use crate::types::LedgerIndex;

/// A failure that aborted the ingestion of one ledger.
///
/// Every variant names the ledger that was being ingested. Nothing before it
/// is affected; the ledger itself may have a committed ledger record without
/// its transactions.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ledger {index}: {source}")]
    Source {
        index: LedgerIndex,
        #[source]
        source: SourceError,
    },

    #[error("ledger {index}: {source}")]
    Map {
        index: LedgerIndex,
        #[source]
        source: MapError,
    },

    #[error("ledger {index}: {source}")]
    Sink {
        index: LedgerIndex,
        #[source]
        source: SinkError,
    },
}

impl IngestError {
    /// The ledger whose ingestion failed.
    pub fn index(&self) -> LedgerIndex {
        match self {
            IngestError::Source { index, .. }
            | IngestError::Map { index, .. }
            | IngestError::Sink { index, .. } => *index,
        }
    }

    /// Returns true if the failure came from losing the source connection.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, IngestError::Source { source, .. } if source.is_disconnect())
    }
}
