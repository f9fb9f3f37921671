//! Record sink error types.

use thiserror::Error;

use super::store::Collection;

/// Errors from writing records to the document store.
///
/// None of these are retried; they propagate to the ingestion loop.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Opening the write transaction failed.
    #[error("failed to open write transaction on `{collection}`: {message}")]
    Open {
        collection: Collection,
        message: String,
    },

    /// Inserting records into an open transaction failed.
    #[error("failed to create {count} record(s) in `{collection}`: {message}")]
    Create {
        collection: Collection,
        count: usize,
        message: String,
    },

    /// Committing the transaction failed. Nothing from it is visible.
    #[error("failed to commit write transaction on `{collection}`: {message}")]
    Commit {
        collection: Collection,
        message: String,
    },

    /// A record could not be serialized.
    #[error("failed to serialize record for `{collection}`: {source}")]
    Serialize {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    /// The hub rejected our credentials.
    #[error("hub authentication failed: {0}")]
    Auth(#[from] super::auth::AuthError),
}

impl SinkError {
    /// The collection the failed write targeted, if any.
    pub fn collection(&self) -> Option<Collection> {
        match self {
            SinkError::Open { collection, .. }
            | SinkError::Create { collection, .. }
            | SinkError::Commit { collection, .. }
            | SinkError::Serialize { collection, .. } => Some(*collection),
            SinkError::Auth(_) => None,
        }
    }
}
