//! Writes ledger and transaction records, one transaction per batch.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::error::SinkError;
use super::store::{Collection, DocumentStore, WriteTransaction};
use crate::types::{LedgerRecord, TransactionRecord};

/// The record sink used by the ingestion loop.
///
/// Each write opens one transaction on its collection, creates every record
/// as a single batch, then commits. An empty write opens nothing. Failures
/// propagate without retry.
#[derive(Debug, Clone)]
pub struct RecordSink<D> {
    store: D,
}

impl<D: DocumentStore> RecordSink<D> {
    pub fn new(store: D) -> Self {
        Self { store }
    }

    /// Writes one ledger record to `ledgers`.
    pub async fn write_ledger(&self, record: &LedgerRecord) -> Result<(), SinkError> {
        self.write(Collection::Ledgers, std::slice::from_ref(record))
            .await
            .map(|_| ())
    }

    /// Writes a ledger's transactions to `transactions`. Returns how many were written.
    pub async fn write_transactions(
        &self,
        records: &[TransactionRecord],
    ) -> Result<usize, SinkError> {
        self.write(Collection::Transactions, records).await
    }

    async fn write<T>(&self, collection: Collection, records: &[T]) -> Result<usize, SinkError>
    where
        T: Serialize + Sync,
    {
        if records.is_empty() {
            trace!(%collection, "Nothing to write");
            return Ok(0);
        }

        let documents = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|source| SinkError::Serialize { collection, source })?;

        let mut transaction = self.store.open_write_transaction(collection).await?;
        let ids = transaction.create(documents).await?;
        transaction.commit().await?;

        debug!(%collection, count = ids.len(), "Committed records");
        Ok(ids.len())
    }
}
