//! Document store traits.
//!
//! A store hands out write transactions scoped to one collection. Records are
//! staged with `create` and become visible on `commit`; dropping a
//! transaction without committing discards it.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SinkError;

/// The collections the pipeline writes to. Fixed by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Ledgers,
    Transactions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Ledgers => "ledgers",
            Collection::Transactions => "transactions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document store that supports collection-scoped write transactions.
pub trait DocumentStore: Sync {
    /// The write transaction handle.
    type Transaction: WriteTransaction + Send;

    /// Opens a write transaction on `collection`.
    fn open_write_transaction(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Self::Transaction, SinkError>> + Send;
}

/// An open write transaction.
pub trait WriteTransaction: Sized {
    /// Stages `records` and returns the identifiers the store assigned.
    fn create(
        &mut self,
        records: Vec<Value>,
    ) -> impl Future<Output = Result<Vec<String>, SinkError>> + Send;

    /// Makes every staged record visible.
    fn commit(self) -> impl Future<Output = Result<(), SinkError>> + Send;
}
