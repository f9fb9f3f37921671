//! Core domain types for ledger replication.

pub mod ids;
pub mod records;

pub use ids::{LedgerHash, LedgerIndex, TxHash};
pub use records::{LedgerRecord, TransactionRecord};
