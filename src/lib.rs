//! Ledger Sync - replicates XRP Ledger history into a document store.
//!
//! Ledgers are ingested one at a time in increasing index order: the header
//! is fetched from a full-history node over WebSocket, written to the
//! `ledgers` collection, and its transactions are resolved and written to the
//! `transactions` collection before the next index starts.

pub mod config;
pub mod effects;
pub mod ingest;
pub mod mapper;
pub mod resolve;
pub mod sink;
pub mod source;
pub mod types;

#[cfg(test)]
mod test_utils;
