//! Ledger source adapter.
//!
//! This module provides the rippled WebSocket client that executes
//! [`SourceRequest`](crate::effects::SourceRequest)s, the categorized error
//! type shared by every source, and typed fetch helpers.
//!
//! Key properties:
//! - One connection, opened once and shared by every request
//! - Per-request timeout; timeouts are failures, never retried
//! - No reconnect; shutdown closes the connection immediately

mod client;
mod error;
mod fetch;

pub use client::{DEFAULT_REQUEST_TIMEOUT, WsLedgerClient};
pub use error::{SourceError, SourceErrorKind};
pub use fetch::{LedgerHeader, fetch_expanded, fetch_header, fetch_transaction};
