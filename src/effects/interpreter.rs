//! The ledger source trait.
//!
//! Implementations:
//! - [`crate::source::WsLedgerClient`]: rippled over a single WebSocket
//! - `MockLedgerSource` in the test utilities: scripted responses
//!
//! # Example (mock for testing)
//!
//! ```ignore
//! struct CannedSource {
//!     responses: HashMap<SourceRequest, Value>,
//! }
//!
//! impl LedgerSource for CannedSource {
//!     async fn send(&self, request: SourceRequest) -> Result<Value, SourceError> {
//!         self.responses
//!             .get(&request)
//!             .cloned()
//!             .ok_or_else(|| SourceError::protocol(request.command(), "no canned response"))
//!     }
//! }
//! ```

use std::future::Future;

use serde_json::Value;

use super::source::SourceRequest;
use crate::source::SourceError;

/// Executes [`SourceRequest`]s against a ledger node.
///
/// A successful response is the node's result object with the transport
/// envelope fields attached (see [`crate::mapper::ENVELOPE_FIELDS`]). Each
/// call completes or fails within the implementation's request timeout.
///
/// `send` takes `&self` so that many requests can be in flight on the same
/// connection at once.
pub trait LedgerSource: Sync {
    /// Execute one request and return its response payload.
    fn send(
        &self,
        request: SourceRequest,
    ) -> impl Future<Output = Result<Value, SourceError>> + Send;
}
