//! Ledger source error types.
//!
//! Errors are categorized because callers treat them differently:
//!
//! - **Timeout**: a request exceeded its bound. Never retried; aborts the run.
//! - **Protocol**: the node answered, but with an error frame or a payload
//!   that does not have the expected shape. Dropped on the per-transaction
//!   fan-out, fatal everywhere else.
//! - **Closed**: the shared connection is gone, usually because shutdown
//!   closed it while a request was in flight.
//! - **Connection**: the transport itself failed (handshake, socket error).

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The kind of ledger source error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The request did not complete within the request timeout.
    Timeout,

    /// The node rejected the request or returned a malformed payload.
    Protocol,

    /// The connection was closed before a response arrived.
    Closed,

    /// The transport failed.
    Connection,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceErrorKind::Timeout => "timeout",
            SourceErrorKind::Protocol => "protocol error",
            SourceErrorKind::Closed => "connection closed",
            SourceErrorKind::Connection => "connection error",
        };
        f.write_str(name)
    }
}

/// An error from the ledger source.
#[derive(Debug, Error)]
pub struct SourceError {
    /// The category of the failure.
    pub kind: SourceErrorKind,

    /// The node command that failed (`ledger`, `tx`), or `connect`.
    pub command: &'static str,

    /// A human-readable description.
    pub message: String,

    /// The underlying transport error, if any.
    #[source]
    pub source: Option<tungstenite::Error>,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ledger source {} on `{}`: {}",
            self.kind, self.command, self.message
        )
    }
}

impl SourceError {
    fn new(kind: SourceErrorKind, command: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            command,
            message: message.into(),
            source: None,
        }
    }

    /// A request that exceeded `after`.
    pub fn timeout(command: &'static str, after: Duration) -> Self {
        Self::new(
            SourceErrorKind::Timeout,
            command,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    /// A malformed response.
    pub fn protocol(command: &'static str, message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Protocol, command, message)
    }

    /// An error frame from the node (e.g. `txnNotFound`, `lgrNotFound`).
    pub fn rejected(command: &'static str, error: &str, detail: Option<&str>) -> Self {
        let message = match detail {
            Some(detail) => format!("node rejected request: {error} ({detail})"),
            None => format!("node rejected request: {error}"),
        };
        Self::new(SourceErrorKind::Protocol, command, message)
    }

    /// The connection closed before a response arrived.
    pub fn closed(command: &'static str) -> Self {
        Self::new(
            SourceErrorKind::Closed,
            command,
            "connection closed before a response arrived",
        )
    }

    /// A transport failure.
    pub fn connection(message: impl Into<String>, source: tungstenite::Error) -> Self {
        Self {
            kind: SourceErrorKind::Connection,
            command: "connect",
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true for node rejections and malformed payloads.
    pub fn is_protocol(&self) -> bool {
        self.kind == SourceErrorKind::Protocol
    }

    /// Returns true if the failure is a consequence of the connection going away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Closed | SourceErrorKind::Connection
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_command_and_message() {
        let err = SourceError::timeout("ledger", Duration::from_secs(10));
        assert_eq!(
            err.to_string(),
            "ledger source timeout on `ledger`: no response within 10000ms"
        );
    }

    #[test]
    fn rejected_is_a_protocol_error() {
        let err = SourceError::rejected("tx", "txnNotFound", Some("Transaction not found."));
        assert!(err.is_protocol());
        assert!(!err.is_disconnect());
        assert!(err.message.contains("txnNotFound"));
        assert!(err.message.contains("Transaction not found."));
    }

    #[test]
    fn closed_is_a_disconnect() {
        let err = SourceError::closed("ledger");
        assert!(err.is_disconnect());
        assert!(!err.is_protocol());
    }

    #[test]
    fn timeout_is_neither_protocol_nor_disconnect() {
        let err = SourceError::timeout("tx", Duration::from_millis(5));
        assert!(!err.is_protocol());
        assert!(!err.is_disconnect());
    }
}
