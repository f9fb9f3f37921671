//! Newtype wrappers for ledger identifiers.
//!
//! These types keep ledger positions and the two kinds of content hash apart
//! (a `TxHash` cannot be passed where a `LedgerHash` is expected) and make
//! the ingestion code self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the ledger chain.
///
/// Indices are strictly increasing during a run. The derived ordering matches
/// the chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerIndex(pub u64);

impl LedgerIndex {
    /// The earliest ledger with retrievable history on public full-history nodes.
    pub const HISTORICAL_FLOOR: LedgerIndex = LedgerIndex(32570);

    /// Returns the index immediately after this one. Saturates at `u64::MAX`;
    /// the run state stops ingesting once that index is completed.
    pub fn next(self) -> LedgerIndex {
        LedgerIndex(self.0.saturating_add(1))
    }
}

impl fmt::Display for LedgerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LedgerIndex {
    fn from(n: u64) -> Self {
        LedgerIndex(n)
    }
}

/// The content hash of a ledger. Used as the primary key of ledger records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerHash(pub String);

impl LedgerHash {
    pub fn new(s: impl Into<String>) -> Self {
        LedgerHash(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LedgerHash {
    fn from(s: &str) -> Self {
        LedgerHash(s.to_string())
    }
}

/// The hash of a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(s: impl Into<String>) -> Self {
        TxHash(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short (8-character) prefix for log output.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TxHash {
    fn from(s: String) -> Self {
        TxHash(s)
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        TxHash(s.to_string())
    }
}
