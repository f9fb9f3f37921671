//! Ledger node request types.
//!
//! Each variant serializes to the JSON body of the matching rippled WebSocket
//! command (without the correlation `id`, which the transport assigns).

use serde::{Deserialize, Serialize};

use crate::types::{LedgerIndex, TxHash};

/// A request against the ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SourceRequest {
    /// Fetch one ledger.
    ///
    /// With `expand: false` the ledger lists its transactions as hashes; with
    /// `expand: true` the transactions are inlined with their metadata.
    Ledger {
        ledger_index: LedgerIndex,
        transactions: bool,
        expand: bool,
    },

    /// Fetch one transaction by hash.
    Tx { transaction: TxHash },
}

impl SourceRequest {
    /// A ledger header with its transaction hash list.
    pub fn header(index: LedgerIndex) -> Self {
        SourceRequest::Ledger {
            ledger_index: index,
            transactions: true,
            expand: false,
        }
    }

    /// A ledger with every transaction expanded inline.
    pub fn expanded(index: LedgerIndex) -> Self {
        SourceRequest::Ledger {
            ledger_index: index,
            transactions: true,
            expand: true,
        }
    }

    /// A single transaction.
    pub fn transaction(hash: TxHash) -> Self {
        SourceRequest::Tx { transaction: hash }
    }

    /// The node command name this request maps to.
    pub fn command(&self) -> &'static str {
        match self {
            SourceRequest::Ledger { .. } => "ledger",
            SourceRequest::Tx { .. } => "tx",
        }
    }
}
