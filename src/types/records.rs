//! Storage-ready records.
//!
//! Both record types keep the node's payload as an open JSON object: the
//! ledger schema is owned by the node, and records are copied structurally
//! rather than validated. The only field the pipeline owns is the storage
//! primary key, serialized as `_id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{LedgerHash, TxHash};

/// The normalized header of one ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// The ledger content hash, used as the storage primary key.
    #[serde(rename = "_id")]
    pub id: LedgerHash,

    /// Every header field the node returned, minus the transport envelope.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One settled transaction belonging to a ledger, with its execution metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The transaction hash, when the node supplied one.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TxHash>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TransactionRecord {
    /// Returns the engine result code (e.g. `tesSUCCESS`) if present.
    pub fn result_code(&self) -> Option<&str> {
        self.fields
            .get("metaData")
            .and_then(|meta| meta.get("TransactionResult"))
            .and_then(Value::as_str)
    }
}
