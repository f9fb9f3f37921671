//! Conversion of raw node payloads into storage records.
//!
//! The mapper is pure: it copies fields structurally, removes the transport
//! envelope the source adapter attaches to every response, and assigns the
//! storage primary key. Mapping the same payload twice yields identical
//! records.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{LedgerHash, LedgerRecord, TransactionRecord, TxHash};

/// Field the source adapter uses to echo the command a response answers.
pub const COMMAND_ECHO_FIELD: &str = "__command";

/// Field the source adapter uses to report the request round trip in milliseconds.
pub const REPLY_MS_FIELD: &str = "__replyMs";

/// Transport-envelope fields. These never reach storage.
pub const ENVELOPE_FIELDS: [&str; 2] = [COMMAND_ECHO_FIELD, REPLY_MS_FIELD];

/// Errors raised while mapping a payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    /// The ledger payload has no string `ledger_hash`.
    #[error("ledger payload has no ledger_hash")]
    MissingLedgerHash,

    /// A transaction entry is not a JSON object.
    #[error("transaction entry is not an object: {0}")]
    NotAnObject(String),
}

/// Maps a ledger header response into a [`LedgerRecord`].
///
/// `id` is set to the ledger's content hash; every other field, including
/// `ledger_hash` itself, is kept unchanged.
pub fn map_ledger(mut raw: Map<String, Value>) -> Result<LedgerRecord, MapError> {
    strip_envelope(&mut raw);
    let id = raw
        .get("ledger_hash")
        .and_then(Value::as_str)
        .map(LedgerHash::from)
        .ok_or(MapError::MissingLedgerHash)?;

    Ok(LedgerRecord { id, fields: raw })
}

/// Maps one resolved transaction into a [`TransactionRecord`].
///
/// Expanded ledgers deliver execution metadata as `metaData` while `tx`
/// responses deliver it as `meta`; records always carry `metaData`.
pub fn map_transaction(raw: Value) -> Result<TransactionRecord, MapError> {
    let mut fields = match raw {
        Value::Object(fields) => fields,
        other => return Err(MapError::NotAnObject(other.to_string())),
    };
    strip_envelope(&mut fields);

    if !fields.contains_key("metaData")
        && let Some(meta) = fields.get("meta").cloned()
    {
        fields.insert("metaData".to_string(), meta);
    }

    let id = fields.get("hash").and_then(Value::as_str).map(TxHash::from);
    Ok(TransactionRecord { id, fields })
}

fn strip_envelope(fields: &mut Map<String, Value>) {
    for field in ENVELOPE_FIELDS {
        fields.remove(field);
    }
}
