//! Typed fetch operations on top of [`LedgerSource`].

use serde_json::{Map, Value};
use tracing::trace;

use super::error::SourceError;
use crate::effects::{LedgerSource, SourceRequest};
use crate::types::{LedgerIndex, TxHash};

/// A ledger header response: the ledger with its transactions as hashes.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerHeader {
    raw: Map<String, Value>,
}

impl LedgerHeader {
    /// Validates the shape of a `ledger` response.
    pub fn from_response(response: Value) -> Result<Self, SourceError> {
        match response {
            Value::Object(raw) if raw.get("ledger").is_some_and(Value::is_object) => {
                Ok(Self { raw })
            }
            _ => Err(SourceError::protocol(
                "ledger",
                "response has no ledger object",
            )),
        }
    }

    /// The hashes of the ledger's transactions. A ledger without a
    /// transaction list has none.
    pub fn transaction_hashes(&self) -> Result<Vec<TxHash>, SourceError> {
        let Some(list) = self
            .raw
            .get("ledger")
            .and_then(|ledger| ledger.get("transactions"))
        else {
            return Ok(Vec::new());
        };
        let list = list
            .as_array()
            .ok_or_else(|| SourceError::protocol("ledger", "transactions is not a list"))?;

        list.iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(TxHash::from)
                    .ok_or_else(|| SourceError::protocol("ledger", "transaction hash is not a string"))
            })
            .collect()
    }

    pub fn into_raw(self) -> Map<String, Value> {
        self.raw
    }
}

/// Fetches the header of ledger `index`.
pub async fn fetch_header<S: LedgerSource>(
    source: &S,
    index: LedgerIndex,
) -> Result<LedgerHeader, SourceError> {
    trace!(ledger_index = %index, "Fetching ledger header");
    let response = source.send(SourceRequest::header(index)).await?;
    LedgerHeader::from_response(response)
}

/// Fetches ledger `index` with transactions expanded and returns them.
pub async fn fetch_expanded<S: LedgerSource>(
    source: &S,
    index: LedgerIndex,
) -> Result<Vec<Value>, SourceError> {
    trace!(ledger_index = %index, "Fetching expanded ledger");
    let response = source.send(SourceRequest::expanded(index)).await?;
    match response
        .get("ledger")
        .and_then(|ledger| ledger.get("transactions"))
    {
        Some(Value::Array(transactions)) => Ok(transactions.clone()),
        None => Ok(Vec::new()),
        Some(_) => Err(SourceError::protocol(
            "ledger",
            "expanded transactions is not a list",
        )),
    }
}

/// Fetches one transaction by hash.
pub async fn fetch_transaction<S: LedgerSource>(
    source: &S,
    hash: TxHash,
) -> Result<Value, SourceError> {
    trace!(hash = %hash.short(), "Fetching transaction");
    source.send(SourceRequest::transaction(hash)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_exposes_hashes() {
        let header = LedgerHeader::from_response(json!({
            "ledger_hash": "ABCD",
            "ledger": {"transactions": ["T1", "T2"]}
        }))
        .unwrap();

        assert_eq!(
            header.transaction_hashes().unwrap(),
            vec![TxHash::new("T1"), TxHash::new("T2")]
        );
    }

    #[test]
    fn header_without_transaction_list_has_no_hashes() {
        let header = LedgerHeader::from_response(json!({"ledger": {}})).unwrap();
        assert!(header.transaction_hashes().unwrap().is_empty());
    }

    #[test]
    fn header_without_ledger_object_is_rejected() {
        let err = LedgerHeader::from_response(json!({"ledger_hash": "ABCD"})).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn non_string_hash_is_rejected() {
        let header =
            LedgerHeader::from_response(json!({"ledger": {"transactions": [{"hash": "T1"}]}}))
                .unwrap();
        assert!(header.transaction_hashes().unwrap_err().is_protocol());
    }
}
