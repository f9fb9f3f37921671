//! Transaction resolution strategy.
//!
//! A ledger header lists its transactions by hash. How they are resolved
//! depends on how many there are:
//!
//! - none: nothing to fetch
//! - up to [`EXPANDED_FETCH_LIMIT`]: re-fetch the ledger with transactions
//!   expanded inline, one round trip, entries taken as-is
//! - more: the node's expanded response becomes unreliable at that size, so
//!   every hash is fetched on its own, concurrently, and entries that did not
//!   settle are dropped
//!
//! The per-hash path scatters all requests at once and gathers every result
//! before filtering. Its output order is unspecified.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::effects::LedgerSource;
use crate::source::{SourceError, fetch_expanded, fetch_transaction};
use crate::types::{LedgerIndex, TxHash};

/// Largest ledger resolved with a single expanded fetch.
pub const EXPANDED_FETCH_LIMIT: usize = 200;

/// How a ledger's transactions will be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    /// No transactions; no request.
    Empty,
    /// One expanded ledger fetch.
    Expanded,
    /// One fetch per hash.
    PerHash,
}

impl ResolutionPath {
    /// Picks the path for a ledger with `count` transactions.
    pub fn for_count(count: usize) -> Self {
        match count {
            0 => ResolutionPath::Empty,
            n if n <= EXPANDED_FETCH_LIMIT => ResolutionPath::Expanded,
            _ => ResolutionPath::PerHash,
        }
    }
}

/// Resolves the transactions of ledger `index` from their `hashes`.
///
/// Timeouts and connection failures propagate on both paths. On the
/// per-hash path, node rejections and unsettled entries are dropped.
#[instrument(skip(source, hashes), fields(ledger_index = %index, count = hashes.len()))]
pub async fn resolve_transactions<S: LedgerSource>(
    source: &S,
    index: LedgerIndex,
    hashes: &[TxHash],
) -> Result<Vec<Value>, SourceError> {
    match ResolutionPath::for_count(hashes.len()) {
        ResolutionPath::Empty => Ok(Vec::new()),
        ResolutionPath::Expanded => fetch_expanded(source, index).await,
        ResolutionPath::PerHash => {
            info!("Many transactions, resolving per hash");
            resolve_individually(source, hashes).await
        }
    }
}

async fn resolve_individually<S: LedgerSource>(
    source: &S,
    hashes: &[TxHash],
) -> Result<Vec<Value>, SourceError> {
    let results = join_all(
        hashes
            .iter()
            .cloned()
            .map(|hash| fetch_transaction(source, hash)),
    )
    .await;

    let mut settled = Vec::with_capacity(results.len());
    let mut dropped = 0usize;
    for result in results {
        match result {
            Ok(transaction) if is_settled(&transaction) => settled.push(transaction),
            Ok(_) => dropped += 1,
            Err(e) if e.is_protocol() => {
                debug!(error = %e, "Dropping unresolvable transaction");
                dropped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    debug!(settled = settled.len(), dropped, "Resolved transactions per hash");
    Ok(settled)
}

/// Returns true if a `tx` response describes a settled transaction: no
/// error field, a metadata object, and an engine result code in it.
pub fn is_settled(transaction: &Value) -> bool {
    if transaction.get("error").is_some() {
        return false;
    }
    transaction
        .get("meta")
        .or_else(|| transaction.get("metaData"))
        .and_then(Value::as_object)
        .is_some_and(|meta| meta.contains_key("TransactionResult"))
}
