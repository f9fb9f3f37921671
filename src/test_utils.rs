//! Shared test doubles and arbitrary generators for property-based testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::effects::{LedgerSource, SourceRequest};
use crate::sink::{Collection, DocumentStore, SinkError, WriteTransaction};
use crate::source::SourceError;
use crate::types::{LedgerIndex, TxHash};

/// A canned reply from [`MockLedgerSource`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Ok(Value),
    /// An error frame with this error code.
    Rejected(&'static str),
    Timeout,
    /// The connection went away before a response arrived.
    Closed,
}

impl MockReply {
    fn resolve(&self, command: &'static str) -> Result<Value, SourceError> {
        match self {
            MockReply::Ok(value) => Ok(value.clone()),
            MockReply::Rejected(error) => Err(SourceError::rejected(command, error, None)),
            MockReply::Timeout => Err(SourceError::timeout(command, Duration::from_secs(10))),
            MockReply::Closed => Err(SourceError::closed(command)),
        }
    }
}

/// A scripted ledger source. Unscripted ledgers answer `lgrNotFound` and
/// unscripted transactions `txnNotFound`.
#[derive(Debug, Default)]
pub struct MockLedgerSource {
    headers: HashMap<LedgerIndex, MockReply>,
    expanded: HashMap<LedgerIndex, MockReply>,
    transactions: HashMap<TxHash, MockReply>,
    cancel_on_header: HashMap<LedgerIndex, CancellationToken>,
    requests: Mutex<Vec<SourceRequest>>,
}

impl MockLedgerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts ledger `index` with content hash `hash` and the given
    /// transaction hashes. The header carries the transport envelope.
    pub fn with_ledger(self, index: LedgerIndex, hash: &str, tx_hashes: &[&str]) -> Self {
        let header = ledger_header(index, hash, tx_hashes);
        self.with_header(index, MockReply::Ok(header))
    }

    pub fn with_header(mut self, index: LedgerIndex, reply: MockReply) -> Self {
        self.headers.insert(index, reply);
        self
    }

    /// Scripts the expanded fetch of ledger `index`.
    pub fn with_expanded(self, index: LedgerIndex, transactions: Vec<Value>) -> Self {
        let response = json!({
            "ledger": {"transactions": transactions},
            "ledger_index": index.0,
            "validated": true,
            "__command": "ledger",
            "__replyMs": 40,
        });
        self.with_expanded_reply(index, MockReply::Ok(response))
    }

    pub fn with_expanded_reply(mut self, index: LedgerIndex, reply: MockReply) -> Self {
        self.expanded.insert(index, reply);
        self
    }

    pub fn with_transaction(mut self, hash: &str, reply: MockReply) -> Self {
        self.transactions.insert(TxHash::new(hash), reply);
        self
    }

    /// Cancels `token` when the header of `index` is requested, the way a
    /// signal arriving mid-iteration would.
    pub fn cancel_on_header(mut self, index: LedgerIndex, token: CancellationToken) -> Self {
        self.cancel_on_header.insert(index, token);
        self
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<SourceRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn reply(&self, request: &SourceRequest) -> Result<Value, SourceError> {
        let command = request.command();
        match request {
            SourceRequest::Ledger {
                ledger_index,
                expand: false,
                ..
            } => {
                if let Some(token) = self.cancel_on_header.get(ledger_index) {
                    token.cancel();
                }
                self.headers
                    .get(ledger_index)
                    .map_or_else(|| not_found(command, "lgrNotFound"), |r| r.resolve(command))
            }
            SourceRequest::Ledger {
                ledger_index,
                expand: true,
                ..
            } => self
                .expanded
                .get(ledger_index)
                .map_or_else(|| not_found(command, "lgrNotFound"), |r| r.resolve(command)),
            SourceRequest::Tx { transaction } => self
                .transactions
                .get(transaction)
                .map_or_else(|| not_found(command, "txnNotFound"), |r| r.resolve(command)),
        }
    }
}

fn not_found(command: &'static str, error: &'static str) -> Result<Value, SourceError> {
    Err(SourceError::rejected(command, error, None))
}

impl LedgerSource for MockLedgerSource {
    async fn send(&self, request: SourceRequest) -> Result<Value, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        // Let concurrent fetches interleave like they would on a socket.
        tokio::task::yield_now().await;
        self.reply(&request)
    }
}

/// A ledger header response as the source adapter returns it.
pub fn ledger_header(index: LedgerIndex, hash: &str, tx_hashes: &[&str]) -> Value {
    json!({
        "ledger": {
            "ledger_hash": hash,
            "ledger_index": index.to_string(),
            "closed": true,
            "transactions": tx_hashes,
        },
        "ledger_hash": hash,
        "ledger_index": index.0,
        "validated": true,
        "__command": "ledger",
        "__replyMs": 25,
    })
}

/// A settled `tx` response for `hash`.
pub fn settled_tx(hash: &str) -> Value {
    json!({
        "hash": hash,
        "TransactionType": "Payment",
        "Account": "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh",
        "meta": {"TransactionResult": "tesSUCCESS", "AffectedNodes": []},
        "validated": true,
        "__command": "tx",
        "__replyMs": 8,
    })
}

/// The step at which a [`MemoryStore`] write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Open,
    Create,
    Commit,
}

/// A batch that reached storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedBatch {
    pub collection: Collection,
    pub records: Vec<Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    opened: Vec<Collection>,
    committed: Vec<CommittedBatch>,
    failure: Option<(Collection, FailAt)>,
    next_id: u64,
}

/// An in-memory document store. Records become visible only on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// A store whose writes to `collection` fail at step `at`.
    pub fn failing(collection: Collection, at: FailAt) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().failure = Some((collection, at));
        store
    }

    /// Collections a write transaction was opened on, in order.
    pub fn opened(&self) -> Vec<Collection> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn committed(&self) -> Vec<CommittedBatch> {
        self.state.lock().unwrap().committed.clone()
    }

    /// Every committed record in `collection`.
    pub fn records(&self, collection: Collection) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .committed
            .iter()
            .filter(|batch| batch.collection == collection)
            .flat_map(|batch| batch.records.iter().cloned())
            .collect()
    }

    fn fails(&self, collection: Collection, at: FailAt) -> bool {
        self.state.lock().unwrap().failure == Some((collection, at))
    }
}

impl DocumentStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn open_write_transaction(
        &self,
        collection: Collection,
    ) -> Result<MemoryTransaction, SinkError> {
        if self.fails(collection, FailAt::Open) {
            return Err(SinkError::Open {
                collection,
                message: "store unavailable".to_string(),
            });
        }
        self.state.lock().unwrap().opened.push(collection);
        Ok(MemoryTransaction {
            store: self.clone(),
            collection,
            staged: Vec::new(),
        })
    }
}

/// An open [`MemoryStore`] transaction.
#[derive(Debug)]
pub struct MemoryTransaction {
    store: MemoryStore,
    collection: Collection,
    staged: Vec<Value>,
}

impl WriteTransaction for MemoryTransaction {
    async fn create(&mut self, records: Vec<Value>) -> Result<Vec<String>, SinkError> {
        if self.store.fails(self.collection, FailAt::Create) {
            return Err(SinkError::Create {
                collection: self.collection,
                count: records.len(),
                message: "rejected".to_string(),
            });
        }
        let mut state = self.store.state.lock().unwrap();
        let ids = records
            .iter()
            .map(|_| {
                state.next_id += 1;
                format!("inst-{}", state.next_id)
            })
            .collect();
        self.staged.extend(records);
        Ok(ids)
    }

    async fn commit(self) -> Result<(), SinkError> {
        if self.store.fails(self.collection, FailAt::Commit) {
            return Err(SinkError::Commit {
                collection: self.collection,
                message: "conflict".to_string(),
            });
        }
        self.store.state.lock().unwrap().committed.push(CommittedBatch {
            collection: self.collection,
            records: self.staged,
        });
        Ok(())
    }
}

pub fn arb_ledger_hash() -> impl Strategy<Value = String> {
    "[0-9A-F]{64}".prop_map(String::from)
}

fn arb_json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u32>().prop_map(Value::from),
        "[a-zA-Z0-9]{0,16}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// A ledger header payload: always a `ledger_hash`, sometimes the transport
/// envelope, plus arbitrary other fields.
pub fn arb_ledger_payload() -> impl Strategy<Value = Map<String, Value>> {
    (
        arb_ledger_hash(),
        any::<bool>(),
        prop::collection::btree_map("[a-z]{1,12}", arb_json_leaf(), 0..8),
    )
        .prop_map(|(hash, with_envelope, extra)| {
            let mut raw: Map<String, Value> = extra.into_iter().collect();
            raw.insert("ledger_hash".into(), Value::from(hash));
            if with_envelope {
                raw.insert("__command".into(), json!("ledger"));
                raw.insert("__replyMs".into(), json!(31));
            }
            raw
        })
}
