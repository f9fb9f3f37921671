//! rippled WebSocket client.
//!
//! `WsLedgerClient` owns the one long-lived connection to the node. Requests
//! are tagged with a numeric `id`; a background task writes outgoing frames
//! and routes each response back to the waiting caller by that `id`. Many
//! requests may be in flight at once.
//!
//! The connection is never re-established. Cancelling the shutdown token (or
//! calling [`WsLedgerClient::close`]) closes it immediately, and every request
//! still waiting fails with [`SourceErrorKind::Closed`](super::SourceErrorKind).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use super::error::SourceError;
use crate::effects::{LedgerSource, SourceRequest};
use crate::mapper::{COMMAND_ECHO_FIELD, REPLY_MS_FIELD};

/// Default bound on a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

static CRYPTO_PROVIDER: Once = Once::new();

fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        // Fails only if another provider is already the process default.
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }
    });
}

/// A ledger source backed by a single rippled WebSocket connection.
pub struct WsLedgerClient {
    /// The node endpoint, for logging.
    url: Url,

    /// Frames waiting to be written by the connection task.
    outgoing: mpsc::UnboundedSender<Message>,

    /// Callers waiting for a response, keyed by request id.
    pending: PendingMap,

    next_id: AtomicU64,

    /// Bound on each request.
    timeout: Duration,

    /// Cancelled when the connection is closed, for whatever reason.
    closed: CancellationToken,
}

impl WsLedgerClient {
    /// Connects to the node at `url`.
    ///
    /// The connection closes when `shutdown` is cancelled.
    #[instrument(skip(shutdown), fields(url = %url))]
    pub async fn connect(
        url: &Url,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Self, SourceError> {
        install_crypto_provider();

        let (stream, _response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| SourceError::timeout("connect", timeout))?
            .map_err(|e| SourceError::connection(format!("failed to connect to {url}"), e))?;

        info!("Connected to ledger node");
        Ok(Self::from_stream(url.clone(), stream, timeout, shutdown))
    }

    /// Wraps an established WebSocket stream and starts the connection task.
    pub fn from_stream<S>(
        url: Url,
        stream: WebSocketStream<S>,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, rx) = mpsc::unbounded_channel();
        let pending: PendingMap = Arc::default();
        let closed = shutdown.child_token();

        tokio::spawn(drive_connection(
            stream,
            rx,
            pending.clone(),
            closed.clone(),
        ));

        Self {
            url,
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            closed,
        }
    }

    /// Closes the connection. Requests in flight fail with a closed error.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns true once the connection is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

impl std::fmt::Debug for WsLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsLedgerClient")
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LedgerSource for WsLedgerClient {
    async fn send(&self, request: SourceRequest) -> Result<Value, SourceError> {
        let command = request.command();
        if self.is_closed() {
            return Err(SourceError::closed(command));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = encode_request(id, &request)?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        // The connection task may have cleared the map since the check above.
        if self.is_closed() {
            self.forget(id);
            return Err(SourceError::closed(command));
        }

        trace!(id, command, "Sending request");
        let started = Instant::now();
        if self.outgoing.send(Message::Text(frame)).is_err() {
            self.forget(id);
            return Err(SourceError::closed(command));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => {
                self.forget(id);
                Err(SourceError::timeout(command, self.timeout))
            }
            Ok(Err(_)) => Err(SourceError::closed(command)),
            Ok(Ok(response)) => decode_response(command, response, started.elapsed()),
        }
    }
}

/// Serializes a request with its correlation id.
fn encode_request(id: u64, request: &SourceRequest) -> Result<String, SourceError> {
    let mut body = serde_json::to_value(request)
        .map_err(|e| SourceError::protocol(request.command(), e.to_string()))?;
    if let Some(object) = body.as_object_mut() {
        object.insert("id".to_string(), Value::from(id));
    }
    Ok(body.to_string())
}

/// Turns a response frame into the payload returned to callers.
///
/// Error frames become protocol errors. Successful frames yield their
/// `result` object with the command echo and round trip attached.
pub(crate) fn decode_response(
    command: &'static str,
    response: Value,
    elapsed: Duration,
) -> Result<Value, SourceError> {
    let is_error = response.get("status").and_then(Value::as_str) == Some("error")
        || response.get("error").is_some();
    if is_error {
        let error = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let detail = response.get("error_message").and_then(Value::as_str);
        return Err(SourceError::rejected(command, error, detail));
    }

    let mut result: Map<String, Value> = match response.get("result") {
        Some(Value::Object(result)) => result.clone(),
        _ => return Err(SourceError::protocol(command, "response has no result object")),
    };

    result.insert(COMMAND_ECHO_FIELD.to_string(), Value::from(command));
    result.insert(
        REPLY_MS_FIELD.to_string(),
        Value::from(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
    );
    Ok(Value::Object(result))
}

/// Routes one inbound text frame to its waiting caller.
fn dispatch(pending: &PendingMap, text: &str) {
    let response: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Discarding unparseable frame from node");
            return;
        }
    };

    let Some(id) = response.get("id").and_then(Value::as_u64) else {
        trace!("Ignoring frame without request id");
        return;
    };

    let waiter = pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);
    match waiter {
        // The caller may have timed out and gone away.
        Some(tx) => {
            let _ = tx.send(response);
        }
        None => debug!(id, "Response arrived for a request nobody is waiting on"),
    }
}

/// Owns the socket: writes queued frames, reads and routes responses.
async fn drive_connection<S>(
    mut stream: WebSocketStream<S>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    pending: PendingMap,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                debug!("Closing ledger node connection");
                if let Err(e) = stream.close(None).await {
                    debug!(error = %e, "Error sending close frame");
                }
                break;
            }

            msg = outgoing.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = stream.send(msg).await {
                    warn!(error = %e, "Failed to write to ledger node");
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => dispatch(&pending, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Ledger node closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Ledger node connection failed");
                        break;
                    }
                }
            }
        }
    }

    closed.cancel();
    // Dropping the senders wakes every waiter with a closed error.
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceErrorKind;
    use crate::types::{LedgerIndex, TxHash};
    use serde_json::json;
    use tokio::net::TcpListener;

    // ─── Frame decoding ───

    #[test]
    fn decode_success_attaches_envelope() {
        let response = json!({
            "id": 1,
            "status": "success",
            "type": "response",
            "result": {"ledger_hash": "ABCD", "ledger_index": 32570}
        });

        let value = decode_response("ledger", response, Duration::from_millis(12)).unwrap();

        assert_eq!(value["ledger_hash"], json!("ABCD"));
        assert_eq!(value[COMMAND_ECHO_FIELD], json!("ledger"));
        assert_eq!(value[REPLY_MS_FIELD], json!(12));
        assert!(value.get("status").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn decode_error_frame_is_rejected() {
        let response = json!({
            "id": 2,
            "status": "error",
            "type": "response",
            "error": "txnNotFound",
            "error_message": "Transaction not found."
        });

        let err = decode_response("tx", response, Duration::ZERO).unwrap_err();

        assert_eq!(err.kind, SourceErrorKind::Protocol);
        assert_eq!(err.command, "tx");
        assert!(err.message.contains("txnNotFound"));
    }

    #[test]
    fn decode_without_result_is_protocol_error() {
        let err = decode_response("ledger", json!({"id": 3, "status": "success"}), Duration::ZERO)
            .unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn encode_adds_id() {
        let frame = encode_request(9, &SourceRequest::transaction(TxHash::new("AB"))).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"id": 9, "command": "tx", "transaction": "AB"}));
    }

    // ─── Against a local node ───

    /// Starts a WebSocket server that answers each request with `reply(request)`.
    /// A `None` reply leaves the request unanswered.
    async fn spawn_node<F>(reply: F) -> Url
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let request: Value = serde_json::from_str(&text).unwrap();
                    if let Some(mut response) = reply(&request) {
                        response["id"] = request["id"].clone();
                        ws.send(Message::Text(response.to_string())).await.unwrap();
                    }
                }
            }
        });
        Url::parse(&format!("ws://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn request_roundtrip_over_websocket() {
        let url = spawn_node(|request| {
            Some(json!({
                "status": "success",
                "type": "response",
                "result": {
                    "ledger_hash": "ABCD",
                    "ledger_index": request["ledger_index"].clone()
                }
            }))
        })
        .await;
        let shutdown = CancellationToken::new();
        let client = WsLedgerClient::connect(&url, Duration::from_secs(5), &shutdown)
            .await
            .unwrap();

        let value = client
            .send(SourceRequest::header(LedgerIndex(32570)))
            .await
            .unwrap();

        assert_eq!(value["ledger_hash"], json!("ABCD"));
        assert_eq!(value["ledger_index"], json!(32570));
        assert_eq!(value[COMMAND_ECHO_FIELD], json!("ledger"));
    }

    #[tokio::test]
    async fn concurrent_requests_are_correlated_by_id() {
        let url = spawn_node(|request| {
            Some(json!({
                "status": "success",
                "result": {"hash": request["transaction"].clone()}
            }))
        })
        .await;
        let shutdown = CancellationToken::new();
        let client = WsLedgerClient::connect(&url, Duration::from_secs(5), &shutdown)
            .await
            .unwrap();

        let hashes: Vec<String> = (0..20).map(|i| format!("TX{i}")).collect();
        let responses = futures::future::join_all(
            hashes
                .iter()
                .map(|h| client.send(SourceRequest::transaction(TxHash::new(h)))),
        )
        .await;

        for (hash, response) in hashes.iter().zip(responses) {
            assert_eq!(response.unwrap()["hash"], json!(hash));
        }
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let url = spawn_node(|_| None).await;
        let shutdown = CancellationToken::new();
        let client = WsLedgerClient::connect(&url, Duration::from_millis(100), &shutdown)
            .await
            .unwrap();

        let err = client
            .send(SourceRequest::header(LedgerIndex(1)))
            .await
            .unwrap_err();

        assert_eq!(err.kind, SourceErrorKind::Timeout);
    }

    #[tokio::test]
    async fn shutdown_fails_in_flight_requests() {
        let url = spawn_node(|_| None).await;
        let shutdown = CancellationToken::new();
        let client = WsLedgerClient::connect(&url, Duration::from_secs(30), &shutdown)
            .await
            .unwrap();

        let in_flight = client.send(SourceRequest::header(LedgerIndex(1)));
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        };
        let (result, ()) = tokio::join!(in_flight, cancel);

        assert_eq!(result.unwrap_err().kind, SourceErrorKind::Closed);
        assert!(client.is_closed());

        let after = client
            .send(SourceRequest::header(LedgerIndex(2)))
            .await
            .unwrap_err();
        assert_eq!(after.kind, SourceErrorKind::Closed);
    }
}
