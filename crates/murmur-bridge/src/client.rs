use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{HelperEvent, HelperMethod, Incoming, RpcRequest};
use crate::transport::Transport;
use murmur_shortcuts::ShortcutBinding;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The helper answered with a structured error.
    #[error("helper error {code}: {message}")]
    Helper { code: i32, message: String },
    /// No response with a matching id arrived within the deadline.
    #[error("{method} timed out")]
    Timeout { method: HelperMethod },
    /// The helper connection is gone; pending and future calls fail fast.
    #[error("helper unavailable")]
    HelperUnavailable,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("helper io: {0}")]
    Io(String),
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, BridgeError>>>>>;

/// RPC client for the native helper. Every request carries a fresh
/// correlation id; the dispatch task resolves the matching caller when a
/// response with that id arrives. Unsolicited events fan out to all
/// subscribers in arrival order.
pub struct NativeBridge {
    outgoing: mpsc::Sender<String>,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    event_tx: broadcast::Sender<HelperEvent>,
    request_timeout: Duration,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl NativeBridge {
    pub fn new(transport: Transport) -> Self {
        Self::with_timeout(transport, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(transport: Transport, request_timeout: Duration) -> Self {
        let Transport { outgoing, incoming } = transport;
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let dispatch = tokio::spawn(dispatch_loop(
            incoming,
            Arc::clone(&pending),
            Arc::clone(&closed),
            event_tx.clone(),
        ));

        Self {
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            event_tx,
            request_timeout,
            dispatch: Mutex::new(Some(dispatch)),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Subscribe to the unsolicited event stream. Dropping the subscription
    /// unsubscribes.
    pub fn subscribe_events(&self) -> EventSubscription {
        EventSubscription {
            rx: self.event_tx.subscribe(),
        }
    }

    pub async fn call(
        &self,
        method: HelperMethod,
        params: Option<Value>,
    ) -> Result<Value, BridgeError> {
        if !self.is_available() {
            return Err(BridgeError::HelperUnavailable);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = RpcRequest { id, method, params };
        let line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(e) => {
                self.pending.lock().remove(&id);
                return Err(BridgeError::Protocol(e.to_string()));
            }
        };

        if self.outgoing.send(line).await.is_err() {
            self.pending.lock().remove(&id);
            self.closed.store(true, Ordering::Release);
            return Err(BridgeError::HelperUnavailable);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Dispatch dropped the sender: connection lost mid-flight.
            Ok(Err(_)) => Err(BridgeError::HelperUnavailable),
            Err(_) => {
                self.pending.lock().remove(&id);
                warn!(%method, id, "helper request timed out");
                Err(BridgeError::Timeout { method })
            }
        }
    }

    pub async fn paste_text(&self, text: &str) -> Result<(), BridgeError> {
        self.call(HelperMethod::PasteText, Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    pub async fn mute_system_audio(&self) -> Result<(), BridgeError> {
        self.call(HelperMethod::MuteSystemAudio, None).await.map(|_| ())
    }

    pub async fn restore_system_audio(&self) -> Result<(), BridgeError> {
        self.call(HelperMethod::RestoreSystemAudio, None)
            .await
            .map(|_| ())
    }

    /// Push the accepted bindings down to the helper's event tap so it knows
    /// which key combinations to report.
    pub async fn set_shortcuts(&self, bindings: &[ShortcutBinding]) -> Result<(), BridgeError> {
        let params = serde_json::to_value(bindings)
            .map_err(|e| BridgeError::Protocol(e.to_string()))?;
        self.call(HelperMethod::SetShortcuts, Some(json!({ "shortcuts": params })))
            .await
            .map(|_| ())
    }

    pub async fn accessibility_granted(&self) -> Result<bool, BridgeError> {
        let result = self.call(HelperMethod::GetAccessibilityStatus, None).await?;
        result
            .get("granted")
            .and_then(Value::as_bool)
            .ok_or_else(|| BridgeError::Protocol("malformed accessibility status".into()))
    }

    pub async fn request_accessibility_permission(&self) -> Result<(), BridgeError> {
        self.call(HelperMethod::RequestAccessibilityPermission, None)
            .await
            .map(|_| ())
    }

    pub async fn accessibility_context(&self) -> Result<Value, BridgeError> {
        self.call(HelperMethod::GetAccessibilityContext, None).await
    }

    pub async fn accessibility_tree_details(&self) -> Result<Value, BridgeError> {
        self.call(HelperMethod::GetAccessibilityTreeDetails, None)
            .await
    }

    /// Stop the dispatch task. Pending calls fail with "helper unavailable".
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(handle) = self.dispatch.lock().take() {
            handle.abort();
        }
        fail_all_pending(&self.pending);
    }
}

impl Drop for NativeBridge {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatch.lock().take() {
            handle.abort();
        }
    }
}

/// A live handle onto the helper's event stream. `recv` skips over lag gaps
/// rather than surfacing them; events are delivered in arrival order.
pub struct EventSubscription {
    rx: broadcast::Receiver<HelperEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the bridge is gone.
    pub async fn recv(&mut self) -> Option<HelperEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event subscriber lagged, skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

async fn dispatch_loop(
    mut incoming: mpsc::Receiver<String>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    event_tx: broadcast::Sender<HelperEvent>,
) {
    while let Some(line) = incoming.recv().await {
        match serde_json::from_str::<Incoming>(&line) {
            Ok(Incoming::Response(response)) => {
                let waiter = pending.lock().remove(&response.id);
                let Some(waiter) = waiter else {
                    // Late response after a timeout already resolved the call.
                    debug!(id = response.id, "response with no pending request");
                    continue;
                };
                let outcome = match (response.result, response.error) {
                    (_, Some(err)) => Err(BridgeError::Helper {
                        code: err.code,
                        message: err.message,
                    }),
                    (Some(result), None) => Ok(result),
                    (None, None) => Ok(Value::Null),
                };
                let _ = waiter.send(outcome);
            }
            Ok(Incoming::Event(event)) => {
                // No subscribers is fine; send only fails then.
                let _ = event_tx.send(event);
            }
            Err(e) => {
                warn!("unparseable line from helper: {} ({})", line, e);
            }
        }
    }

    info!("helper connection closed");
    closed.store(true, Ordering::Release);
    fail_all_pending(&pending);
}

fn fail_all_pending(pending: &PendingMap) {
    let waiters: Vec<_> = pending.lock().drain().collect();
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(BridgeError::HelperUnavailable));
    }
}
