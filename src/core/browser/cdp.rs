//! WebSocket client for the Chrome DevTools Protocol.
//!
//! Commands carry auto-incrementing ids; a background reader task routes each
//! response to the caller waiting on that id and forwards everything else as
//! an event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{DocwatchError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// An unsolicited message from the browser, e.g. `Page.domContentEventFired`
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpResponseError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
}

pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<SplitSink<WsStream, Message>>,
    events: Mutex<mpsc::UnboundedReceiver<CdpEvent>>,
    reader: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a page target's `webSocketDebuggerUrl`
    pub async fn connect(ws_url: &str) -> Result<Self> {
        debug!(url = ws_url, "Connecting to DevTools WebSocket");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| DocwatchError::Browser(format!("failed to connect to {}: {}", ws_url, e)))?;
        let (writer, reader) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, events) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&pending), event_tx));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            events: Mutex::new(events),
            reader,
        })
    }

    /// Send a command and wait for its result
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand { id, method, params })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        debug!(id, method, "Sending DevTools command");
        self.writer
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| DocwatchError::Browser(format!("failed to send {}: {}", method, e)))?;

        let response = match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(DocwatchError::Browser("DevTools connection closed".to_string())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(DocwatchError::Timeout {
                    method: method.to_string(),
                    duration: COMMAND_TIMEOUT,
                });
            }
        };

        if let Some(error) = response.error {
            return Err(DocwatchError::Browser(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            )));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Discard events that arrived before now
    pub fn drain_events(&mut self) {
        let events = self.events.get_mut();
        while events.try_recv().is_ok() {}
    }

    /// Wait for the next event named `method`, skipping others
    pub async fn wait_for_event(&mut self, method: &str, timeout: Duration) -> Result<CdpEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        let events = self.events.get_mut();

        loop {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) if event.method == method => return Ok(event),
                Ok(Some(_)) => continue,
                Ok(None) => {
                    return Err(DocwatchError::Browser(format!(
                        "connection closed while waiting for {}",
                        method
                    )))
                }
                Err(_) => {
                    return Err(DocwatchError::Timeout {
                        method: method.to_string(),
                        duration: timeout,
                    })
                }
            }
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut reader: SplitStream<WsStream>,
    pending: PendingMap,
    events: mpsc::UnboundedSender<CdpEvent>,
) {
    while let Some(message) = reader.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("DevTools socket error: {}", e);
                break;
            }
        };

        let Ok(json) = serde_json::from_str::<Value>(&text) else {
            warn!("Ignoring malformed DevTools message");
            continue;
        };

        if let Some(response) = parse_response(&json) {
            if let Some(tx) = pending.lock().await.remove(&response.id) {
                let _ = tx.send(response);
            }
        } else if let Some(event) = parse_event(&json) {
            let _ = events.send(event);
        }
    }

    // Dropping the senders wakes every waiter with a closed-connection error.
    pending.lock().await.clear();
}

pub fn parse_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

pub fn parse_event(json: &Value) -> Option<CdpEvent> {
    if json.get("id").is_some() {
        return None;
    }
    Some(CdpEvent {
        method: json.get("method")?.as_str()?.to_string(),
        params: json.get("params").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_with_result() {
        let response = parse_response(&json!({ "id": 3, "result": { "frameId": "F1" } })).unwrap();
        assert_eq!(response.id, 3);
        assert_eq!(response.result.unwrap()["frameId"], "F1");
        assert!(response.error.is_none());
    }

    #[test]
    fn test_parse_response_with_error() {
        let response = parse_response(&json!({
            "id": 4,
            "error": { "code": -32000, "message": "Cannot find context with specified id" }
        }))
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert!(error.message.contains("context"));
    }

    #[test]
    fn test_event_is_not_a_response() {
        let message = json!({ "method": "Page.domContentEventFired", "params": { "timestamp": 1.5 } });
        assert!(parse_response(&message).is_none());

        let event = parse_event(&message).unwrap();
        assert_eq!(event.method, "Page.domContentEventFired");
        assert_eq!(event.params["timestamp"], 1.5);
    }

    #[test]
    fn test_response_is_not_an_event() {
        assert!(parse_event(&json!({ "id": 1, "result": {} })).is_none());
    }

    #[test]
    fn test_command_serialization() {
        let command = CdpCommand {
            id: 9,
            method: "Runtime.evaluate",
            params: json!({ "expression": "1 + 1", "returnByValue": true }),
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["method"], "Runtime.evaluate");
        assert_eq!(value["params"]["returnByValue"], true);
    }
}
