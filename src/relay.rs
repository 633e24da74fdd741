//! Per-relay WebSocket transport.
//!
//! One short-lived connection per relay per operation: a query subscribes,
//! drains stored events until EOSE, and closes; a publish sends a single
//! signed event and waits for the relay's acknowledgment. Nothing here
//! raises a fatal error for a query — connect failures, protocol garbage,
//! and timeouts all resolve to whatever was collected so far, so one bad
//! relay can never abort an aggregate operation.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::event::Event;

/// Result of publishing one event to one relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Relay acknowledged the event with `true`.
    Accepted,
    /// Relay acknowledged with `false` and a reason.
    Rejected(String),
    /// No acknowledgment arrived within the window.
    TimedOut,
    /// The connection could not be established or broke down.
    ConnectFailed(String),
}

impl RelayOutcome {
    /// Whether the relay accepted the event.
    pub fn is_accepted(&self) -> bool {
        matches!(self, RelayOutcome::Accepted)
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayOutcome::Accepted => write!(f, "accepted"),
            RelayOutcome::Rejected(reason) if reason.is_empty() => write!(f, "rejected"),
            RelayOutcome::Rejected(reason) => write!(f, "rejected: {reason}"),
            RelayOutcome::TimedOut => write!(f, "timeout"),
            RelayOutcome::ConnectFailed(reason) => write!(f, "connection failed: {reason}"),
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<Box<dyn AsyncReadWrite + Unpin + Send>>>;

/// Query one relay, collecting events until EOSE or the window elapses.
///
/// Returns the events received so far in every failure mode; partial
/// results from a relay that went quiet mid-stream are kept.
pub async fn query_relay(
    relay: &str,
    filter: &Value,
    window: Duration,
    tor_socks: Option<&str>,
) -> Vec<Event> {
    let deadline = Instant::now() + window;
    let mut events = Vec::new();
    let sub_id = subscription_id();

    let mut ws = match timeout_at(deadline, connect_ws(relay, tor_socks)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::warn!("connect failed ({relay}): {e}");
            return events;
        }
        Err(_) => {
            tracing::warn!("connect timeout ({relay})");
            return events;
        }
    };

    let req = json!(["REQ", sub_id, filter]);
    if let Err(e) = ws.send(Message::Text(req.to_string())).await {
        tracing::warn!("send failed ({relay}): {e}");
        return events;
    }

    loop {
        let msg = match timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                tracing::warn!("protocol error ({relay}): {e}");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!("query timeout ({relay}), keeping {} events", events.len());
                break;
            }
        };
        match msg {
            Message::Text(txt) => {
                if let Ok(val) = serde_json::from_str::<Value>(&txt) {
                    if let Some(arr) = val.as_array() {
                        match arr.first().and_then(|v| v.as_str()) {
                            Some("EVENT") if arr.len() >= 3 => {
                                if let Ok(ev) = serde_json::from_value::<Event>(arr[2].clone()) {
                                    events.push(ev);
                                }
                            }
                            Some("EOSE") => break,
                            _ => {}
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Terminal state reached: unsubscribe and drop the connection.
    let _ = ws
        .send(Message::Text(json!(["CLOSE", sub_id]).to_string()))
        .await;
    let _ = ws.close(None).await;
    events
}

/// Publish a signed event to one relay, resolving to a per-relay outcome.
pub async fn publish_relay(
    relay: &str,
    ev: &Event,
    window: Duration,
    tor_socks: Option<&str>,
) -> RelayOutcome {
    let deadline = Instant::now() + window;

    let mut ws = match timeout_at(deadline, connect_ws(relay, tor_socks)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => return RelayOutcome::ConnectFailed(e.to_string()),
        Err(_) => return RelayOutcome::TimedOut,
    };

    let frame = json!(["EVENT", ev]);
    if let Err(e) = ws.send(Message::Text(frame.to_string())).await {
        return RelayOutcome::ConnectFailed(e.to_string());
    }

    let outcome = loop {
        match timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(Message::Text(txt)))) => {
                let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                    continue;
                };
                let Some(arr) = val.as_array() else { continue };
                if arr.first().and_then(|v| v.as_str()) != Some("OK") || arr.len() < 3 {
                    continue;
                }
                if arr.get(2).and_then(|v| v.as_bool()).unwrap_or(false) {
                    break RelayOutcome::Accepted;
                }
                let reason = arr
                    .get(3)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                break RelayOutcome::Rejected(reason);
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                break RelayOutcome::ConnectFailed("closed before acknowledgment".into());
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => break RelayOutcome::ConnectFailed(e.to_string()),
            Err(_) => break RelayOutcome::TimedOut,
        }
    };

    let _ = ws.close(None).await;
    outcome
}

/// Fresh subscription identifier for one query.
fn subscription_id() -> String {
    format!("tp{:08x}", rand::random::<u32>())
}

/// Establish a WebSocket connection, optionally via a SOCKS5 proxy.
async fn connect_ws(relay: &str, tor_socks: Option<&str>) -> Result<WsStream> {
    let url = Url::parse(relay)?;
    let host = url.host_str().ok_or_else(|| anyhow!("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("missing port"))?;
    let req = relay.into_client_request()?;
    let stream: Box<dyn AsyncReadWrite + Unpin + Send> = if let Some(proxy) = tor_socks {
        Box::new(Socks5Stream::connect(proxy, (host, port)).await?)
    } else {
        Box::new(TcpStream::connect((host, port)).await?)
    };
    let (ws, _) = client_async_tls(req, stream).await?;
    Ok(ws)
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
