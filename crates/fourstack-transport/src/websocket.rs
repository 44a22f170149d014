//! WebSocket listener and per-client channel plumbing, built on
//! `tokio-tungstenite`.
//!
//! The admission check runs inside the upgrade callback so a refused
//! client receives a real HTTP status (400/409) instead of a completed
//! handshake followed by a close frame.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use crate::{AdmissionPolicy, ClientSender, ConnectionId, Rejection, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;

/// Listens for incoming `/ws?username=<U>` upgrade requests.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    /// Binds the listener to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    ///
    /// Tests bind to `127.0.0.1:0` and read the assigned port from here.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next connection.
    ///
    /// Returns `Ok(None)` when a client was turned away during the
    /// upgrade (bad path, missing username, duplicate identity) — the
    /// accept loop just moves on. `Err` is reserved for listener-level
    /// failures.
    pub async fn accept<P: AdmissionPolicy>(
        &self,
        policy: &P,
    ) -> Result<Option<AcceptedClient>, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let mut username: Option<String> = None;
        let callback = |req: &Request, resp: Response| {
            match screen_upgrade(req, policy) {
                Ok(name) => {
                    username = Some(name);
                    Ok(resp)
                }
                Err(rejection) => Err(reject(rejection)),
            }
        };

        let ws = match tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
        {
            Ok(ws) => ws,
            Err(tungstenite::Error::Http(resp)) => {
                tracing::debug!(%addr, status = %resp.status(), "upgrade refused");
                return Ok(None);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "handshake failed");
                return Ok(None);
            }
        };

        // The callback ran exactly once on the success path.
        let Some(username) = username else {
            tracing::warn!(%addr, "handshake succeeded without admission");
            return Ok(None);
        };

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, %username, "accepted WebSocket connection");

        Ok(Some(AcceptedClient { id, username, ws }))
    }
}

/// Validates the upgrade request: path, username parameter, admission.
fn screen_upgrade<P: AdmissionPolicy>(
    req: &Request,
    policy: &P,
) -> Result<String, Rejection> {
    if req.uri().path() != "/ws" {
        return Err(Rejection::UnknownPath);
    }
    let username = req
        .uri()
        .query()
        .and_then(|q| query_param(q, "username"))
        .ok_or(Rejection::MissingUsername)?;
    policy.admit(&username)?;
    Ok(username)
}

/// Builds the HTTP error response for a refused upgrade.
fn reject(rejection: Rejection) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(rejection.to_string()));
    *resp.status_mut() = rejection.status();
    resp
}

/// Extracts a non-empty query parameter value.
fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key && !v.is_empty()).then(|| v.to_string())
    })
}

/// A connection that passed the upgrade and admission checks.
pub struct AcceptedClient {
    /// Process-unique connection id.
    pub id: ConnectionId,
    /// The admitted username from the query string.
    pub username: String,
    ws: WsStream,
}

impl AcceptedClient {
    /// Splits the socket into the delivery channel and the read half.
    ///
    /// Spawns the writer task that drains the channel into the sink;
    /// the returned `JoinHandle` lets the orchestrator abort it at
    /// teardown. Dropping every [`ClientSender`] clone also ends it.
    pub fn into_channel(
        self,
    ) -> (ClientSender, JoinHandle<()>, FrameReceiver) {
        let (sink, stream) = self.ws.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(sink, rx, self.id));
        (
            tx,
            writer,
            FrameReceiver {
                id: self.id,
                stream,
            },
        )
    }
}

/// Drains a client's frame channel into its WebSocket sink.
async fn write_loop(
    mut sink: WsSink,
    mut rx: mpsc::UnboundedReceiver<fourstack_protocol::ServerFrame>,
    id: ConnectionId,
) {
    while let Some(frame) = rx.recv().await {
        let text = match fourstack_protocol::encode(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(%id, error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            tracing::debug!(%id, error = %e, "write failed, stopping writer");
            break;
        }
    }
    let _ = sink.close().await;
}

/// The read half of an accepted connection.
pub struct FrameReceiver {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl FrameReceiver {
    /// Receives the next text message.
    ///
    /// Returns `Ok(None)` when the connection closed cleanly. Control
    /// frames are skipped; binary frames are accepted when they hold
    /// valid UTF-8 (some clients send JSON as binary).
    pub async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    match String::from_utf8(data.to_vec()) {
                        Ok(text) => return Ok(Some(text)),
                        Err(_) => {
                            tracing::debug!(id = %self.id, "dropping non-UTF-8 binary frame");
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_finds_key() {
        assert_eq!(
            query_param("username=alice", "username").as_deref(),
            Some("alice")
        );
        assert_eq!(
            query_param("a=1&username=bob&b=2", "username").as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn test_query_param_missing_or_empty_is_none() {
        assert_eq!(query_param("user=alice", "username"), None);
        assert_eq!(query_param("username=", "username"), None);
        assert_eq!(query_param("", "username"), None);
    }
}
