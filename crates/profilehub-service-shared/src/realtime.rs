//! Real-time event transport over WebSocket.
//!
//! Attached only to a [`ServerListener`]; the function adapter never carries
//! it. Clients connect to [`REALTIME_PATH`] and exchange JSON frames shaped
//! like [`RealtimeEvent`]. Every valid event a client sends is broadcast to all
//! connected clients, the sender included.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::error::not_found;
use crate::listener::ServerListener;

pub const REALTIME_PATH: &str = "/socket.io";

/// Events buffered per subscriber before slow clients start losing them.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl RealtimeEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Binds the transport to a listener that has not started accepting.
pub struct RealtimeAttachment;

impl RealtimeAttachment {
    pub fn attach(listener: &mut ServerListener) -> RealtimeHandle {
        let handle = RealtimeHandle::new(EVENT_BUFFER);
        listener.attach(handle.router());
        info!(path = REALTIME_PATH, addr = %listener.addr(), "realtime transport attached");
        handle
    }
}

/// Event-stream state, alive for as long as the listener.
#[derive(Clone, Debug)]
pub struct RealtimeHandle {
    inner: Arc<RealtimeInner>,
}

#[derive(Debug)]
struct RealtimeInner {
    events: broadcast::Sender<RealtimeEvent>,
    connections: AtomicUsize,
}

impl RealtimeHandle {
    pub fn new(buffer: usize) -> Self {
        let (events, _) = broadcast::channel(buffer.max(1));
        Self {
            inner: Arc::new(RealtimeInner {
                events,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Broadcast to every connected client. Returns how many received it.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        self.inner.events.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.inner.events.subscribe()
    }

    /// Number of currently connected sockets.
    pub fn connections(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    fn router(&self) -> Router {
        Router::new()
            .route(REALTIME_PATH, get(upgrade))
            .method_not_allowed_fallback(not_found)
            .with_state(self.clone())
    }

    async fn serve_socket(self, socket: WebSocket) {
        let (outgoing, incoming) = socket.split();
        self.pump(incoming, outgoing).await;
    }

    /// Relay frames between one client and the broadcast channel.
    async fn pump<I, O, E>(self, mut incoming: I, mut outgoing: O)
    where
        I: Stream<Item = Result<Message, E>> + Unpin,
        O: Sink<Message> + Unpin,
        E: std::fmt::Display,
    {
        let _guard = ConnectionGuard::new(&self.inner.connections);
        let mut events = self.subscribe();
        debug!(connections = self.connections(), "realtime client connected");

        loop {
            tokio::select! {
                frame = incoming.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<RealtimeEvent>(text.as_str()) {
                            Ok(event) => {
                                self.publish(event);
                            }
                            Err(err) => warn!(error = %err, "ignoring malformed realtime frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "realtime socket error");
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if outgoing.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "realtime client lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        debug!("realtime client disconnected");
    }
}

async fn upgrade(State(handle): State<RealtimeHandle>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle.serve_socket(socket))
}

struct ConnectionGuard<'a>(&'a AtomicUsize);

impl<'a> ConnectionGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
