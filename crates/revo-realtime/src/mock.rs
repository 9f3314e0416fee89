//! In-memory connector for tests.
//!
//! Each accepted connection hands a [`MockSession`] to the paired
//! [`MockServer`], which plays the server side: it reads what the client
//! wrote and pushes frames back.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use revo_core::Envelope;

use crate::errors::TransportError;
use crate::transport::{ABNORMAL_CLOSURE, Connector, Frame, FrameSink, FrameStream};

/// What the next `connect` call does.
#[derive(Clone, Debug)]
pub enum ConnectPlan {
    /// Open a session.
    Accept,
    /// Fail with the given message.
    Refuse(String),
    /// Never complete (exercises the connect timeout).
    Hang,
}

struct MockState {
    plans: VecDeque<ConnectPlan>,
    urls: Vec<String>,
    sessions: mpsc::UnboundedSender<MockSession>,
}

/// Scripted [`Connector`]. Unscripted attempts are accepted.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

/// Server side of a [`MockConnector`].
pub struct MockServer {
    sessions: mpsc::UnboundedReceiver<MockSession>,
}

impl MockConnector {
    /// Create a connector and its server half.
    pub fn new() -> (Self, MockServer) {
        let (tx, rx) = mpsc::unbounded();
        let connector = Self {
            state: Arc::new(Mutex::new(MockState {
                plans: VecDeque::new(),
                urls: Vec::new(),
                sessions: tx,
            })),
        };
        (connector, MockServer { sessions: rx })
    }

    /// Script the next unscripted attempt.
    pub fn push_plan(&self, plan: ConnectPlan) {
        self.state.lock().plans.push_back(plan);
    }

    /// Script several attempts in order.
    pub fn push_plans(&self, plans: impl IntoIterator<Item = ConnectPlan>) {
        self.state.lock().plans.extend(plans);
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.state.lock().urls.len()
    }

    /// URLs dialled so far.
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let plan = {
            let mut state = self.state.lock();
            state.urls.push(url.to_string());
            state.plans.pop_front().unwrap_or(ConnectPlan::Accept)
        };
        match plan {
            ConnectPlan::Refuse(reason) => Err(TransportError::Connect(reason)),
            ConnectPlan::Hang => std::future::pending().await,
            ConnectPlan::Accept => {
                let (client_tx, server_rx) = mpsc::unbounded::<Frame>();
                let (server_tx, client_rx) = mpsc::unbounded::<Result<Frame, TransportError>>();
                let session = MockSession {
                    sent: server_rx,
                    inbound: server_tx,
                };
                if self.state.lock().sessions.unbounded_send(session).is_err() {
                    return Err(TransportError::Connect("mock server dropped".into()));
                }
                let sink = client_tx.sink_map_err(|e| TransportError::Send(e.to_string()));
                Ok((Box::pin(sink), Box::pin(client_rx)))
            }
        }
    }
}

impl MockServer {
    /// Wait for the next accepted connection.
    pub async fn next_session(&mut self) -> Option<MockSession> {
        self.sessions.next().await
    }
}

/// One accepted connection, seen from the server.
pub struct MockSession {
    sent: mpsc::UnboundedReceiver<Frame>,
    inbound: mpsc::UnboundedSender<Result<Frame, TransportError>>,
}

impl MockSession {
    /// Next frame written by the client; `None` once the client side is gone.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.sent.next().await
    }

    /// A frame already written by the client, without waiting.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.sent.next().now_or_never().flatten()
    }

    /// Next envelope written by the client, skipping heartbeats.
    pub async fn next_envelope(&mut self) -> Option<Envelope> {
        while let Some(frame) = self.next_frame().await {
            if let Frame::Text(text) = frame {
                match Envelope::decode(&text) {
                    Ok(env) if env.is_heartbeat() => {}
                    Ok(env) => return Some(env),
                    Err(_) => {}
                }
            }
        }
        None
    }

    /// Deliver raw text to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.unbounded_send(Ok(Frame::Text(text.into())));
    }

    /// Deliver an envelope to the client.
    pub fn push(&self, envelope: &Envelope) {
        if let Ok(text) = envelope.encode() {
            self.push_text(text);
        }
    }

    /// Send a close frame.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.inbound.unbounded_send(Ok(Frame::Close {
            code,
            reason: reason.to_string(),
        }));
    }

    /// Inject a read error.
    pub fn fail(&self, message: &str) {
        let _ = self
            .inbound
            .unbounded_send(Err(TransportError::Receive(message.to_string())));
    }

    /// Drop the connection without a close frame (code 1006 on the client).
    pub fn hang_up(self) {
        drop(self);
    }

    /// Code the client sees when [`hang_up`](Self::hang_up) is used.
    pub const HANG_UP_CODE: u16 = ABNORMAL_CLOSURE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_pairs_client_and_server() {
        let (connector, mut server) = MockConnector::new();
        let (mut sink, mut stream) = connector.connect("ws://mock").await.unwrap();
        let mut session = server.next_session().await.unwrap();

        sink.send(Frame::Text("hello".into())).await.unwrap();
        assert_eq!(session.next_frame().await, Some(Frame::Text("hello".into())));

        session.push_text("world");
        assert_eq!(stream.next().await, Some(Ok(Frame::Text("world".into()))));

        session.hang_up();
        assert_eq!(stream.next().await, None);
        assert_eq!(connector.urls(), vec!["ws://mock"]);
    }

    #[tokio::test]
    async fn refuse_plan_errors() {
        let (connector, _server) = MockConnector::new();
        connector.push_plan(ConnectPlan::Refuse("nope".into()));
        let result = connector.connect("ws://mock").await;
        assert!(matches!(result, Err(TransportError::Connect(m)) if m == "nope"));
        assert_eq!(connector.attempts(), 1);
    }
}
