//! Connection manager: one driver task per `connect()` owns the transport;
//! every public method only touches shared state under a short lock.
//!
//! A generation counter ties each driver to the `connect()` that spawned it.
//! `connect()` and `disconnect()` bump it, so writes from a driver that has
//! been superseded are ignored.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use revo_core::{Envelope, WILDCARD};
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::bus::{Disposer, Listeners, Topics};
use crate::config::RealtimeConfig;
use crate::errors::TransportError;
use crate::queue::MessageQueue;
use crate::state::{ConnectionEvent, ConnectionState};
use crate::transport::{ABNORMAL_CLOSURE, Connector, Frame, FrameSink, FrameStream, NORMAL_CLOSURE};

/// Handle to a managed real-time connection. Cheap to clone; all clones
/// share one connection. When the last clone is dropped the connection is
/// shut down as if `disconnect()` had been called.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
    lifetime: Arc<Lifetime>,
}

/// Non-owning handle, for callbacks registered on the manager itself.
/// Holding one does not keep the connection alive.
#[derive(Clone)]
pub struct WeakConnectionManager {
    lifetime: Weak<Lifetime>,
}

impl WeakConnectionManager {
    /// Strong handle, if any owner is still alive.
    pub fn upgrade(&self) -> Option<ConnectionManager> {
        let lifetime = self.lifetime.upgrade()?;
        Some(ConnectionManager {
            shared: Arc::clone(&lifetime.0),
            lifetime,
        })
    }
}

struct Lifetime(Arc<Shared>);

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

struct Shared {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    inner: Mutex<Inner>,
    subscriptions: Topics<Envelope>,
    state_listeners: Listeners<ConnectionState>,
    event_listeners: Listeners<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
}

struct Inner {
    state: ConnectionState,
    generation: u64,
    attempts: u32,
    queue: MessageQueue<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    cancel: Option<CancellationToken>,
}

enum SessionEnd {
    Cancelled,
    Clean { reason: String },
    Lost(TransportError),
}

impl ConnectionManager {
    /// Manager that dials real WebSockets.
    pub fn websocket(config: RealtimeConfig) -> Self {
        Self::new(config, crate::transport::WsConnector)
    }

    /// Manager opening transports through `connector`.
    pub fn new(config: RealtimeConfig, connector: impl Connector) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                generation: 0,
                attempts: 0,
                queue: MessageQueue::new(config.queue_capacity),
                outbound: None,
                cancel: None,
            }),
            config,
            connector: Arc::new(connector),
            subscriptions: Topics::new(),
            state_listeners: Listeners::new(),
            event_listeners: Listeners::new(),
            state_tx,
        });
        Self {
            lifetime: Arc::new(Lifetime(Arc::clone(&shared))),
            shared,
        }
    }

    /// Start connecting. Acts only from `Disconnected` or `Failed` (the
    /// latter resets the attempt counter); otherwise a no-op. Must be called
    /// from within a tokio runtime.
    pub fn connect(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("connect() called outside a tokio runtime");
            return;
        };
        let (generation, cancel, from) = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_active() {
                debug!(state = %inner.state, "connect ignored, connection already active");
                return;
            }
            let from = inner.state;
            inner.generation += 1;
            inner.attempts = 0;
            inner.state = ConnectionState::Connecting;
            let cancel = CancellationToken::new();
            inner.cancel = Some(cancel.clone());
            (inner.generation, cancel, from)
        };
        self.shared.notify_transition(from, ConnectionState::Connecting);
        drop(runtime.spawn(drive(Arc::clone(&self.shared), generation, cancel)));
    }

    /// Close the connection with code 1000, cancel any pending reconnect,
    /// stop the heartbeat, and clear all channel subscriptions and queued
    /// messages. State and event listeners stay registered.
    pub fn disconnect(&self) {
        self.shared.shutdown();
    }

    /// Send an envelope. Returns `true` when handed to the open transport;
    /// otherwise the message is queued (dropping the oldest when full) and
    /// `false` is returned.
    pub fn send(&self, envelope: Envelope) -> bool {
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                error!(kind = %envelope.kind, error = %e, "failed to serialize outbound message");
                return false;
            }
        };

        let mut inner = self.shared.inner.lock();
        let text = match (&inner.outbound, inner.state) {
            (Some(tx), ConnectionState::Connected) => match tx.send(text) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(text)) => text,
            },
            _ => text,
        };
        if inner.queue.push(text).is_some() {
            warn!(capacity = inner.queue.capacity(), "outbound queue full, dropped oldest message");
        }
        debug!(kind = %envelope.kind, queued = inner.queue.len(), "connection not open, message queued");
        false
    }

    /// Register a callback for envelopes whose channel or type equals
    /// `topic`, or for every envelope when `topic` is `"*"`.
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> Disposer
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.shared.subscriptions.subscribe(topic, callback)
    }

    /// Register a state-change listener.
    pub fn on_state_change<F>(&self, listener: F) -> Disposer
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.shared.state_listeners.add(move |state: &ConnectionState| listener(*state))
    }

    /// Register a lifecycle event listener.
    pub fn on_event<F>(&self, listener: F) -> Disposer
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.shared.event_listeners.add(listener)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnect attempts since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().attempts
    }

    /// Messages waiting for the next connect.
    pub fn queued_len(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    /// Messages evicted from the full queue since creation.
    pub fn dropped_count(&self) -> u64 {
        self.shared.inner.lock().queue.dropped()
    }

    /// Registered channel subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.len()
    }

    /// Watch channel mirroring the state.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Configuration in use.
    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// Non-owning handle to this connection.
    pub fn downgrade(&self) -> WeakConnectionManager {
        WeakConnectionManager {
            lifetime: Arc::downgrade(&self.lifetime),
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn shutdown(&self) {
        let from = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            inner.outbound = None;
            inner.queue.clear();
            inner.attempts = 0;
            let from = inner.state;
            inner.state = ConnectionState::Disconnected;
            from
        };
        self.subscriptions.clear();
        if from != ConnectionState::Disconnected {
            info!(url = %self.config.url, "real-time connection closed by client");
            self.notify_transition(from, ConnectionState::Disconnected);
        }
    }

    /// Move to `to` if `generation` is still current. Returns `false` for a
    /// superseded driver.
    fn transition(&self, generation: u64, to: ConnectionState) -> bool {
        let from = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return false;
            }
            let from = inner.state;
            inner.state = to;
            from
        };
        if from != to {
            self.notify_transition(from, to);
        }
        true
    }

    fn notify_transition(&self, from: ConnectionState, to: ConnectionState) {
        let _ = self.state_tx.send_replace(to);
        debug!(%from, %to, "connection state changed");
        let _ = self.state_listeners.emit(&to);
        let _ = self
            .event_listeners
            .emit(&ConnectionEvent::StateChanged { from, to });
    }

    /// Transport is open: go `Connected`, reset the counter and move the
    /// handshake plus queued messages onto the outbound channel, all in one
    /// critical section so later sends cannot overtake them.
    fn on_open(&self, generation: u64) -> Option<mpsc::UnboundedReceiver<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (from, flushed) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return None;
            }
            if !self.config.channels.is_empty() {
                match Envelope::subscribe(self.config.channels.as_slice()).encode() {
                    Ok(text) => {
                        let _ = tx.send(text);
                    }
                    Err(e) => warn!(error = %e, "failed to encode subscribe handshake"),
                }
            }
            let flushed = inner.queue.len();
            for text in inner.queue.drain() {
                let _ = tx.send(text);
            }
            inner.outbound = Some(tx);
            inner.attempts = 0;
            let from = inner.state;
            inner.state = ConnectionState::Connected;
            (from, flushed)
        };
        info!(url = %self.config.url, flushed, "real-time connection established");
        self.notify_transition(from, ConnectionState::Connected);
        Some(rx)
    }

    /// Session over: detach the outbound channel and put anything unwritten
    /// back at the front of the queue.
    fn on_session_end(
        &self,
        generation: u64,
        unwritten: Option<String>,
        outbound: &mut mpsc::UnboundedReceiver<String>,
    ) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        inner.outbound = None;
        let mut pending: Vec<String> = unwritten.into_iter().collect();
        while let Ok(text) = outbound.try_recv() {
            pending.push(text);
        }
        if !pending.is_empty() {
            debug!(count = pending.len(), "requeueing unwritten messages");
            inner.queue.requeue_front(pending);
        }
    }

    fn report_error(&self, generation: u64, err: &TransportError) {
        if self.inner.lock().generation != generation {
            return;
        }
        warn!(url = %self.config.url, error = %err, "real-time connection lost");
        let _ = self.event_listeners.emit(&ConnectionEvent::Error {
            message: err.to_string(),
        });
    }

    /// Either enter `Reconnecting` and return the delay to wait, or enter
    /// `Failed` when the budget is spent. `None` also covers a superseded
    /// driver.
    fn schedule_reconnect(&self, generation: u64) -> Option<Duration> {
        let max = self.config.max_reconnect_attempts;
        let (from, to, attempt) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return None;
            }
            let from = inner.state;
            if inner.attempts < max {
                inner.attempts += 1;
                inner.state = ConnectionState::Reconnecting;
            } else {
                inner.state = ConnectionState::Failed;
                inner.cancel = None;
            }
            (from, inner.state, inner.attempts)
        };
        if from != to {
            self.notify_transition(from, to);
        }

        if to == ConnectionState::Failed {
            error!(url = %self.config.url, attempts = attempt, "max reconnect attempts reached");
            let _ = self
                .event_listeners
                .emit(&ConnectionEvent::MaxAttemptsReached { attempts: attempt });
            return None;
        }
        let delay = self.config.backoff.delay_for(attempt);
        warn!(
            attempt,
            max_attempts = max,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        Some(delay)
    }

    fn dispatch(&self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = text.len(), "dropping malformed inbound message");
                return;
            }
        };
        let mut keys = envelope.routing_keys();
        keys.push(WILDCARD);
        let delivered = self.subscriptions.emit(&keys, &envelope);
        trace!(kind = %envelope.kind, channel = ?envelope.channel, delivered, "dispatched inbound message");
    }
}

/// Driver loop: open, run the session, then either stop or back off and
/// try again.
async fn drive(shared: Arc<Shared>, generation: u64, cancel: CancellationToken) {
    let url = shared.config.endpoint();
    loop {
        debug!(url = %shared.config.url, "opening real-time connection");
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = tokio::time::timeout(
                shared.config.connect_timeout,
                shared.connector.connect(&url),
            ) => result,
        };

        let end = match opened {
            Ok(Ok((sink, stream))) => {
                let Some(outbound) = shared.on_open(generation) else {
                    return;
                };
                run_session(&shared, generation, &cancel, sink, stream, outbound).await
            }
            Ok(Err(e)) => SessionEnd::Lost(e),
            Err(_) => SessionEnd::Lost(TransportError::ConnectTimeout(shared.config.connect_timeout)),
        };

        match end {
            SessionEnd::Cancelled => return,
            SessionEnd::Clean { reason } => {
                info!(url = %shared.config.url, %reason, "server closed the connection normally");
                let _ = shared.transition(generation, ConnectionState::Disconnected);
                return;
            }
            SessionEnd::Lost(err) => {
                shared.report_error(generation, &err);
                let Some(delay) = shared.schedule_reconnect(generation) else {
                    return;
                };
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
                if !shared.transition(generation, ConnectionState::Connecting) {
                    return;
                }
            }
        }
    }
}

/// Heartbeat ticker whose first tick is one period away. `None` when the
/// period is zero, which disables the heartbeat.
fn heartbeat_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

async fn next_heartbeat(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            let _ = timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn run_session(
    shared: &Shared,
    generation: u64,
    cancel: &CancellationToken,
    mut sink: FrameSink,
    mut stream: FrameStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
) -> SessionEnd {
    let mut heartbeat = heartbeat_timer(shared.config.heartbeat_interval);

    let mut unwritten = None;
    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = sink
                    .send(Frame::Close {
                        code: NORMAL_CLOSURE,
                        reason: "client disconnect".into(),
                    })
                    .await;
                let _ = sink.close().await;
                return SessionEnd::Cancelled;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = sink.send(Frame::Text(text.clone())).await {
                    unwritten = Some(text);
                    break SessionEnd::Lost(e);
                }
            }
            () = next_heartbeat(&mut heartbeat) => {
                match Envelope::ping().encode() {
                    Ok(ping) => {
                        if let Err(e) = sink.send(Frame::Text(ping)).await {
                            break SessionEnd::Lost(e);
                        }
                        trace!("heartbeat sent");
                    }
                    Err(e) => warn!(error = %e, "failed to encode heartbeat"),
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(text))) => shared.dispatch(&text),
                Some(Ok(Frame::Close { code, reason })) if code == NORMAL_CLOSURE => {
                    break SessionEnd::Clean { reason };
                }
                Some(Ok(Frame::Close { code, reason })) => {
                    break SessionEnd::Lost(TransportError::Closed { code, reason });
                }
                Some(Err(e)) => break SessionEnd::Lost(e),
                None => {
                    break SessionEnd::Lost(TransportError::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: "connection dropped".into(),
                    });
                }
            },
        }
    };
    shared.on_session_end(generation, unwritten, &mut outbound);
    end
}
