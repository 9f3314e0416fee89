//! Real-time channel folded into observable state.

use std::collections::HashMap;

use revo_core::{AgentId, AgentStatus, AgentStatusUpdate, Envelope, SystemMetrics, kinds};
use revo_realtime::{ConnectionManager, Disposer};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;

/// State built by applying every payload on a topic to a reducer.
/// Unsubscribes when dropped.
pub struct ChannelBinding<S> {
    state: watch::Receiver<S>,
    disposer: Disposer,
}

impl<S> ChannelBinding<S>
where
    S: Send + Sync + 'static,
{
    /// Subscribe to `topic` (channel, message type, or `"*"`). Payloads
    /// that do not decode as `T` are skipped.
    pub fn new<T, R>(manager: &ConnectionManager, topic: &str, initial: S, reducer: R) -> Self
    where
        T: DeserializeOwned + 'static,
        R: Fn(&mut S, T) + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(initial);
        let topic_name = topic.to_string();
        let disposer = manager.subscribe(topic, move |envelope: &Envelope| {
            match envelope.payload_as::<T>() {
                Ok(item) => tx.send_modify(|state| reducer(state, item)),
                Err(e) => debug!(
                    topic = %topic_name,
                    kind = %envelope.kind,
                    error = %e,
                    "skipping payload that does not match binding type"
                ),
            }
        });
        Self {
            state: rx,
            disposer,
        }
    }

    /// Watch receiver for the state.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Stop receiving updates. The last state stays readable.
    pub fn close(&self) {
        self.disposer.dispose();
    }

    /// Whether the binding still receives updates.
    pub fn is_open(&self) -> bool {
        self.disposer.is_active()
    }
}

impl<S: Clone> ChannelBinding<S> {
    /// Current state.
    pub fn snapshot(&self) -> S {
        self.state.borrow().clone()
    }
}

impl<T> ChannelBinding<Option<T>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Binding holding the most recent payload on `topic`.
    pub fn latest(manager: &ConnectionManager, topic: &str) -> Self {
        Self::new(manager, topic, None, |state: &mut Option<T>, item: T| {
            *state = Some(item);
        })
    }
}

impl<S> Drop for ChannelBinding<S> {
    fn drop(&mut self) {
        self.disposer.dispose();
    }
}

/// Latest status per agent, from `agent_status_update` pushes.
pub fn agent_statuses(manager: &ConnectionManager) -> ChannelBinding<HashMap<AgentId, AgentStatus>> {
    ChannelBinding::new(
        manager,
        kinds::AGENT_STATUS_UPDATE,
        HashMap::new(),
        |statuses: &mut HashMap<AgentId, AgentStatus>, update: AgentStatusUpdate| {
            let _ = statuses.insert(update.agent_id, update.status);
        },
    )
}

/// Most recent `metrics_update` push.
pub fn live_metrics(manager: &ConnectionManager) -> ChannelBinding<Option<SystemMetrics>> {
    ChannelBinding::latest(manager, kinds::METRICS_UPDATE)
}
