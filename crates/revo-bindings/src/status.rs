//! Connection state as a display-ready indicator.

use std::fmt;

use revo_realtime::{ConnectionManager, ConnectionState, Disposer};
use tokio::sync::watch;

/// Connection state with the reconnect progress needed for an indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Reconnect attempts made since the last successful connect.
    pub attempts: u32,
    /// Reconnect budget.
    pub max_attempts: u32,
}

impl StatusSnapshot {
    /// Whether live data is flowing.
    pub fn is_online(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Short human-readable indicator.
    pub fn indicator(&self) -> String {
        match self.state {
            ConnectionState::Reconnecting => {
                format!("reconnecting ({}/{})", self.attempts, self.max_attempts)
            }
            ConnectionState::Failed => format!("offline (gave up after {} attempts)", self.attempts),
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.indicator())
    }
}

/// Mirrors a manager's state into a watch channel. Stops mirroring when
/// dropped.
pub struct ConnectionStatus {
    state: watch::Receiver<StatusSnapshot>,
    disposer: Disposer,
}

impl ConnectionStatus {
    /// Start mirroring `manager`.
    pub fn new(manager: &ConnectionManager) -> Self {
        let max_attempts = manager.config().max_reconnect_attempts;
        let (tx, rx) = watch::channel(StatusSnapshot {
            state: manager.state(),
            attempts: manager.reconnect_attempts(),
            max_attempts,
        });
        let weak = manager.downgrade();
        let disposer = manager.on_state_change(move |state| {
            let attempts = weak.upgrade().map_or(0, |m| m.reconnect_attempts());
            let _ = tx.send_replace(StatusSnapshot {
                state,
                attempts,
                max_attempts,
            });
        });
        Self {
            state: rx,
            disposer,
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        *self.state.borrow()
    }

    /// Watch receiver for the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.state.clone()
    }
}

impl Drop for ConnectionStatus {
    fn drop(&mut self) {
        self.disposer.dispose();
    }
}
