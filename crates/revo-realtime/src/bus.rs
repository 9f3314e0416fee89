//! Topic-keyed callback registry with disposer handles.
//!
//! Callbacks run outside the registry lock against a snapshot taken at
//! dispatch time, so a callback may subscribe, dispose, or send without
//! deadlocking. A callback disposed while a dispatch is in flight is skipped
//! if it has not been reached yet.
//!
//! Each registration has its own reentrant gate, held around the invocation
//! and by [`Disposer::dispose`]. Once `dispose` returns on any thread the
//! callback is not running and will not run again. A callback may dispose
//! itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Liveness of one registration. Lock order is gate, then registry.
struct Slot {
    active: AtomicBool,
    gate: ReentrantMutex<()>,
}

impl Slot {
    fn new(active: bool) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(active),
            gate: ReentrantMutex::new(()),
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

struct Entry<T> {
    id: u64,
    slot: Arc<Slot>,
    callback: Callback<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Arc::clone(&self.slot),
            callback: Arc::clone(&self.callback),
        }
    }
}

type TopicMap<T> = HashMap<String, Vec<Entry<T>>>;

/// Callbacks grouped by topic string.
pub struct Topics<T> {
    inner: Arc<Mutex<TopicMap<T>>>,
}

impl<T> Clone for Topics<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Topics<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> fmt::Debug for Topics<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topics").field("subscriptions", &self.len()).finish()
    }
}

impl<T: 'static> Topics<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `topic`.
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> Disposer
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let slot = Slot::new(true);
        self.inner
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Entry {
                id,
                slot: Arc::clone(&slot),
                callback: Arc::new(callback),
            });

        let weak: Weak<Mutex<TopicMap<T>>> = Arc::downgrade(&self.inner);
        let topic = topic.to_string();
        Disposer {
            slot,
            remove: Some(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut topics = inner.lock();
                let now_empty = match topics.get_mut(&topic) {
                    Some(entries) => {
                        entries.retain(|e| e.id != id);
                        entries.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    let _ = topics.remove(&topic);
                }
            })),
        }
    }

    /// Invoke every active callback registered under any of `keys`, in
    /// registration order, each at most once. Returns the number invoked.
    pub fn emit(&self, keys: &[&str], value: &T) -> usize {
        let mut delivered = 0;
        for entry in self.snapshot(keys) {
            let _gate = entry.slot.gate.lock();
            if entry.slot.is_active() {
                (entry.callback)(value);
                delivered += 1;
            }
        }
        delivered
    }

    fn snapshot(&self, keys: &[&str]) -> Vec<Entry<T>> {
        let topics = self.inner.lock();
        let mut entries: Vec<Entry<T>> = keys
            .iter()
            .filter_map(|key| topics.get(*key))
            .flatten()
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        entries.dedup_by_key(|e| e.id);
        entries
    }

    /// Deactivate and remove every callback.
    pub fn clear(&self) {
        let mut topics = self.inner.lock();
        for entry in topics.values().flatten() {
            entry.slot.active.store(false, Ordering::Release);
        }
        topics.clear();
    }

    /// Callbacks registered under `topic`.
    pub fn topic_len(&self, topic: &str) -> usize {
        self.inner.lock().get(topic).map_or(0, Vec::len)
    }
}

impl<T> Topics<T> {
    /// Total registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.lock().values().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-topic registry for lifecycle listeners.
pub struct Listeners<T>(Topics<T>);

const LISTENER_TOPIC: &str = "";

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self(Topics::default())
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listeners").field(&self.0.len()).finish()
    }
}

impl<T: 'static> Listeners<T> {
    /// Empty listener set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add<F>(&self, listener: F) -> Disposer
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.0.subscribe(LISTENER_TOPIC, listener)
    }

    /// Notify every listener in registration order.
    pub fn emit(&self, value: &T) -> usize {
        self.0.emit(&[LISTENER_TOPIC], value)
    }

    /// Remove all listeners.
    pub fn clear(&self) {
        self.0.clear();
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handle returned by every registration. Calling [`dispose`](Self::dispose)
/// removes the registration; calling it again does nothing. Dropping the
/// handle without disposing leaves the registration in place.
#[must_use = "keep the Disposer to be able to unsubscribe"]
pub struct Disposer {
    slot: Arc<Slot>,
    remove: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Disposer {
    /// A disposer bound to nothing.
    pub fn noop() -> Self {
        Self {
            slot: Slot::new(false),
            remove: None,
        }
    }

    /// Remove the registration. Idempotent. Blocks while the callback is
    /// running on another thread.
    pub fn dispose(&self) {
        let _gate = self.slot.gate.lock();
        if self.slot.active.swap(false, Ordering::AcqRel) {
            if let Some(remove) = &self.remove {
                remove();
            }
        }
    }

    /// Whether the registration is still live.
    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
