//! Periodic fetch into observable state.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fetched data plus request status.
#[derive(Clone, Debug, PartialEq)]
pub struct Loadable<T> {
    /// Last successfully fetched value. Kept when a later fetch fails.
    pub data: Option<T>,
    /// Error from the most recent fetch, cleared on success.
    pub error: Option<String>,
    /// A fetch is in flight.
    pub loading: bool,
    /// Completed fetches, successful or not.
    pub fetches: u64,
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
            fetches: 0,
        }
    }
}

impl<T> Loadable<T> {
    /// Showing fallback data: the latest fetch failed but an older value exists.
    pub fn is_stale(&self) -> bool {
        self.error.is_some() && self.data.is_some()
    }
}

/// Calls a fetch function every `interval` (first call immediately) and
/// publishes the result as [`Loadable`] state. A zero interval fetches once
/// and then only on [`refresh`](Self::refresh). Stops on [`stop`](Self::stop)
/// or drop.
pub struct Poller<T> {
    state: watch::Receiver<Loadable<T>>,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
}

impl<T> Poller<T>
where
    T: Send + Sync + 'static,
{
    /// Start polling on the current tokio runtime.
    pub fn spawn<F, Fut, E>(name: &'static str, interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tx, rx) = watch::channel(Loadable::default());
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        drop(tokio::spawn(poll_loop(
            name,
            interval,
            fetch,
            tx,
            cancel.clone(),
            Arc::clone(&refresh),
        )));
        Self {
            state: rx,
            cancel,
            refresh,
        }
    }

    /// Fetch now instead of waiting for the next tick.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop polling. The last state stays readable.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Watch receiver for the state.
    pub fn subscribe(&self) -> watch::Receiver<Loadable<T>> {
        self.state.clone()
    }
}

impl<T: Clone> Poller<T> {
    /// Current state.
    pub fn snapshot(&self) -> Loadable<T> {
        self.state.borrow().clone()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop<T, F, Fut, E>(
    name: &'static str,
    interval: Duration,
    fetch: F,
    tx: watch::Sender<Loadable<T>>,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut ticker = (!interval.is_zero()).then(|| {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let mut first = true;
    loop {
        if !first {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = refresh.notified() => {
                    if let Some(ticker) = ticker.as_mut() {
                        ticker.reset();
                    }
                }
                () = next_tick(&mut ticker) => {}
            }
        }
        first = false;

        tx.send_modify(|state| state.loading = true);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = fetch() => result,
        };
        match result {
            Ok(data) => tx.send_modify(move |state| {
                state.data = Some(data);
                state.error = None;
                state.loading = false;
                state.fetches += 1;
            }),
            Err(e) => {
                warn!(poller = name, error = %e, "poll failed, keeping last value");
                let message = e.to_string();
                tx.send_modify(move |state| {
                    state.error = Some(message);
                    state.loading = false;
                    state.fetches += 1;
                });
            }
        }
    }
    tx.send_modify(|state| state.loading = false);
    debug!(poller = name, "poller stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            let _ = ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
