//! Polling-based watch emulation.
//!
//! slurmrestd has no push channel, so a watch is a background task
//! that re-lists the resource at a fixed interval and diffs snapshots
//! by entity id. Each subscription runs independently; cancelling one
//! never affects another.
//!
//! Within one tick, events are emitted in ascending id order, and a
//! tick's events always precede the next tick's. A transient list
//! failure is logged and swallowed; the subscription stays open and
//! retries on the next tick. When the consumer lags and the event
//! buffer fills, the overflowing event is dropped with a warning —
//! the next tick's diff re-derives current state, so a drop cannot
//! wedge the stream.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, watch};

use crate::errors::Result;
use crate::models::{Job, Node, Partition};

/// Default interval between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default bound on the event buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// An entity that can be watched: it has a stable id and a
/// comparable state rendering.
pub trait Watched: Clone + Send + Sync + 'static {
    type Id: Ord + Clone + std::fmt::Debug + Display + Send + Sync + 'static;

    fn watch_id(&self) -> Self::Id;
    fn watch_state(&self) -> String;
}

impl Watched for Job {
    type Id = u32;

    fn watch_id(&self) -> u32 {
        self.job_id
    }

    fn watch_state(&self) -> String {
        self.state.to_string()
    }
}

impl Watched for Node {
    type Id = String;

    fn watch_id(&self) -> String {
        self.name.clone()
    }

    fn watch_state(&self) -> String {
        self.state.to_string()
    }
}

impl Watched for Partition {
    type Id = String;

    fn watch_id(&self) -> String {
        self.name.clone()
    }

    fn watch_state(&self) -> String {
        self.state.to_string()
    }
}

/// A change observed between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T: Watched> {
    /// An id not present in the previous snapshot.
    Added(T),
    /// An id present in both snapshots whose state changed.
    StateChanged { previous: String, current: T },
    /// An id that disappeared from the listing.
    Removed { id: T::Id, previous: String },
}

impl<T: Watched> WatchEvent<T> {
    /// The id this event concerns.
    pub fn id(&self) -> T::Id {
        match self {
            WatchEvent::Added(entity) => entity.watch_id(),
            WatchEvent::StateChanged { current, .. } => current.watch_id(),
            WatchEvent::Removed { id, .. } => id.clone(),
        }
    }
}

/// Subscription parameters.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    /// Bound on buffered, not-yet-consumed events.
    pub buffer: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Handle to a running watch subscription.
///
/// Dropping the handle cancels the subscription.
pub struct WatchHandle<T: Watched> {
    events: mpsc::Receiver<WatchEvent<T>>,
    stop: watch::Sender<bool>,
}

impl<T: Watched> WatchHandle<T> {
    /// The next event, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<WatchEvent<T>> {
        self.events.recv().await
    }

    /// Stop polling. No partial tick is emitted after this returns;
    /// already-buffered events remain readable.
    pub fn cancel(&self) {
        let _ = self.stop.send(true);
    }
}

/// Spawn a poll loop over `list`, diffing snapshots each tick.
///
/// The first successful listing establishes the baseline and emits
/// nothing; subsequent ticks emit the diff.
pub fn spawn_watch<T, F, Fut>(options: WatchOptions, list: F) -> WatchHandle<T>
where
    T: Watched,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send,
{
    let (event_tx, event_rx) = mpsc::channel(options.buffer.max(1));
    let (stop_tx, mut stop_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(options.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut baseline: Option<BTreeMap<T::Id, T>> = None;

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    // Either an explicit cancel or the handle was dropped.
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let entities = match list().await {
                        Ok(entities) => entities,
                        Err(err) => {
                            // Transient failure: keep the subscription
                            // open and retry on the next tick.
                            debug!("watch poll failed, retrying next tick: {err}");
                            continue;
                        }
                    };

                    let snapshot: BTreeMap<T::Id, T> = entities
                        .into_iter()
                        .map(|e| (e.watch_id(), e))
                        .collect();

                    let Some(previous) = baseline.replace(snapshot) else {
                        continue;
                    };
                    let current = baseline.as_ref().expect("baseline just set");

                    // Re-check after the await: a cancellation must not
                    // emit a partial tick.
                    if *stop_rx.borrow() {
                        break;
                    }

                    if !emit_diff(&previous, current, &event_tx) {
                        // Receiver dropped; nobody is listening.
                        break;
                    }
                }
            }
        }
    });

    WatchHandle {
        events: event_rx,
        stop: stop_tx,
    }
}

/// Emit the diff between two snapshots in ascending id order.
/// Returns false once the receiver is gone.
fn emit_diff<T: Watched>(
    previous: &BTreeMap<T::Id, T>,
    current: &BTreeMap<T::Id, T>,
    events: &mpsc::Sender<WatchEvent<T>>,
) -> bool {
    let mut ids: Vec<&T::Id> = previous.keys().chain(current.keys()).collect();
    ids.sort();
    ids.dedup();

    for id in ids {
        let event = match (previous.get(id), current.get(id)) {
            (None, Some(entity)) => WatchEvent::Added(entity.clone()),
            (Some(old), Some(new)) => {
                let old_state = old.watch_state();
                if old_state == new.watch_state() {
                    continue;
                }
                WatchEvent::StateChanged {
                    previous: old_state,
                    current: new.clone(),
                }
            }
            (Some(old), None) => WatchEvent::Removed {
                id: id.clone(),
                previous: old.watch_state(),
            },
            (None, None) => continue,
        };

        match events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("watch buffer full, dropping event for id {}", event.id());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
        }
    }

    true
}
