//! Shared workflow status with fan-out to observers.
//!
//! The broadcaster owns the one mutable [`StatusSnapshot`]. Every update is
//! applied in place and the full new snapshot is sent on a tokio broadcast
//! channel, so a slow or disconnected observer never blocks the others or
//! the pipeline.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::debug;
use vdub_models::{StatusEvent, StatusSnapshot, StatusUpdate, WorkflowResult};

/// Events buffered per observer before it starts lagging.
const DEFAULT_CAPACITY: usize = 256;

struct Inner {
    snapshot: RwLock<StatusSnapshot>,
    events: broadcast::Sender<StatusEvent>,
}

/// A new observer's starting point: the snapshot to send first and the
/// receiver for everything published after it.
pub struct StatusSubscription {
    pub initial: StatusSnapshot,
    pub events: broadcast::Receiver<StatusEvent>,
}

/// Holds the current status and fans every change out to observers.
#[derive(Clone)]
pub struct StatusBroadcaster {
    inner: Arc<Inner>,
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                snapshot: RwLock::new(StatusSnapshot::idle()),
                events,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusSnapshot> {
        self.inner.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusSnapshot> {
        self.inner.snapshot.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a partial update and broadcast the resulting snapshot.
    pub fn update(&self, update: &StatusUpdate) -> StatusSnapshot {
        let mut snapshot = self.write();
        snapshot.apply(update);
        let current = snapshot.clone();
        self.send(StatusEvent::Status(current.clone()));
        current
    }

    /// Replace the snapshot wholesale with the idle one and broadcast it.
    pub fn reset(&self) -> StatusSnapshot {
        let mut snapshot = self.write();
        *snapshot = StatusSnapshot::idle();
        self.send(StatusEvent::Status(snapshot.clone()));
        snapshot.clone()
    }

    /// Broadcast a final outcome. The snapshot is left unchanged.
    pub fn publish_result(&self, result: WorkflowResult) {
        let _guard = self.read();
        self.send(StatusEvent::Result(result));
    }

    /// Current snapshot for non-streaming callers.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.read().clone()
    }

    /// Register an observer.
    ///
    /// The snapshot and the receiver are taken under the same lock, so the
    /// observer sees every update after `initial` and none before it.
    pub fn subscribe(&self) -> StatusSubscription {
        let snapshot = self.read();
        StatusSubscription {
            initial: snapshot.clone(),
            events: self.inner.events.subscribe(),
        }
    }

    /// Number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    fn send(&self, event: StatusEvent) {
        // No observers is fine.
        if self.inner.events.send(event).is_err() {
            debug!("Status event dropped, no observers connected");
        }
    }
}
