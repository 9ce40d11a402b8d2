//! Observable-state capability
//!
//! The session announces every state mutation to an injected observer. A UI
//! layer uses this to schedule re-renders; the session itself makes no
//! assumption about how changes are consumed.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// What changed on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// Field values changed
    Data,
    /// Error map changed
    Errors,
    /// Touched set changed
    Touched,
    /// `processing` flag flipped
    Processing(bool),
    /// `validating` flag flipped
    Validating(bool),
    /// Session reset to initial data
    Reset,
}

/// Receives state change notifications
pub trait StateObserver: Send + Sync {
    fn on_change(&self, change: &StateChange);
}

impl<T: StateObserver + ?Sized> StateObserver for Arc<T> {
    fn on_change(&self, change: &StateChange) {
        (**self).on_change(change)
    }
}

/// Ignores every change
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StateObserver for NoopObserver {
    fn on_change(&self, _change: &StateChange) {}
}

/// Bumps a revision counter on a tokio `watch` channel for every change
#[derive(Debug)]
pub struct WatchObserver {
    tx: watch::Sender<u64>,
}

impl WatchObserver {
    /// Create the observer and a receiver of revision numbers
    pub fn new() -> (Self, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0);
        (Self { tx }, rx)
    }

    /// Subscribe another receiver
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl StateObserver for WatchObserver {
    fn on_change(&self, _change: &StateChange) {
        self.tx.send_modify(|revision| *revision += 1);
    }
}

/// Keeps every change in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    changes: Mutex<Vec<StateChange>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes seen so far
    pub fn changes(&self) -> Vec<StateChange> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `change` was seen
    pub fn count(&self, change: &StateChange) -> usize {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| *c == change)
            .count()
    }
}

impl StateObserver for RecordingObserver {
    fn on_change(&self, change: &StateChange) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change.clone());
    }
}
