//! # Update Channel
//!
//! The ordered queue of pending status events between the active worker run
//! and polling clients. Single producer (the supervisor consuming the
//! worker's output), single logical consumer (the next poll, which atomically
//! reads and clears).

use std::sync::{Mutex, PoisonError};

use super::event::{StatusEvent, WorkerStatus, WorkerUpdate};

#[derive(Debug, Default)]
struct Inner {
    pending: Vec<StatusEvent>,
    next_sequence: u64,
}

/// Ordered, destructively-drained queue of status events
#[derive(Debug, Default)]
pub struct UpdateChannel {
    inner: Mutex<Inner>,
}

impl UpdateChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bare event, assigning it the next sequence number
    pub fn push(&self, status: WorkerStatus, message: impl Into<String>) -> u64 {
        self.push_event(status, message.into(), None, None)
    }

    /// Append an event parsed from the worker's structured stream
    pub fn push_update(&self, update: WorkerUpdate) -> u64 {
        self.push_event(update.status, update.msg, update.duration, update.remaining)
    }

    fn push_event(
        &self,
        status: WorkerStatus,
        message: String,
        duration: Option<f64>,
        remaining: Option<f64>,
    ) -> u64 {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.pending.push(StatusEvent {
            status,
            message,
            sequence,
            duration,
            remaining,
        });
        sequence
    }

    /// Remove and return all pending events in production order.
    ///
    /// This is the only read operation; a drain with no intervening push
    /// returns an empty batch. Empty is not a terminal signal: clients keep
    /// polling until they see a `failed` or `complete` event.
    pub fn drain_all(&self) -> Vec<StatusEvent> {
        std::mem::take(&mut self.lock().pending)
    }

    /// Drop pending events without touching the sequence counter
    /// (used during cancellation, which still belongs to the current run)
    pub fn clear(&self) {
        self.lock().pending.clear();
    }

    /// Drop pending events and restart the sequence counter for a new run.
    /// Anything still queued from a previous run is stale by definition.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.pending.clear();
        inner.next_sequence = 0;
    }

    /// Number of events waiting to be drained
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_pushes_in_order() {
        let channel = UpdateChannel::new();
        channel.push(WorkerStatus::Setup, "a");
        channel.push(WorkerStatus::Progress, "b");
        channel.push(WorkerStatus::Complete, "c");

        let events = channel.drain_all();
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drain_is_destructive_and_idempotent() {
        let channel = UpdateChannel::new();
        channel.push(WorkerStatus::Progress, "only");

        assert_eq!(channel.drain_all().len(), 1);
        assert!(channel.drain_all().is_empty());
        assert!(channel.drain_all().is_empty());
    }

    #[test]
    fn test_sequence_is_monotonic_across_drains() {
        let channel = UpdateChannel::new();
        channel.push(WorkerStatus::Setup, "a");
        let first = channel.drain_all();
        channel.push(WorkerStatus::Progress, "b");
        let second = channel.drain_all();

        assert_eq!(first[0].sequence, 0);
        assert_eq!(second[0].sequence, 1);
    }

    #[test]
    fn test_clear_keeps_sequence() {
        let channel = UpdateChannel::new();
        channel.push(WorkerStatus::Setup, "a");
        channel.clear();
        let seq = channel.push(WorkerStatus::Failed, "cancelled");

        assert_eq!(seq, 1);
        assert_eq!(channel.pending_len(), 1);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let channel = UpdateChannel::new();
        channel.push(WorkerStatus::Setup, "a");
        channel.push(WorkerStatus::Progress, "b");
        channel.reset();

        assert_eq!(channel.pending_len(), 0);
        assert_eq!(channel.push(WorkerStatus::Setup, "fresh"), 0);
    }

    #[test]
    fn test_push_update_carries_progress_hints() {
        let channel = UpdateChannel::new();
        let update = WorkerUpdate::parse_line(
            r#"{"status":"setup","msg":"Resetting device.","duration":11.0}"#,
        )
        .unwrap();
        channel.push_update(update);

        let events = channel.drain_all();
        assert_eq!(events[0].duration, Some(11.0));
        assert_eq!(events[0].remaining, None);
    }
}
