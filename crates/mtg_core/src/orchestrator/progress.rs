//! One-way progress events from the orchestrator to observers.
//!
//! Each subscriber gets its own bounded queue. Emitting never blocks and
//! never fails: when a queue is full the new event is dropped and counted,
//! and a subscriber that went away is skipped from then on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

use super::errors::StageError;

/// Default queue length for a subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

/// What happened at a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// A stage started.
    Started,
    /// A stage failed but handed on partial data.
    Degraded,
    /// A stage failed and the run stops.
    Failed,
    /// The run finished every stage.
    Completed,
    /// The run stopped early (failure or cancellation).
    Aborted,
}

/// Snapshot of a state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Ordinal of the stage concerned (for terminal events, the last stage reached).
    pub ordinal: u32,
    pub total: u32,
    pub label: String,
    pub phase: ProgressPhase,
    /// Set on `Degraded` and `Failed`, and on `Aborted` after cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, ProgressPhase::Completed | ProgressPhase::Aborted)
    }

    /// "Step 2/6: Extracting and transcribing audio" style line.
    pub fn display_line(&self) -> String {
        match (&self.phase, &self.error) {
            (ProgressPhase::Started, _) => {
                format!("Step {}/{}: {}", self.ordinal, self.total, self.label)
            }
            (ProgressPhase::Degraded, Some(e)) => {
                format!("  Degraded: {} ({})", e.message, e.kind)
            }
            (ProgressPhase::Failed, Some(e)) => format!("  Failed: {} ({})", e.message, e.kind),
            (ProgressPhase::Aborted, Some(e)) => format!("{} ({})", self.label, e.kind),
            _ => self.label.clone(),
        }
    }
}

struct Subscriber {
    tx: SyncSender<ProgressEvent>,
    dropped: Arc<AtomicU64>,
    closed: bool,
}

/// Fan-out of progress events to bounded subscriber queues.
#[derive(Default)]
pub struct ProgressChannel {
    subscribers: Vec<Subscriber>,
    terminal_sent: bool,
    last_ordinal: u32,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber with a queue of `capacity` events.
    pub fn subscribe(&mut self, capacity: usize) -> ProgressReceiver {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers.push(Subscriber {
            tx,
            dropped: Arc::clone(&dropped),
            closed: false,
        });
        ProgressReceiver { rx, dropped }
    }

    /// Add a subscriber served by its own thread, so a slow callback only
    /// delays itself.
    pub fn subscribe_callback<F>(&mut self, callback: F) -> std::io::Result<CallbackSubscription>
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        let receiver = self.subscribe(DEFAULT_CAPACITY);
        let dropped = Arc::clone(&receiver.dropped);
        let mut callback = callback;
        let handle = thread::Builder::new()
            .name("progress-forwarder".to_string())
            .spawn(move || {
                for event in receiver.rx.iter() {
                    callback(&event);
                }
            })?;
        Ok(CallbackSubscription { handle, dropped })
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|s| !s.closed).count()
    }

    /// Deliver `event` to every live subscriber without blocking.
    ///
    /// Events after the terminal event, and events whose ordinal goes
    /// backwards, are discarded.
    pub fn emit(&mut self, event: ProgressEvent) {
        if self.terminal_sent {
            tracing::debug!("[Progress] Ignoring event after terminal: {:?}", event.phase);
            return;
        }
        if event.ordinal < self.last_ordinal {
            tracing::debug!(
                "[Progress] Ignoring out-of-order event {} < {}",
                event.ordinal,
                self.last_ordinal
            );
            return;
        }
        self.last_ordinal = event.ordinal;
        self.terminal_sent = event.is_terminal();

        for sub in self.subscribers.iter_mut().filter(|s| !s.closed) {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => {
                    sub.closed = true;
                }
            }
        }
    }
}

/// Receiving end of one subscription.
pub struct ProgressReceiver {
    rx: Receiver<ProgressEvent>,
    dropped: Arc<AtomicU64>,
}

impl ProgressReceiver {
    /// Block until the next event; `None` once the run is over and the
    /// queue is drained.
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<ProgressEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<ProgressEvent, TryRecvError> {
        self.rx.try_recv()
    }

    /// Events received so far and still queued.
    pub fn drain(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }

    /// Events discarded because this queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Iterator for ProgressReceiver {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<ProgressEvent> {
        self.recv()
    }
}

/// A callback subscription's forwarding thread.
pub struct CallbackSubscription {
    handle: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl CallbackSubscription {
    /// Wait until every delivered event has been handed to the callback.
    /// Returns once the orchestrator (and its channel) is gone.
    pub fn join(self) {
        if self.handle.join().is_err() {
            tracing::warn!("[Progress] Progress callback panicked");
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ErrorKind;
    use std::sync::Mutex;

    fn event(ordinal: u32, phase: ProgressPhase) -> ProgressEvent {
        ProgressEvent {
            ordinal,
            total: 6,
            label: format!("stage {}", ordinal),
            phase,
            error: None,
        }
    }

    #[test]
    fn every_subscriber_gets_every_event() {
        let mut channel = ProgressChannel::new();
        let a = channel.subscribe(8);
        let b = channel.subscribe(8);

        channel.emit(event(1, ProgressPhase::Started));
        channel.emit(event(2, ProgressPhase::Started));

        assert_eq!(a.drain().len(), 2);
        assert_eq!(b.drain().len(), 2);
    }

    #[test]
    fn full_queue_drops_new_events_without_blocking() {
        let mut channel = ProgressChannel::new();
        let slow = channel.subscribe(1);

        channel.emit(event(1, ProgressPhase::Started));
        channel.emit(event(2, ProgressPhase::Started));
        channel.emit(event(3, ProgressPhase::Started));

        assert_eq!(slow.dropped(), 2);
        let kept = slow.drain();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].ordinal, 1);
    }

    #[test]
    fn disconnected_subscribers_are_skipped() {
        let mut channel = ProgressChannel::new();
        let gone = channel.subscribe(4);
        let kept = channel.subscribe(4);
        drop(gone);

        channel.emit(event(1, ProgressPhase::Started));
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(kept.drain().len(), 1);
    }

    #[test]
    fn only_one_terminal_event() {
        let mut channel = ProgressChannel::new();
        let rx = channel.subscribe(8);

        channel.emit(event(6, ProgressPhase::Completed));
        channel.emit(event(6, ProgressPhase::Aborted));
        channel.emit(event(6, ProgressPhase::Started));

        let events = rx.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, ProgressPhase::Completed);
    }

    #[test]
    fn ordinals_never_decrease() {
        let mut channel = ProgressChannel::new();
        let rx = channel.subscribe(8);

        channel.emit(event(3, ProgressPhase::Started));
        channel.emit(event(2, ProgressPhase::Started));

        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn callback_runs_on_forwarding_thread() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut channel = ProgressChannel::new();
        let sub = channel
            .subscribe_callback(move |e| sink.lock().unwrap().push(e.ordinal))
            .unwrap();

        channel.emit(event(1, ProgressPhase::Started));
        channel.emit(event(1, ProgressPhase::Degraded));
        channel.emit(event(6, ProgressPhase::Completed));
        drop(channel);
        sub.join();

        assert_eq!(*seen.lock().unwrap(), vec![1, 1, 6]);
    }

    #[test]
    fn display_lines() {
        let mut e = event(2, ProgressPhase::Started);
        e.label = "Extracting and transcribing audio".into();
        assert_eq!(e.display_line(), "Step 2/6: Extracting and transcribing audio");

        e.phase = ProgressPhase::Degraded;
        e.error = Some(StageError::new(ErrorKind::Service, "unreachable"));
        assert_eq!(e.display_line(), "  Degraded: unreachable (ServiceError)");
    }
}
