//! Per-session event emission over a bounded, strictly ordered channel.
//!
//! One emitter/receiver pair exists per investigation. Frames arrive at the
//! consumer in exactly the order they were emitted; when the consumer stalls
//! long enough to fill the backlog, emission fails and the session ends with
//! a backlog error rather than silently dropping frames.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use inquest_core::InvestigationEvent;

/// Receiving half of a session's event stream.
pub type EventReceiver = mpsc::Receiver<InvestigationEvent>;

/// Why an emission failed. Both cases end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    /// The backlog is full; the consumer is not keeping up.
    #[error("event backlog full (capacity {capacity})")]
    Overflow {
        /// Configured backlog capacity.
        capacity: usize,
    },

    /// The consumer dropped its receiver.
    #[error("event stream closed by consumer")]
    Closed,
}

/// Create an emitter/receiver pair with the given backlog capacity.
#[must_use]
pub fn channel(capacity: usize) -> (EventEmitter, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventEmitter {
            tx,
            capacity: capacity.max(1),
            emitted: AtomicU64::new(0),
        },
        rx,
    )
}

/// Sending half of a session's event stream.
pub struct EventEmitter {
    tx: mpsc::Sender<InvestigationEvent>,
    capacity: usize,
    emitted: AtomicU64,
}

impl EventEmitter {
    /// Emit one frame.
    ///
    /// Never blocks: a full backlog is an error, not a wait.
    pub fn emit(&self, event: InvestigationEvent) -> Result<(), EmitError> {
        let name = event.event_name();
        match self.tx.try_send(event) {
            Ok(()) => {
                let _ = self.emitted.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("investigation_events_total", "event" => name).increment(1);
                trace!(event = name, "frame emitted");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(EmitError::Overflow {
                capacity: self.capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EmitError::Closed),
        }
    }

    /// Number of frames successfully emitted so far.
    #[must_use]
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Configured backlog capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
