//! Admission control and lifecycle for concurrent investigations.
//!
//! The orchestrator bounds how many investigations run at once and holds a
//! cancellation token per active session, so individual sessions can be
//! aborted and a server shutdown reaches every in-flight loop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use inquest_core::SessionId;

/// Returned when the server is at its concurrent investigation limit.
#[derive(Debug, thiserror::Error)]
#[error("server is at capacity ({limit} concurrent investigations)")]
pub struct ServerBusy {
    /// The configured limit.
    pub limit: usize,
}

/// Bounds and tracks in-flight investigations.
pub struct Orchestrator {
    active: Arc<DashMap<SessionId, CancellationToken>>,
    permits: Arc<Semaphore>,
    root: CancellationToken,
    limit: usize,
}

impl Orchestrator {
    /// Create an orchestrator admitting at most `limit` concurrent sessions.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            active: Arc::new(DashMap::new()),
            permits: Arc::new(Semaphore::new(limit)),
            root: CancellationToken::new(),
            limit,
        }
    }

    /// Admit a session, or refuse immediately when at capacity.
    ///
    /// The returned guard holds the slot; dropping it releases the slot and
    /// deregisters the session.
    pub fn begin(&self, session_id: &SessionId) -> Result<ActiveInvestigation, ServerBusy> {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => {
                debug!(session_id = %session_id, limit = self.limit, "investigation refused");
                return Err(ServerBusy { limit: self.limit });
            }
        };

        let cancel = self.root.child_token();
        let _ = self.active.insert(session_id.clone(), cancel.clone());
        metrics::gauge!("active_investigations").increment(1.0);
        debug!(session_id = %session_id, active = self.active.len(), "investigation admitted");
        Ok(ActiveInvestigation {
            _permit: permit,
            cancel,
            session_id: session_id.clone(),
            active: Arc::clone(&self.active),
        })
    }

    /// Cancel one session by id. Returns whether it was active.
    pub fn abort(&self, session_id: &SessionId) -> bool {
        match self.active.get(session_id) {
            Some(entry) => {
                info!(session_id = %session_id, "aborting investigation");
                entry.value().cancel();
                true
            }
            None => false,
        }
    }

    /// Number of investigations currently in flight.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Cancel every in-flight investigation. New admissions still succeed
    /// with already-cancelled tokens, so callers stop the listener first.
    pub fn shutdown(&self) {
        info!(active = self.active.len(), "cancelling in-flight investigations");
        self.root.cancel();
    }
}

/// Guard for one admitted investigation.
#[derive(Debug)]
pub struct ActiveInvestigation {
    _permit: OwnedSemaphorePermit,
    cancel: CancellationToken,
    session_id: SessionId,
    active: Arc<DashMap<SessionId, CancellationToken>>,
}

impl ActiveInvestigation {
    /// Id of the admitted session.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Token cancelled by [`Orchestrator::abort`] and [`Orchestrator::shutdown`].
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for ActiveInvestigation {
    fn drop(&mut self) {
        let _ = self.active.remove(&self.session_id);
        metrics::gauge!("active_investigations").decrement(1.0);
        debug!(session_id = %self.session_id, "investigation slot released");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
