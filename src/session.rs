use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// An open database session.
///
/// The pool treats sessions as opaque handles: it only probes liveness
/// before handing one out (and before re-queueing it) and closes sessions
/// it discards. Everything else about the underlying connection belongs to
/// the driver behind the trait.
#[async_trait]
pub trait Session: Send + Sync {
    /// Probe whether the underlying connection is still usable.
    ///
    /// `timeout` is the probe budget; implementations that talk to the
    /// network should give up within it. The pool additionally enforces
    /// the budget from the outside, so a misbehaving probe cannot stall a
    /// borrower indefinitely.
    async fn is_alive(&self, timeout: Duration) -> Result<bool>;

    /// Close the underlying connection.
    ///
    /// Called when a session fails validation, is culled by a shrink, is
    /// reclaimed as leaked, or cannot be re-queued on return.
    async fn close(&self) -> Result<()>;
}

/// Shared handle to a pooled session.
///
/// Handles are shared because the leak scanner closes sessions that a
/// borrower still holds.
pub type SharedSession = Arc<dyn Session>;

impl std::fmt::Debug for dyn Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Session").finish_non_exhaustive()
    }
}

/// Identity of a session handle.
///
/// Derived from the handle's allocation address, so two clones of the same
/// `SharedSession` share an id. Callers must not re-wrap a handed-out
/// session in a new `Arc` (or any proxy) before passing it back to
/// `release` or the pool observers: the re-wrapped handle would carry a
/// different identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(usize);

impl SessionId {
    pub fn of(session: &SharedSession) -> Self {
        SessionId(Arc::as_ptr(session) as *const () as usize)
    }
}
