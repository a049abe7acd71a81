use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::session::SharedSession;

/// Bounded FIFO of idle sessions.
///
/// Purely non-blocking; the pool layers its deadline wait on top. The
/// queue is replaced wholesale during a capacity reconfiguration: the old
/// instance is retired so that a late `offer` against a stale reference
/// fails and the caller retries against the published queue instead of
/// stranding a session.
pub(crate) struct FreeQueue {
    slots: Mutex<QueueState>,
    bound: usize,
    // Maintained beside the queue so observers never take the lock.
    len: AtomicUsize,
}

struct QueueState {
    sessions: VecDeque<SharedSession>,
    retired: bool,
}

impl FreeQueue {
    pub fn new(bound: usize) -> Self {
        Self {
            slots: Mutex::new(QueueState {
                sessions: VecDeque::with_capacity(bound),
                retired: false,
            }),
            bound,
            len: AtomicUsize::new(0),
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Non-blocking insert. Fails when the queue is full or retired,
    /// handing the session back to the caller.
    pub fn offer(&self, session: SharedSession) -> Result<(), SharedSession> {
        let mut state = self.slots.lock();
        if state.retired || state.sessions.len() >= self.bound {
            return Err(session);
        }

        state.sessions.push_back(session);
        self.len.store(state.sessions.len(), Ordering::Release);
        Ok(())
    }

    /// Non-blocking removal in FIFO order.
    pub fn try_poll(&self) -> Option<SharedSession> {
        let mut state = self.slots.lock();
        let session = state.sessions.pop_front()?;
        self.len.store(state.sessions.len(), Ordering::Release);
        Some(session)
    }

    pub fn is_retired(&self) -> bool {
        self.slots.lock().retired
    }

    /// Take the queue out of service: mark it retired and drain whatever
    /// it holds, in FIFO order. Any `offer` racing with the swap lands
    /// either in the drained result or in the caller's retry against the
    /// replacement queue, never in limbo.
    pub fn retire(&self) -> VecDeque<SharedSession> {
        let mut state = self.slots.lock();
        state.retired = true;
        self.len.store(0, Ordering::Release);
        std::mem::take(&mut state.sessions)
    }
}
