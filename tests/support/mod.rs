// Controllable fake driver shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use rusty_pool::{PoolError, Result, Session, SessionFactory, SharedSession};

/// A session whose liveness and close behavior the test controls.
pub struct FakeSession {
    alive: AtomicBool,
    fail_close: AtomicBool,
    closed: AtomicBool,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
            fail_close: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Make `close` report a driver error (the session is still marked
    /// closed so tests can observe the attempt).
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn is_alive(&self, _timeout: Duration) -> Result<bool> {
        Ok(self.alive.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            Err(PoolError::SessionClosed("close refused by fake".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Factory that records every session it opens.
pub struct FakeFactory {
    opened: Mutex<Vec<Arc<FakeSession>>>,
    fail_open: AtomicBool,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
        })
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    /// The n-th session this factory opened.
    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        self.opened.lock().unwrap()[index].clone()
    }

    pub fn closed_count(&self) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_closed())
            .count()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<SharedSession> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PoolError::BackendUnavailable(
                "fake backend is down".to_string(),
            ));
        }

        let session = FakeSession::new();
        self.opened.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

/// Coerce a concrete fake handle to the pool's session type without
/// re-wrapping it (identity must be preserved).
pub fn as_shared(session: &Arc<FakeSession>) -> SharedSession {
    session.clone()
}
