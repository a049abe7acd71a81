// # Session Pool Manager
//
// The pool manager owns the borrow/return protocol and the capacity
// policy:
//
// - **Acquire**: grow the capacity ceiling under high load, top the free
//   queue up when it runs empty, pop with a bounded wait, revalidate the
//   session before handout, then record it in the active set and with the
//   leak detector.
// - **Release**: revalidate, re-queue or close, then evaluate the shrink
//   policy with hysteresis so a momentary lull does not thrash capacity.
// - **Reclaim**: the leak scanner calls back into `reclaim_leaked` for
//   sessions held past the threshold.
//
// Hot paths touch only atomics and the concurrent containers; the three
// sizing decisions (grow, top-up, shrink) serialize on a single sizing
// lock. `reclaim_leaked` never takes that lock, so a scan cannot deadlock
// with a concurrent reconfiguration.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::timeout;

use crate::error::{PoolError, Result};
use crate::factory::SessionFactory;
use crate::pool::free_queue::FreeQueue;
use crate::pool::leak_detector::{LeakDetector, ReclaimFn};
use crate::pool::scheduler::{PeriodicTask, ScheduleHandle, Scheduler, TokioScheduler};
use crate::pool::stats::{PoolStats, StatsRecorder};
use crate::session::{SessionId, SharedSession};
use crate::settings::PoolSettings;

/// Elastic session pool.
///
/// See the module header for the protocol. Observers key on handle
/// identity ([`SessionId`]); callers must not re-wrap a handed-out
/// session before passing it back.
pub struct SessionPool {
    settings: PoolSettings,
    factory: Arc<dyn SessionFactory>,

    /// Current capacity bound, within `[baseline_capacity, max_capacity]`.
    capacity: AtomicUsize,

    /// Published free queue; replaced wholesale on grow/shrink. Readers
    /// clone the `Arc` and keep operating on a valid queue across a swap.
    free: RwLock<Arc<FreeQueue>>,

    /// Wakes bounded-wait pollers when a session is offered.
    free_signal: Notify,

    /// Sessions currently held by borrowers.
    active: DashMap<SessionId, SharedSession>,

    /// Cardinality of `active`, kept as a counter for cheap ratio tests.
    active_count: AtomicUsize,

    /// Consecutive low-load observations on the release path.
    low_load_streak: AtomicU32,

    /// Serializes grow, top-up and shrink.
    sizing: AsyncMutex<()>,

    leak_detector: Arc<LeakDetector>,
    scheduler: Box<dyn Scheduler>,
    leak_armed: AtomicBool,
    scan_handle: Mutex<Option<ScheduleHandle>>,

    closed: AtomicBool,
    stats: StatsRecorder,
}

impl SessionPool {
    /// Create a pool and eagerly open its initial fill of sessions.
    pub async fn connect(
        settings: PoolSettings,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Arc<Self>> {
        Self::connect_with_scheduler(settings, factory, Box::new(TokioScheduler)).await
    }

    /// As [`SessionPool::connect`], with an injected scheduler. Intended
    /// for tests that drive the leak scan manually.
    pub async fn connect_with_scheduler(
        settings: PoolSettings,
        factory: Arc<dyn SessionFactory>,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Arc<Self>> {
        settings.validate()?;

        let baseline = settings.baseline_capacity;
        let leak_threshold = settings.leak_threshold;

        let pool = Arc::new_cyclic(|weak: &Weak<SessionPool>| {
            let reclaim: ReclaimFn = {
                let weak = weak.clone();
                Box::new(move |session: SharedSession| {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(pool) => pool.reclaim_leaked(&session).await,
                            None => Ok(()),
                        }
                    }
                    .boxed()
                })
            };

            Self {
                settings,
                factory,
                capacity: AtomicUsize::new(baseline),
                free: RwLock::new(Arc::new(FreeQueue::new(baseline))),
                free_signal: Notify::new(),
                active: DashMap::new(),
                active_count: AtomicUsize::new(0),
                low_load_streak: AtomicU32::new(0),
                sizing: AsyncMutex::new(()),
                leak_detector: Arc::new(LeakDetector::new(leak_threshold, reclaim)),
                scheduler,
                leak_armed: AtomicBool::new(false),
                scan_handle: Mutex::new(None),
                closed: AtomicBool::new(false),
                stats: StatsRecorder::default(),
            }
        });

        pool.fill_initial().await?;
        Ok(pool)
    }

    async fn fill_initial(&self) -> Result<()> {
        let target = self
            .settings
            .initial_fill
            .min(self.capacity.load(Ordering::SeqCst));

        for _ in 0..target {
            let session = self.open_session().await?;
            self.offer_free(session).await;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Borrow / return
    // ------------------------------------------------------------------

    /// Borrow a validated session.
    ///
    /// On success the session is in the active set, registered with the
    /// leak detector, and the leak scanner is armed.
    pub async fn acquire(&self) -> Result<SharedSession> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::PoolClosed);
        }

        self.stats.record_acquire();

        self.handle_high_load().await;
        if self.free_count() == 0 {
            self.top_up().await?;
        }

        let deadline = Instant::now() + self.settings.acquire_timeout;
        let session = match self.poll_free(deadline).await {
            Some(session) => session,
            None => {
                self.stats.record_acquire_timeout();
                return Err(PoolError::AcquireTimeout(self.settings.acquire_timeout));
            }
        };

        let session = self.ensure_alive_on_handout(session).await?;

        self.active.insert(SessionId::of(&session), session.clone());
        self.active_count.fetch_add(1, Ordering::SeqCst);
        self.leak_detector.register(&session);
        self.arm_leak_scan();

        tracing::debug!(
            active = self.active_count(),
            free = self.free_count(),
            "session handed out"
        );
        Ok(session)
    }

    /// Return a borrowed session.
    ///
    /// The session is revalidated: a healthy session re-enters the free
    /// queue, a dead one (or one returned to a full queue) is closed.
    /// Returning a session the pool does not know closes it without
    /// touching any bookkeeping.
    pub async fn release(&self, session: SharedSession) -> Result<()> {
        let id = SessionId::of(&session);

        if self.active.remove(&id).is_none() {
            tracing::warn!("released session is unknown to the pool, closing it");
            self.close_session_logged(&session).await;
            return Ok(());
        }

        if self.probe(&session).await {
            self.offer_free(session).await;
        } else {
            self.stats.record_validation_failure();
            tracing::warn!("session failed liveness check on return, discarding");
            self.close_session_logged(&session).await;
        }

        self.active_count.fetch_sub(1, Ordering::SeqCst);
        self.leak_detector.deregister_id(id);
        self.handle_low_load().await;

        tracing::debug!(
            active = self.active_count(),
            free = self.free_count(),
            "session returned"
        );
        Ok(())
    }

    /// Forcibly take back a leaked session. Invoked by the leak scanner.
    ///
    /// Removes the session from the active set and closes it. Never
    /// touches the free queue, capacity, hysteresis, or the sizing lock.
    pub async fn reclaim_leaked(&self, session: &SharedSession) -> Result<()> {
        if self.active.remove(&SessionId::of(session)).is_some() {
            self.active_count.fetch_sub(1, Ordering::SeqCst);
        }

        self.stats.record_leak_reclaimed();
        self.close_session(session).await
    }

    /// Close the pool: stop the leak scanner and close all idle sessions.
    ///
    /// Outstanding sessions are closed as they come back through
    /// `release`. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.scan_handle.lock().take() {
            handle.cancel();
        }

        let drained = self.free.read().retire();
        for session in drained {
            self.close_session_logged(&session).await;
        }

        tracing::info!("session pool closed");
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn free_count(&self) -> usize {
        self.free.read().len()
    }

    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Whether `session` is currently held by a borrower. Keyed on handle
    /// identity; a re-wrapped handle will not match.
    pub fn is_active(&self, session: &SharedSession) -> bool {
        self.active.contains_key(&SessionId::of(session))
    }

    pub fn is_leak_scan_armed(&self) -> bool {
        self.leak_armed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn low_load_streak(&self) -> u32 {
        self.low_load_streak.load(Ordering::SeqCst)
    }

    pub fn leak_detector(&self) -> &LeakDetector {
        &self.leak_detector
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    // ------------------------------------------------------------------
    // Sizing policy
    // ------------------------------------------------------------------

    fn load_ratio(&self) -> f64 {
        let capacity = self.capacity.load(Ordering::SeqCst);
        self.active_count.load(Ordering::SeqCst) as f64 / capacity as f64
    }

    /// Raise the capacity ceiling when load is high. Does not open any
    /// sessions; an empty free queue still needs the top-up path.
    async fn handle_high_load(&self) {
        if self.load_ratio() < self.settings.high_load_ratio
            || self.capacity.load(Ordering::SeqCst) >= self.settings.max_capacity
        {
            return;
        }

        let _sizing = self.sizing.lock().await;

        // Re-check under the lock; another borrower may have grown first.
        let capacity = self.capacity.load(Ordering::SeqCst);
        if self.load_ratio() < self.settings.high_load_ratio
            || capacity >= self.settings.max_capacity
        {
            return;
        }

        let grown = (capacity as f64 * self.settings.grow_factor) as usize;
        let new_capacity = grown.min(self.settings.max_capacity);
        if new_capacity <= capacity {
            return;
        }

        let replacement = Arc::new(FreeQueue::new(new_capacity));
        {
            let mut published = self.free.write();
            for session in published.retire() {
                // Everything fits: the replacement bound is larger.
                let _ = replacement.offer(session);
            }
            *published = replacement;
        }
        self.capacity.store(new_capacity, Ordering::SeqCst);

        self.stats.record_grow();
        tracing::info!(from = capacity, to = new_capacity, "pool capacity grown");
    }

    /// Open a batch of fresh sessions when the free queue has run dry.
    async fn top_up(&self) -> Result<()> {
        let _sizing = self.sizing.lock().await;

        // Another borrower may have topped up while we waited.
        if self.free_count() > 0 {
            return Ok(());
        }

        let capacity = self.capacity.load(Ordering::SeqCst);
        let mut batch = ((capacity as f64 * self.settings.top_up_factor) as usize)
            .min(self.settings.max_top_up);
        if batch == 0 {
            // Guarantee forward progress even for tiny pools.
            batch = 1;
        }

        tracing::info!(batch, capacity, "free queue empty, opening fresh sessions");

        for _ in 0..batch {
            if self.free_count() >= capacity {
                break;
            }
            let session = self.open_session().await?;
            self.offer_free(session).await;
        }

        Ok(())
    }

    /// Evaluate the shrink policy after a release.
    async fn handle_low_load(&self) {
        if self.capacity.load(Ordering::SeqCst) == self.settings.baseline_capacity {
            return;
        }

        let _sizing = self.sizing.lock().await;

        let capacity = self.capacity.load(Ordering::SeqCst);
        if capacity == self.settings.baseline_capacity {
            return;
        }

        if self.load_ratio() >= self.settings.low_load_ratio {
            self.low_load_streak.store(0, Ordering::SeqCst);
            return;
        }

        let streak = self.low_load_streak.fetch_add(1, Ordering::SeqCst) + 1;
        if streak < self.settings.low_load_hysteresis {
            return;
        }

        let target = self.shrink_target(capacity, self.active_count.load(Ordering::SeqCst));
        if target < capacity {
            self.shrink_to(target).await;
        }
        self.low_load_streak.store(0, Ordering::SeqCst);
    }

    /// Shrink target: keep room for every active borrower, never go below
    /// the baseline, and otherwise cut capacity by the shrink factor.
    fn shrink_target(&self, capacity: usize, active: usize) -> usize {
        let floor = self.settings.baseline_capacity.max(active);
        let shrunk = (capacity as f64 * self.settings.shrink_factor) as usize;
        floor.min(shrunk).max(self.settings.baseline_capacity)
    }

    /// Reconfigure the free queue down to `new_capacity`, closing idle
    /// sessions over the new bound. Caller holds the sizing lock.
    async fn shrink_to(&self, new_capacity: usize) {
        let old_capacity = self.capacity.swap(new_capacity, Ordering::SeqCst);

        let replacement = Arc::new(FreeQueue::new(new_capacity));
        let mut culled = Vec::new();
        {
            let mut published = self.free.write();
            let mut drained: VecDeque<SharedSession> = published.retire();
            while drained.len() > new_capacity {
                // Oldest idle sessions go first.
                if let Some(session) = drained.pop_front() {
                    culled.push(session);
                }
            }
            for session in drained {
                let _ = replacement.offer(session);
            }
            *published = replacement;
        }

        for session in culled {
            debug_assert!(
                !self.is_active(&session),
                "session drained from the free queue is also in the active set"
            );
            self.close_session_logged(&session).await;
        }

        self.stats.record_shrink();
        tracing::info!(from = old_capacity, to = new_capacity, "pool capacity shrunk");
    }

    // ------------------------------------------------------------------
    // Session plumbing
    // ------------------------------------------------------------------

    async fn open_session(&self) -> Result<SharedSession> {
        let session = self.factory.open().await?;
        self.stats.record_session_opened();
        Ok(session)
    }

    async fn close_session(&self, session: &SharedSession) -> Result<()> {
        self.stats.record_session_closed();
        session.close().await
    }

    async fn close_session_logged(&self, session: &SharedSession) {
        if let Err(error) = self.close_session(session).await {
            tracing::warn!(%error, "session close failed");
        }
    }

    /// Put an idle session into the published free queue, retrying across
    /// a concurrent queue swap. Closes the session when the pool is
    /// closed or the queue is full.
    async fn offer_free(&self, session: SharedSession) {
        let mut session = session;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                self.close_session_logged(&session).await;
                return;
            }

            let queue = self.free.read().clone();
            match queue.offer(session) {
                Ok(()) => {
                    self.free_signal.notify_one();
                    return;
                }
                Err(rejected) => {
                    if queue.is_retired() {
                        // Lost a race with a grow/shrink swap; retry
                        // against the newly published queue.
                        session = rejected;
                        continue;
                    }
                    tracing::warn!("free queue full, closing surplus session");
                    self.close_session_logged(&rejected).await;
                    return;
                }
            }
        }
    }

    /// Pop the next idle session, waiting up to the deadline.
    async fn poll_free(&self, deadline: Instant) -> Option<SharedSession> {
        loop {
            let queue = self.free.read().clone();
            if let Some(session) = queue.try_poll() {
                return Some(session);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let wait = self.free_signal.notified();
            if timeout(deadline - now, wait).await.is_err() {
                // Deadline expired while parked; one last look.
                return self.free.read().try_poll();
            }
        }
    }

    /// Probe liveness within the configured validation budget. A probe
    /// error or timeout counts as dead.
    async fn probe(&self, session: &SharedSession) -> bool {
        let budget = self.settings.validation_timeout;
        match timeout(budget, session.is_alive(budget)).await {
            Ok(Ok(alive)) => alive,
            Ok(Err(error)) => {
                tracing::warn!(%error, "liveness probe failed");
                false
            }
            Err(_) => {
                tracing::warn!(?budget, "liveness probe timed out");
                false
            }
        }
    }

    /// Validate a popped session before handout, replacing it with a
    /// fresh one from the factory when it turns out dead.
    async fn ensure_alive_on_handout(&self, session: SharedSession) -> Result<SharedSession> {
        if self.probe(&session).await {
            return Ok(session);
        }

        self.stats.record_validation_failure();
        tracing::warn!("session failed liveness check at handout, replacing");

        // Not registered yet on the handout path; deregister is a no-op
        // then, but keeps the detector consistent on every discard path.
        self.leak_detector.deregister(&session);
        self.close_session_logged(&session).await;

        self.open_session().await
    }

    fn arm_leak_scan(&self) {
        if self
            .leak_armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let detector = Arc::clone(&self.leak_detector);
        let task: PeriodicTask = Box::new(move || {
            let detector = Arc::clone(&detector);
            async move { detector.scan().await }.boxed()
        });

        let handle = self
            .scheduler
            .schedule_periodic(self.settings.leak_scan_interval, task);
        *self.scan_handle.lock() = Some(handle);
    }
}
