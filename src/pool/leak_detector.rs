// # Leak Detection
//
// Tracks the handout timestamp of every active session and periodically
// reclaims sessions whose borrowers have held them past the configured
// threshold. The detector makes no decision beyond the age comparison:
// closing a leaked session and repairing the pool's bookkeeping is the
// reclaim callback's job, supplied by the pool at construction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::Result;
use crate::session::{SessionId, SharedSession};

/// Callback that reclaims one leaked session.
///
/// The pool supplies this at construction instead of handing the detector
/// a pool reference, which keeps the back-edge one-way.
pub type ReclaimFn =
    Box<dyn Fn(SharedSession) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct LeakEntry {
    session: SharedSession,
    checked_out_at: Instant,
}

/// Registry of handed-out sessions with their handout timestamps.
pub struct LeakDetector {
    threshold: Duration,
    reclaim: ReclaimFn,
    entries: Mutex<HashMap<SessionId, LeakEntry>>,
}

impl LeakDetector {
    pub fn new(threshold: Duration, reclaim: ReclaimFn) -> Self {
        Self {
            threshold,
            reclaim,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record the handout timestamp for `session`.
    pub fn register(&self, session: &SharedSession) {
        self.entries.lock().insert(
            SessionId::of(session),
            LeakEntry {
                session: session.clone(),
                checked_out_at: Instant::now(),
            },
        );
    }

    /// Forget `session`. No-op when it was never registered.
    pub fn deregister(&self, session: &SharedSession) {
        self.deregister_id(SessionId::of(session));
    }

    pub(crate) fn deregister_id(&self, id: SessionId) {
        self.entries.lock().remove(&id);
    }

    pub fn is_registered(&self, session: &SharedSession) -> bool {
        self.entries.lock().contains_key(&SessionId::of(session))
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Reclaim every session held past the threshold.
    ///
    /// Works on a snapshot so registration and release stay unblocked
    /// while reclaim callbacks run. A failing reclaim is logged and the
    /// scan moves on; the failed session is still deregistered, since the
    /// pool has already evicted it from the active set by the time the
    /// callback reports.
    pub async fn scan(&self) {
        let snapshot: Vec<(SessionId, SharedSession, Instant)> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .map(|(id, entry)| (*id, entry.session.clone(), entry.checked_out_at))
                .collect()
        };

        let now = Instant::now();
        let mut expired = Vec::new();

        for (id, session, checked_out_at) in snapshot {
            let age = now.saturating_duration_since(checked_out_at);
            if age <= self.threshold {
                continue;
            }

            tracing::warn!(?age, threshold = ?self.threshold, "reclaiming leaked session");
            if let Err(error) = (self.reclaim)(session).await {
                tracing::warn!(%error, "leak reclamation failed");
            }
            expired.push(id);
        }

        if !expired.is_empty() {
            let mut entries = self.entries.lock();
            for id in expired {
                entries.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::FutureExt;

    use super::*;
    use crate::error::PoolError;
    use crate::session::Session;

    struct StubSession;

    #[async_trait]
    impl Session for StubSession {
        async fn is_alive(&self, _timeout: Duration) -> Result<bool> {
            Ok(true)
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn stub() -> SharedSession {
        Arc::new(StubSession)
    }

    fn counting_reclaim(counter: Arc<AtomicUsize>) -> ReclaimFn {
        Box::new(move |_session| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    #[test]
    fn register_and_deregister_round_trip() {
        let detector = LeakDetector::new(
            Duration::from_secs(60),
            counting_reclaim(Arc::new(AtomicUsize::new(0))),
        );
        let session = stub();

        assert!(!detector.is_registered(&session));
        detector.register(&session);
        assert!(detector.is_registered(&session));
        assert_eq!(detector.tracked_count(), 1);

        detector.deregister(&session);
        assert!(!detector.is_registered(&session));

        // Deregistering an unknown session is a no-op.
        detector.deregister(&stub());
        assert_eq!(detector.tracked_count(), 0);
    }

    #[tokio::test]
    async fn scan_reclaims_only_overdue_sessions() {
        let reclaimed = Arc::new(AtomicUsize::new(0));
        let detector = LeakDetector::new(Duration::from_millis(1), counting_reclaim(reclaimed.clone()));

        let overdue = stub();
        detector.register(&overdue);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fresh = stub();
        detector.register(&fresh);

        detector.scan().await;

        assert_eq!(reclaimed.load(Ordering::SeqCst), 1);
        assert!(!detector.is_registered(&overdue));
        assert!(detector.is_registered(&fresh));
    }

    #[tokio::test]
    async fn failing_reclaim_does_not_skip_other_sessions() {
        let reclaimed = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));

        let reclaim: ReclaimFn = {
            let reclaimed = reclaimed.clone();
            let attempts = attempts.clone();
            Box::new(move |_session| {
                let reclaimed = reclaimed.clone();
                let attempts = attempts.clone();
                async move {
                    // First reclamation in the scan fails.
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(PoolError::SessionClosed("broken".to_string()))
                    } else {
                        reclaimed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }
                .boxed()
            })
        };

        let detector = LeakDetector::new(Duration::from_millis(1), reclaim);
        detector.register(&stub());
        detector.register(&stub());
        tokio::time::sleep(Duration::from_millis(10)).await;

        detector.scan().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(reclaimed.load(Ordering::SeqCst), 1);
        // Both sessions are deregistered, including the failed one.
        assert_eq!(detector.tracked_count(), 0);
    }
}
