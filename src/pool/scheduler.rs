use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::MissedTickBehavior;

/// A task run on every scheduler tick.
pub type PeriodicTask = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Periodic task executor driving the leak scanner.
///
/// Kept behind a trait so tests can substitute a manual ticker and drive
/// scans directly.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period`, at a fixed rate, until the returned
    /// handle is cancelled or dropped.
    fn schedule_periodic(&self, period: Duration, task: PeriodicTask) -> ScheduleHandle;
}

/// Handle to a scheduled task; cancels the task when dropped.
pub struct ScheduleHandle {
    task: tokio::task::JoinHandle<()>,
}

impl ScheduleHandle {
    /// Wrap a spawned task so custom schedulers can participate in the
    /// pool's cancel-on-close behavior.
    pub fn new(task: tokio::task::JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Scheduler backed by a spawned tokio task and [`tokio::time::interval`].
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_periodic(&self, period: Duration, task: PeriodicTask) -> ScheduleHandle {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first run lands one full period out.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                task().await;
            }
        });

        ScheduleHandle::new(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::FutureExt;

    use super::*;

    fn counting_task(counter: Arc<AtomicUsize>) -> PeriodicTask {
        Box::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn runs_repeatedly_at_the_configured_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle =
            TokioScheduler.schedule_periodic(Duration::from_millis(10), counting_task(runs.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2, "task should fire more than once");
        drop(handle);
    }

    #[tokio::test]
    async fn cancel_stops_the_task() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle =
            TokioScheduler.schedule_periodic(Duration::from_millis(5), counting_task(runs.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
        let seen = runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }
}
