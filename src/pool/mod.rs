// # Session Pooling
//
// The pool manager and its collaborators:
//
// - `session_pool`: borrow/return protocol, active-set bookkeeping and
//   the elastic sizing policy
// - `free_queue`: bounded FIFO of idle sessions (internal)
// - `leak_detector`: handout-timestamp registry and the reclaim scan
// - `scheduler`: periodic executor driving the scan
// - `stats`: advisory lifetime counters

mod free_queue;
pub mod leak_detector;
pub mod scheduler;
pub mod session_pool;
pub mod stats;

pub use leak_detector::{LeakDetector, ReclaimFn};
pub use scheduler::{PeriodicTask, ScheduleHandle, Scheduler, TokioScheduler};
pub use session_pool::SessionPool;
pub use stats::PoolStats;
