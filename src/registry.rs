// # Process-Wide Pool Registry
//
// Callers that want an explicit handle should prefer
// `SessionPool::connect`; the registry exists for applications that treat
// the pool as a process-scoped resource initialized once at startup.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::Mutex;

use crate::error::{PoolError, Result};
use crate::factory::SessionFactory;
use crate::pool::SessionPool;
use crate::settings::PoolSettings;

static POOL: OnceCell<Arc<SessionPool>> = OnceCell::new();
static INIT: Mutex<()> = Mutex::const_new(());

/// Build and install the process-wide pool.
///
/// Idempotent after the first success: later calls return the existing
/// pool without touching the backend. A failed initialization installs
/// nothing and may be retried.
pub async fn initialize(
    settings: PoolSettings,
    factory: Arc<dyn SessionFactory>,
) -> Result<Arc<SessionPool>> {
    if let Some(existing) = POOL.get() {
        return Ok(Arc::clone(existing));
    }

    let _guard = INIT.lock().await;
    if let Some(existing) = POOL.get() {
        return Ok(Arc::clone(existing));
    }

    let pool = SessionPool::connect(settings, factory).await?;
    // Cannot collide: the init lock is held and the cell was empty.
    let _ = POOL.set(Arc::clone(&pool));
    Ok(pool)
}

/// The process-wide pool installed by [`initialize`].
pub fn instance() -> Result<Arc<SessionPool>> {
    POOL.get().cloned().ok_or(PoolError::NotInitialized)
}
