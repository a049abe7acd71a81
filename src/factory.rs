use async_trait::async_trait;

use crate::error::Result;
use crate::session::SharedSession;

/// Opens database sessions on demand.
///
/// Implementations wrap a concrete driver and the credentials it needs.
/// Every call establishes a fresh session; the factory itself does no
/// pooling or caching. Failure to reach the backend is reported as
/// [`PoolError::BackendUnavailable`](crate::PoolError::BackendUnavailable).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<SharedSession>;
}
