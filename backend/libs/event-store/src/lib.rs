//! Relational sink for analytics events.
//!
//! [`EventStore`] is the seam used by both services: the subscriber inserts,
//! the publisher reads counts for `/api/stats` and pings for `/api/health`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use event_schema::AnalyticsEvent;
use thiserror::Error;

#[cfg(any(test, feature = "test-util"))]
mod memory;
mod postgres;

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{field} value {value} does not fit the column")]
    OutOfRange { field: &'static str, value: u32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for [`AnalyticsEvent`] rows.
///
/// Every method is a single statement; implementations must be safe to call
/// concurrently.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert one row, returning the storage id
    async fn insert(&self, event: &AnalyticsEvent) -> StoreResult<i64>;

    async fn count_events(&self) -> StoreResult<i64>;

    /// Row counts grouped by `event_type`
    async fn count_by_type(&self) -> StoreResult<BTreeMap<String, i64>>;

    /// Cheap liveness probe
    async fn ping(&self) -> StoreResult<()>;

    /// Create the table if it does not exist yet
    async fn ensure_schema(&self) -> StoreResult<()>;
}

pub(crate) fn screen_dimension(field: &'static str, value: Option<u32>) -> StoreResult<Option<i32>> {
    value
        .map(|v| i32::try_from(v).map_err(|_| StoreError::OutOfRange { field, value: v }))
        .transpose()
}
