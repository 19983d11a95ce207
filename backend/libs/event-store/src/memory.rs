use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use event_schema::AnalyticsEvent;
use parking_lot::Mutex;

use crate::{screen_dimension, EventStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Shared {
    rows: Mutex<Vec<AnalyticsEvent>>,
    severed: AtomicBool,
    insert_attempts: AtomicUsize,
}

/// Insert-ordered in-memory store.
///
/// [`sever`](Self::sever) makes every call fail as if the database connection
/// were lost; [`restore`](Self::restore) brings it back with the rows intact.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    shared: Arc<Shared>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sever(&self) {
        self.shared.severed.store(true, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.shared.severed.store(false, Ordering::SeqCst);
    }

    /// Number of `insert` calls, including failed ones
    pub fn insert_attempts(&self) -> usize {
        self.shared.insert_attempts.load(Ordering::SeqCst)
    }

    /// Snapshot of stored events in insert order
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.shared.rows.lock().clone()
    }

    fn check(&self) -> StoreResult<()> {
        if self.shared.severed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection severed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: &AnalyticsEvent) -> StoreResult<i64> {
        let available = self.check();
        self.shared.insert_attempts.fetch_add(1, Ordering::SeqCst);
        available?;
        screen_dimension("screen_width", event.screen_width)?;
        screen_dimension("screen_height", event.screen_height)?;

        let mut rows = self.shared.rows.lock();
        rows.push(event.clone());
        // BIGSERIAL starts at 1
        Ok(rows.len() as i64)
    }

    async fn count_events(&self) -> StoreResult<i64> {
        self.check()?;
        Ok(self.shared.rows.lock().len() as i64)
    }

    async fn count_by_type(&self) -> StoreResult<BTreeMap<String, i64>> {
        self.check()?;
        let mut counts = BTreeMap::new();
        for event in self.shared.rows.lock().iter() {
            *counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.check()
    }
}
