//! Partition subscriber: relays each committed event into the store.
//!
//! One cursor, one loop, strictly in offset order. Each arrival is either a
//! data message (decode, insert), a transport error (log, back off, continue)
//! or the shutdown signal (stop and release the cursor and store).
//!
//! Undecodable or invalid payloads are skipped. A failed insert is retried in
//! place a bounded number of times; after that the event is logged with its
//! offset and the cursor moves on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use broker_transport::{BrokerMessage, PartitionCursor};
use event_schema::AnalyticsEvent;
use event_store::EventStore;
use resilience::{with_retry, with_timeout_result, RetryConfig};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const DEFAULT_INSERT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Starting,
    Listening,
    Processing,
    ShuttingDown,
    Stopped,
}

/// Counters reported when the loop stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeStats {
    pub persisted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub transport_errors: u64,
}

enum Outcome {
    Persisted,
    Skipped,
    Failed,
}

pub struct EventSubscriber<C> {
    cursor: C,
    store: Arc<dyn EventStore>,
    insert_retry: RetryConfig,
    insert_timeout: Duration,
    error_backoff: Duration,
    state: watch::Sender<SubscriberState>,
    stats: ConsumeStats,
}

impl<C: PartitionCursor> EventSubscriber<C> {
    pub fn new(cursor: C, store: Arc<dyn EventStore>) -> Self {
        let (state, _) = watch::channel(SubscriberState::Starting);
        Self {
            cursor,
            store,
            insert_retry: RetryConfig::fixed(3, Duration::from_millis(500)),
            insert_timeout: DEFAULT_INSERT_TIMEOUT,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            state,
            stats: ConsumeStats::default(),
        }
    }

    pub fn with_insert_retry(mut self, retry: RetryConfig, timeout: Duration) -> Self {
        self.insert_retry = retry;
        self.insert_timeout = timeout;
        self
    }

    /// Pause after a transport error before reading again
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Observe state transitions, including the final `Stopped`
    pub fn watch_state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Consume until `shutdown` resolves.
    ///
    /// A message already being processed is finished before the loop exits.
    pub async fn run<F>(mut self, shutdown: F) -> ConsumeStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.transition(SubscriberState::Listening);
        info!("Subscriber listening");

        loop {
            let arrival = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.cursor.next_message() => Some(result),
            };

            match arrival {
                None => break,
                Some(Ok(message)) => {
                    self.transition(SubscriberState::Processing);
                    self.process(message).await;
                    self.transition(SubscriberState::Listening);
                }
                Some(Err(e)) => {
                    self.stats.transport_errors += 1;
                    error!(error = %e, "Consumer transport error");

                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        self.transition(SubscriberState::ShuttingDown);
        let EventSubscriber {
            cursor,
            store,
            state,
            stats,
            ..
        } = self;
        drop(cursor);
        drop(store);

        state.send_replace(SubscriberState::Stopped);
        info!(
            persisted = stats.persisted,
            skipped = stats.skipped,
            failed = stats.failed,
            transport_errors = stats.transport_errors,
            "Subscriber stopped"
        );
        stats
    }

    fn transition(&self, next: SubscriberState) {
        self.state.send_replace(next);
    }

    async fn process(&mut self, message: BrokerMessage) {
        debug!(offset = message.offset, "Processing message");

        match self.persist(message).await {
            Outcome::Persisted => self.stats.persisted += 1,
            Outcome::Skipped => self.stats.skipped += 1,
            Outcome::Failed => self.stats.failed += 1,
        }
    }

    async fn persist(&self, message: BrokerMessage) -> Outcome {
        let offset = message.offset;

        let Some(payload) = message.payload else {
            warn!(offset, "Skipping message without payload");
            return Outcome::Skipped;
        };

        let event = match AnalyticsEvent::from_json(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(offset, error = %e, "Skipping undecodable event");
                return Outcome::Skipped;
            }
        };

        let store = &self.store;
        let event = &event;
        let timeout = self.insert_timeout;

        let result = with_retry(self.insert_retry.clone(), || async move {
            with_timeout_result(timeout, store.insert(event)).await
        })
        .await;

        match result {
            Ok(id) => {
                info!(
                    offset,
                    id,
                    event_type = %event.event_type,
                    page = %event.page,
                    "Event saved to database"
                );
                Outcome::Persisted
            }
            Err(e) => {
                error!(
                    offset,
                    event_type = %event.event_type,
                    error = %e,
                    "Dropping event after failed inserts"
                );
                Outcome::Failed
            }
        }
    }
}
