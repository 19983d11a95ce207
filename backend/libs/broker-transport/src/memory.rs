//! In-process partition log for tests

use std::sync::Arc;

use async_trait::async_trait;
use event_schema::{Placement, DEFAULT_PARTITION};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::cursor::{BrokerMessage, PartitionCursor};
use crate::error::{ConsumeError, PublishError};
use crate::publisher::EventPublisher;

#[derive(Debug, Clone)]
enum Entry {
    Record { offset: i64, payload: Option<Vec<u8>> },
    TransportError(String),
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<Entry>,
    next_offset: i64,
    send_attempts: usize,
    fail_publishes: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LogState>,
    appended: Notify,
}

/// Single-partition log shared by any number of publishers and cursors.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    shared: Arc<Shared>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `publish` calls, successful or not
    pub fn send_count(&self) -> usize {
        self.shared.state.lock().send_attempts
    }

    /// Make subsequent `publish` calls fail until turned off again
    pub fn fail_publishes(&self, fail: bool) {
        self.shared.state.lock().fail_publishes = fail;
    }

    /// Append a record as-is, bypassing the publisher. Returns its offset.
    pub fn append_raw(&self, payload: Option<Vec<u8>>) -> i64 {
        let offset = {
            let mut state = self.shared.state.lock();
            let offset = state.next_offset;
            state.next_offset += 1;
            state.entries.push(Entry::Record { offset, payload });
            offset
        };
        self.shared.appended.notify_waiters();
        offset
    }

    /// Queue a transport error for cursors to observe at this position
    pub fn inject_transport_error(&self, message: impl Into<String>) {
        self.shared
            .state
            .lock()
            .entries
            .push(Entry::TransportError(message.into()));
        self.shared.appended.notify_waiters();
    }

    /// All records currently in the log, in offset order
    pub fn records(&self) -> Vec<BrokerMessage> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Record { offset, payload } => Some(BrokerMessage {
                    partition: DEFAULT_PARTITION,
                    offset: *offset,
                    payload: payload.clone(),
                }),
                Entry::TransportError(_) => None,
            })
            .collect()
    }

    /// Cursor positioned after everything appended so far
    pub fn cursor_at_end(&self) -> MemoryCursor {
        let position = self.shared.state.lock().entries.len();
        MemoryCursor {
            log: self.clone(),
            position,
        }
    }

    pub fn cursor_at_start(&self) -> MemoryCursor {
        MemoryCursor {
            log: self.clone(),
            position: 0,
        }
    }
}

#[async_trait]
impl EventPublisher for MemoryEventLog {
    async fn publish(&self, payload: &[u8]) -> Result<Placement, PublishError> {
        {
            let mut state = self.shared.state.lock();
            state.send_attempts += 1;
            if state.fail_publishes {
                return Err(PublishError::Unavailable("injected publish failure".into()));
            }
        }

        let offset = self.append_raw(Some(payload.to_vec()));
        Ok(Placement {
            partition: DEFAULT_PARTITION,
            offset,
        })
    }
}

/// Reader over a [`MemoryEventLog`]
#[derive(Debug)]
pub struct MemoryCursor {
    log: MemoryEventLog,
    position: usize,
}

#[async_trait]
impl PartitionCursor for MemoryCursor {
    async fn next_message(&mut self) -> Result<BrokerMessage, ConsumeError> {
        loop {
            // Registered before the check so an append in between is not missed
            let appended = self.log.shared.appended.notified();

            let entry = self.log.shared.state.lock().entries.get(self.position).cloned();
            if let Some(entry) = entry {
                self.position += 1;
                return match entry {
                    Entry::Record { offset, payload } => Ok(BrokerMessage {
                        partition: DEFAULT_PARTITION,
                        offset,
                        payload,
                    }),
                    Entry::TransportError(message) => Err(ConsumeError::Disconnected(message)),
                };
            }

            appended.await;
        }
    }
}
