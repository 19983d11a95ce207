//! Wire schema for portfolio analytics events
//!
//! One `AnalyticsEvent` travels from the HTTP publisher, through the broker as an
//! opaque JSON payload, to the consumer that persists it. The schema is
//! versionless: unknown fields are ignored and optional fields may be omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Topic every analytics event is published to
pub const DEFAULT_TOPIC: &str = "portfolio-analytics-events";

/// Partition the pipeline reads and writes
pub const DEFAULT_PARTITION: i32 = 0;

// Column widths of the analytics_events table
pub const MAX_EVENT_TYPE_LEN: u64 = 50;
pub const MAX_PAGE_LEN: u64 = 255;
pub const MAX_SESSION_ID_LEN: u64 = 100;

/// One client-emitted analytics event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnalyticsEvent {
    /// Event identifier (e.g., "page_view", "click")
    #[validate(length(min = 1, max = MAX_EVENT_TYPE_LEN))]
    pub event_type: String,

    /// Page path the event happened on
    #[validate(length(min = 1, max = MAX_PAGE_LEN))]
    pub page: String,

    /// Client-side time of the event, never synthesized by the server
    pub timestamp: DateTime<Utc>,

    /// Opaque browser session identifier
    #[validate(length(min = 1, max = MAX_SESSION_ID_LEN))]
    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(max = 2147483647))]
    pub screen_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(max = 2147483647))]
    pub screen_height: Option<u32>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("event failed validation: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl AnalyticsEvent {
    /// Decode and validate an event from JSON bytes (HTTP body or broker payload)
    pub fn from_json(bytes: &[u8]) -> Result<Self, SchemaError> {
        let event: AnalyticsEvent = serde_json::from_slice(bytes)?;
        event.validate()?;
        Ok(event)
    }

    /// Encode the event into its broker payload
    pub fn to_wire(&self) -> Result<Vec<u8>, SchemaError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Fill `user_agent` from the transport-level header when the client omitted it.
    ///
    /// An empty string counts as absent. A present value is never overwritten.
    pub fn with_default_user_agent(mut self, header: Option<&str>) -> Self {
        let missing = self
            .user_agent
            .as_deref()
            .map(str::is_empty)
            .unwrap_or(true);

        if missing {
            self.user_agent = header.filter(|ua| !ua.is_empty()).map(str::to_owned);
        }
        self
    }
}

/// Broker-assigned position of a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub partition: i32,
    pub offset: i64,
}
