//! Portfolio analytics subscriber.
//!
//! Reads the analytics topic from its newest offset and writes every valid
//! event into PostgreSQL.

pub mod config;
pub mod subscriber;

pub use config::ConsumerConfig;
pub use subscriber::{ConsumeStats, EventSubscriber, SubscriberState};
