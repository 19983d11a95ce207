//! Resilience helpers shared by the analytics services
//!
//! - **Retry**: bounded retry with a constant delay (N attempts). Used for
//!   startup connectivity and per-event inserts.
//! - **Timeout**: time limits on single external calls (e.g. one database insert).
//!
//! # Example: Startup connection with fixed retry
//!
//! ```rust,no_run
//! use resilience::{with_retry, RetryConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RetryConfig::fixed(10, Duration::from_secs(2));
//!
//!     let result = with_retry(config, || async {
//!         // Connect to the database here
//!         Ok::<_, String>(())
//!     })
//!     .await;
//! }
//! ```

pub mod retry;
pub mod timeout;

pub use retry::{with_retry, RetryConfig, RetryError};
pub use timeout::{with_timeout_result, TimeoutError};
