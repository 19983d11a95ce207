//! Salted Challenge Response Authentication (RFC 5802, RFC 7677)
//!
//! The exchange is split into three capabilities:
//!
//! - [`ScramMechanism`]: which hash function is negotiated
//! - [`ScramClient`]: credentials, starts conversations
//! - [`ScramTranscript`]: the messages that feed the client proof and server signature
//!
//! [`ScramConversation`] ties them together for a single connection attempt.

mod client;
mod mechanism;
mod transcript;

pub use client::{ScramClient, ScramConversation};
pub use mechanism::ScramMechanism;
pub use transcript::ScramTranscript;

use crate::error::AuthProtocolError;

/// Lowest iteration count accepted from a server (Kafka's own minimum)
pub const MIN_ITERATIONS: u32 = 4096;

/// Highest iteration count accepted from a server (Kafka's own maximum)
pub const MAX_ITERATIONS: u32 = 16384;

/// Escape a username for the `n=` / `a=` attributes: `=` becomes `=3D`, `,` becomes `=2C`.
pub(crate) fn escape_saslname(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

/// Split a SCRAM message into `(attribute, value)` pairs, keeping their order.
pub(crate) fn parse_attributes(message: &str) -> Result<Vec<(char, &str)>, AuthProtocolError> {
    if message.is_empty() {
        return Err(AuthProtocolError::Malformed("empty message".into()));
    }

    message
        .split(',')
        .map(|part| {
            let mut chars = part.chars();
            match (chars.next(), chars.next()) {
                (Some(key), Some('=')) if key.is_ascii_alphabetic() => Ok((key, &part[2..])),
                _ => Err(AuthProtocolError::Malformed(format!(
                    "invalid attribute: {:?}",
                    part
                ))),
            }
        })
        .collect()
}
