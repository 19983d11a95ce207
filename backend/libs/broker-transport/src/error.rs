//! Error types for the broker transport.

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Raised when a SCRAM exchange cannot be started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthInitError {
    #[error("username is empty")]
    EmptyUsername,

    #[error("password is empty")]
    EmptyPassword,

    #[error("{0} contains control characters")]
    InvalidCharacters(&'static str),

    #[error("failed to generate client nonce: {0}")]
    Nonce(String),
}

/// Raised when a server challenge is malformed or rejects the exchange.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthProtocolError {
    #[error("malformed server message: {0}")]
    Malformed(String),

    #[error("server nonce does not extend the client nonce")]
    NonceMismatch,

    #[error(
        "iteration count {0} is outside {min}..={max}",
        min = crate::scram::MIN_ITERATIONS,
        max = crate::scram::MAX_ITERATIONS
    )]
    IterationCount(u32),

    #[error("server requires an unsupported extension")]
    UnsupportedExtension,

    #[error("server rejected authentication: {0}")]
    ServerError(String),

    #[error("server signature does not match")]
    SignatureMismatch,

    #[error("conversation already completed")]
    AlreadyComplete,

    #[error("conversation already failed")]
    Aborted,

    #[error("crypto primitive error: {0}")]
    Crypto(String),
}

/// Failure to establish an authenticated, encrypted broker connection.
///
/// Fatal to the connection attempt. The owning service retries at startup and
/// never falls back to an unauthenticated or unencrypted connection.
#[derive(Debug, Error)]
pub enum TransportAuthError {
    #[error("broker credentials are not configured (KAFKA_USER / KAFKA_PASSWORD)")]
    MissingCredentials,

    #[error("invalid broker address: {0}")]
    InvalidAddress(String),

    #[error("SCRAM initialization failed: {0}")]
    Init(#[from] AuthInitError),

    #[error("SCRAM negotiation failed: {0}")]
    Protocol(#[from] AuthProtocolError),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("broker I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("broker does not offer {wanted} (offered: {offered:?})")]
    UnsupportedMechanism {
        wanted: &'static str,
        offered: Vec<String>,
    },

    #[error("broker rejected {api} with error code {code}: {message}")]
    Broker {
        api: &'static str,
        code: i16,
        message: String,
    },

    #[error("malformed broker response: {0}")]
    Frame(String),

    #[error("authentication handshake timed out")]
    TimedOut,

    #[error("Kafka client error: {0}")]
    Client(#[from] KafkaError),
}

/// Failure to append one message to the topic.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker delivery failed: {0}")]
    Delivery(#[from] KafkaError),

    #[error("broker acknowledgment timed out")]
    TimedOut,

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Transport-level read error on a partition cursor.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("Kafka consumer error: {0}")]
    Transport(#[from] KafkaError),

    #[error("broker connection lost: {0}")]
    Disconnected(String),
}
