//! Kafka SASL handshake over an established (TLS) stream
//!
//! Implements the two requests a client needs before it may talk to a SASL
//! listener:
//!
//! - `SaslHandshake` v1 (api key 17): select the mechanism
//! - `SaslAuthenticate` v0 (api key 36): carry opaque SCRAM messages
//!
//! Requests use header v1 (`api_key`, `api_version`, `correlation_id`,
//! `client_id`); responses use header v0 (`correlation_id`).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::TransportAuthError;
use crate::scram::ScramConversation;

pub(crate) const SASL_HANDSHAKE_KEY: i16 = 17;
pub(crate) const SASL_HANDSHAKE_VERSION: i16 = 1;
pub(crate) const SASL_AUTHENTICATE_KEY: i16 = 36;
pub(crate) const SASL_AUTHENTICATE_VERSION: i16 = 0;

const UNSUPPORTED_SASL_MECHANISM: i16 = 33;
const MAX_RESPONSE_BYTES: i32 = 1024 * 1024;
// client-first, client-final and the closing verification
const MAX_ROUNDS: usize = 4;

/// SASL exchange on one broker connection
pub struct SaslSession<S> {
    stream: S,
    client_id: String,
    correlation_id: i32,
}

impl<S> SaslSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, client_id: impl Into<String>) -> Self {
        Self {
            stream,
            client_id: client_id.into(),
            correlation_id: 0,
        }
    }

    /// Ask the broker to use `mechanism` for this connection
    pub async fn handshake(&mut self, mechanism: &'static str) -> Result<(), TransportAuthError> {
        let mut body = BytesMut::new();
        put_string(&mut body, mechanism);

        let mut response = self
            .round_trip(SASL_HANDSHAKE_KEY, SASL_HANDSHAKE_VERSION, &body)
            .await?;

        let error_code = get_i16(&mut response)?;
        let count = get_i32(&mut response)?.max(0) as usize;
        // each entry is at least a two-byte length prefix
        let mut offered = Vec::with_capacity(count.min(response.remaining() / 2));
        for _ in 0..count {
            offered.push(get_string(&mut response)?);
        }

        debug!(mechanism, ?offered, error_code, "SaslHandshake response");

        if error_code == UNSUPPORTED_SASL_MECHANISM || !offered.iter().any(|m| m == mechanism) {
            return Err(TransportAuthError::UnsupportedMechanism {
                wanted: mechanism,
                offered,
            });
        }
        if error_code != 0 {
            return Err(TransportAuthError::Broker {
                api: "SaslHandshake",
                code: error_code,
                message: String::new(),
            });
        }

        Ok(())
    }

    /// Run the SCRAM conversation to completion through `SaslAuthenticate` rounds
    pub async fn authenticate(
        &mut self,
        conversation: &mut ScramConversation<'_>,
    ) -> Result<(), TransportAuthError> {
        let mut challenge = String::new();

        for _ in 0..MAX_ROUNDS {
            let message = conversation.step(&challenge)?;
            if conversation.done() {
                return Ok(());
            }

            let reply = self.exchange(message.as_bytes()).await?;
            challenge = String::from_utf8(reply)
                .map_err(|_| TransportAuthError::Frame("SCRAM challenge is not UTF-8".into()))?;
        }

        Err(TransportAuthError::Frame(
            "SCRAM exchange did not complete".into(),
        ))
    }

    async fn exchange(&mut self, auth_bytes: &[u8]) -> Result<Vec<u8>, TransportAuthError> {
        let mut body = BytesMut::new();
        put_bytes(&mut body, auth_bytes);

        let mut response = self
            .round_trip(SASL_AUTHENTICATE_KEY, SASL_AUTHENTICATE_VERSION, &body)
            .await?;

        let error_code = get_i16(&mut response)?;
        let error_message = get_nullable_string(&mut response)?;
        let auth_bytes = get_bytes(&mut response)?;

        if error_code != 0 {
            return Err(TransportAuthError::Broker {
                api: "SaslAuthenticate",
                code: error_code,
                message: error_message.unwrap_or_default(),
            });
        }

        Ok(auth_bytes)
    }

    async fn round_trip(
        &mut self,
        api_key: i16,
        api_version: i16,
        body: &[u8],
    ) -> Result<Bytes, TransportAuthError> {
        self.correlation_id += 1;
        let correlation_id = self.correlation_id;

        let mut frame = BytesMut::with_capacity(14 + self.client_id.len() + body.len());
        frame.put_i16(api_key);
        frame.put_i16(api_version);
        frame.put_i32(correlation_id);
        put_string(&mut frame, &self.client_id);
        frame.put_slice(body);

        self.stream.write_i32(frame.len() as i32).await?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;

        let size = self.stream.read_i32().await?;
        if !(4..=MAX_RESPONSE_BYTES).contains(&size) {
            return Err(TransportAuthError::Frame(format!(
                "invalid response size {}",
                size
            )));
        }

        let mut buf = vec![0u8; size as usize];
        self.stream.read_exact(&mut buf).await?;
        let mut response = Bytes::from(buf);

        let echoed = response.get_i32();
        if echoed != correlation_id {
            return Err(TransportAuthError::Frame(format!(
                "correlation id mismatch: sent {}, got {}",
                correlation_id, echoed
            )));
        }

        Ok(response)
    }
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_i16(value.len() as i16);
    buf.put_slice(value.as_bytes());
}

fn put_bytes(buf: &mut BytesMut, value: &[u8]) {
    buf.put_i32(value.len() as i32);
    buf.put_slice(value);
}

fn truncated() -> TransportAuthError {
    TransportAuthError::Frame("truncated response".into())
}

fn get_i16(buf: &mut Bytes) -> Result<i16, TransportAuthError> {
    if buf.remaining() < 2 {
        return Err(truncated());
    }
    Ok(buf.get_i16())
}

fn get_i32(buf: &mut Bytes) -> Result<i32, TransportAuthError> {
    if buf.remaining() < 4 {
        return Err(truncated());
    }
    Ok(buf.get_i32())
}

fn take(buf: &mut Bytes, len: usize) -> Result<Bytes, TransportAuthError> {
    if buf.remaining() < len {
        return Err(truncated());
    }
    Ok(buf.split_to(len))
}

fn get_nullable_string(buf: &mut Bytes) -> Result<Option<String>, TransportAuthError> {
    let len = get_i16(buf)?;
    if len < 0 {
        return Ok(None);
    }
    let raw = take(buf, len as usize)?;
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|_| TransportAuthError::Frame("string is not UTF-8".into()))
}

fn get_string(buf: &mut Bytes) -> Result<String, TransportAuthError> {
    get_nullable_string(buf)?.ok_or_else(|| TransportAuthError::Frame("unexpected null string".into()))
}

fn get_bytes(buf: &mut Bytes) -> Result<Vec<u8>, TransportAuthError> {
    let len = get_i32(buf)?;
    if len < 0 {
        return Ok(Vec::new());
    }
    Ok(take(buf, len as usize)?.to_vec())
}
