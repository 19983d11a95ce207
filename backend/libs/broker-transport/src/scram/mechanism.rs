//! Hash selection for SCRAM (RFC 5802 / RFC 7677)

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

/// The negotiated SCRAM hash function.
///
/// Both broker roles use [`ScramMechanism::Sha256`]; SHA-512 is kept for brokers
/// that only enable `SCRAM-SHA-512`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScramMechanism {
    #[default]
    Sha256,
    Sha512,
}

macro_rules! with_digest {
    ($mechanism:expr, $digest:ident => $body:expr) => {
        match $mechanism {
            ScramMechanism::Sha256 => {
                type $digest = Sha256;
                $body
            }
            ScramMechanism::Sha512 => {
                type $digest = Sha512;
                $body
            }
        }
    };
}

impl ScramMechanism {
    /// SASL mechanism name announced in the Kafka `SaslHandshake`
    pub fn name(&self) -> &'static str {
        match self {
            ScramMechanism::Sha256 => "SCRAM-SHA-256",
            ScramMechanism::Sha512 => "SCRAM-SHA-512",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SCRAM-SHA-256" => Some(ScramMechanism::Sha256),
            "SCRAM-SHA-512" => Some(ScramMechanism::Sha512),
            _ => None,
        }
    }

    /// H(data)
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        with_digest!(self, D => D::digest(data).to_vec())
    }

    /// HMAC(key, data)
    pub fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        with_digest!(self, D => {
            let mut mac = Hmac::<D>::new_from_slice(key)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        })
    }

    /// Constant-time check that `tag == HMAC(key, data)`
    pub fn verify_hmac(&self, key: &[u8], data: &[u8], tag: &[u8]) -> Result<bool, InvalidLength> {
        with_digest!(self, D => {
            let mut mac = Hmac::<D>::new_from_slice(key)?;
            mac.update(data);
            Ok(mac.verify_slice(tag).is_ok())
        })
    }

    /// Hi(password, salt, i): PBKDF2 with HMAC as the PRF and a single output block
    pub fn hi(&self, password: &[u8], salt: &[u8], iterations: u32) -> Result<Vec<u8>, InvalidLength> {
        let mut block = Vec::with_capacity(salt.len() + 4);
        block.extend_from_slice(salt);
        block.extend_from_slice(&1u32.to_be_bytes());

        let mut u = self.hmac(password, &block)?;
        let mut result = u.clone();

        for _ in 1..iterations {
            u = self.hmac(password, &u)?;
            result.iter_mut().zip(&u).for_each(|(r, x)| *r ^= x);
        }

        Ok(result)
    }
}
