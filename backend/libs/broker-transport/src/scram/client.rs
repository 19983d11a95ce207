//! SCRAM client and per-connection conversation

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use super::{
    escape_saslname, parse_attributes, ScramMechanism, ScramTranscript, MAX_ITERATIONS,
    MIN_ITERATIONS,
};
use crate::error::{AuthInitError, AuthProtocolError};

const NONCE_BYTES: usize = 24;

/// Holds the identity and password for SCRAM exchanges.
///
/// One client can start any number of conversations, one per connection attempt.
pub struct ScramClient {
    mechanism: ScramMechanism,
    username: String,
    password: SecretString,
    authzid: Option<String>,
}

impl std::fmt::Debug for ScramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScramClient")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("authzid", &self.authzid)
            .finish()
    }
}

impl ScramClient {
    /// Build a client for `mechanism`.
    ///
    /// Fails with [`AuthInitError`] when the credentials cannot seed the hash
    /// primitive: empty values or control characters.
    pub fn new(
        mechanism: ScramMechanism,
        username: &str,
        password: &SecretString,
        authzid: Option<&str>,
    ) -> Result<Self, AuthInitError> {
        if username.is_empty() {
            return Err(AuthInitError::EmptyUsername);
        }
        if password.expose_secret().is_empty() {
            return Err(AuthInitError::EmptyPassword);
        }
        if username.chars().any(char::is_control) {
            return Err(AuthInitError::InvalidCharacters("username"));
        }
        if password.expose_secret().chars().any(char::is_control) {
            return Err(AuthInitError::InvalidCharacters("password"));
        }
        if authzid.is_some_and(|a| a.chars().any(char::is_control)) {
            return Err(AuthInitError::InvalidCharacters("authorization id"));
        }

        Ok(Self {
            mechanism,
            username: username.to_string(),
            password: SecretString::from(password.expose_secret().to_string()),
            authzid: authzid.filter(|a| !a.is_empty()).map(str::to_owned),
        })
    }

    pub fn mechanism(&self) -> ScramMechanism {
        self.mechanism
    }

    /// Start a fresh exchange with a random client nonce
    pub fn begin(&self) -> Result<ScramConversation<'_>, AuthInitError> {
        let mut raw = [0u8; NONCE_BYTES];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| AuthInitError::Nonce(e.to_string()))?;

        Ok(self.begin_with_nonce(BASE64.encode(raw)))
    }

    pub(crate) fn begin_with_nonce(&self, client_nonce: String) -> ScramConversation<'_> {
        ScramConversation {
            client: self,
            client_nonce,
            transcript: ScramTranscript::new(),
            stage: Stage::Initial,
        }
    }

    fn gs2_header(&self) -> String {
        match &self.authzid {
            Some(authzid) => format!("n,a={},", escape_saslname(authzid)),
            None => "n,,".to_string(),
        }
    }
}

enum Stage {
    Initial,
    AwaitingServerFirst,
    AwaitingServerFinal { server_key: Vec<u8>, auth_message: String },
    Complete,
    Failed,
}

/// One in-progress SCRAM exchange.
///
/// Drive it with [`step`](Self::step): pass an empty challenge first, then each
/// server message in turn, sending every returned string to the server until
/// [`done`](Self::done) reports true.
pub struct ScramConversation<'a> {
    client: &'a ScramClient,
    client_nonce: String,
    transcript: ScramTranscript,
    stage: Stage,
}

impl<'a> ScramConversation<'a> {
    /// Consume the server's latest challenge and return the next client message.
    pub fn step(&mut self, challenge: &str) -> Result<String, AuthProtocolError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Failed);

        let (result, next) = match stage {
            Stage::Initial => (Ok(self.client_first()), Stage::AwaitingServerFirst),
            Stage::AwaitingServerFirst => match self.client_final(challenge) {
                Ok((message, server_key, auth_message)) => (
                    Ok(message),
                    Stage::AwaitingServerFinal {
                        server_key,
                        auth_message,
                    },
                ),
                Err(e) => (Err(e), Stage::Failed),
            },
            Stage::AwaitingServerFinal {
                server_key,
                auth_message,
            } => match self.verify_server_final(challenge, &server_key, &auth_message) {
                Ok(()) => (Ok(String::new()), Stage::Complete),
                Err(e) => (Err(e), Stage::Failed),
            },
            Stage::Complete => (Err(AuthProtocolError::AlreadyComplete), Stage::Complete),
            Stage::Failed => (Err(AuthProtocolError::Aborted), Stage::Failed),
        };

        self.stage = next;
        result
    }

    /// True once the server signature has been verified
    pub fn done(&self) -> bool {
        matches!(self.stage, Stage::Complete)
    }

    pub fn transcript(&self) -> &ScramTranscript {
        &self.transcript
    }

    fn client_first(&mut self) -> String {
        let bare = format!(
            "n={},r={}",
            escape_saslname(&self.client.username),
            self.client_nonce
        );
        self.transcript.record_client_first(bare.clone());
        format!("{}{}", self.client.gs2_header(), bare)
    }

    fn client_final(
        &mut self,
        server_first: &str,
    ) -> Result<(String, Vec<u8>, String), AuthProtocolError> {
        if let Some(reason) = server_first.strip_prefix("e=") {
            return Err(AuthProtocolError::ServerError(reason.to_string()));
        }

        let attrs = parse_attributes(server_first)?;
        let mut attrs = attrs.into_iter();

        let nonce = match attrs.next() {
            Some(('m', _)) => return Err(AuthProtocolError::UnsupportedExtension),
            Some(('r', nonce)) => nonce,
            _ => return Err(AuthProtocolError::Malformed("expected nonce".into())),
        };
        let salt = match attrs.next() {
            Some(('s', salt)) => BASE64
                .decode(salt)
                .map_err(|e| AuthProtocolError::Malformed(format!("invalid salt: {}", e)))?,
            _ => return Err(AuthProtocolError::Malformed("expected salt".into())),
        };
        let iterations: u32 = match attrs.next() {
            Some(('i', count)) => count.parse().map_err(|_| {
                AuthProtocolError::Malformed(format!("invalid iteration count: {}", count))
            })?,
            _ => return Err(AuthProtocolError::Malformed("expected iteration count".into())),
        };

        if !nonce.starts_with(&self.client_nonce) || nonce.len() <= self.client_nonce.len() {
            return Err(AuthProtocolError::NonceMismatch);
        }
        if salt.is_empty() {
            return Err(AuthProtocolError::Malformed("empty salt".into()));
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
            return Err(AuthProtocolError::IterationCount(iterations));
        }

        self.transcript.record_server_first(server_first);

        let channel_binding = BASE64.encode(self.client.gs2_header());
        let without_proof = format!("c={},r={}", channel_binding, nonce);
        self.transcript.record_client_final(without_proof.clone());

        let auth_message = self
            .transcript
            .auth_message()
            .ok_or_else(|| AuthProtocolError::Malformed("incomplete transcript".into()))?;

        let mech = self.client.mechanism;
        let crypto = |e: hmac::digest::InvalidLength| AuthProtocolError::Crypto(e.to_string());

        let salted_password = mech
            .hi(
                self.client.password.expose_secret().as_bytes(),
                &salt,
                iterations,
            )
            .map_err(crypto)?;
        let client_key = mech.hmac(&salted_password, b"Client Key").map_err(crypto)?;
        let stored_key = mech.hash(&client_key);
        let client_signature = mech
            .hmac(&stored_key, auth_message.as_bytes())
            .map_err(crypto)?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(&client_signature)
            .map(|(k, s)| k ^ s)
            .collect();
        let server_key = mech.hmac(&salted_password, b"Server Key").map_err(crypto)?;

        let message = format!("{},p={}", without_proof, BASE64.encode(proof));
        Ok((message, server_key, auth_message))
    }

    fn verify_server_final(
        &self,
        server_final: &str,
        server_key: &[u8],
        auth_message: &str,
    ) -> Result<(), AuthProtocolError> {
        let attrs = parse_attributes(server_final)?;

        match attrs.first() {
            Some(('e', reason)) => Err(AuthProtocolError::ServerError(reason.to_string())),
            Some(('v', verifier)) => {
                let signature = BASE64.decode(verifier).map_err(|e| {
                    AuthProtocolError::Malformed(format!("invalid verifier: {}", e))
                })?;

                let valid = self
                    .client
                    .mechanism
                    .verify_hmac(server_key, auth_message.as_bytes(), &signature)
                    .map_err(|e| AuthProtocolError::Crypto(e.to_string()))?;

                if valid {
                    Ok(())
                } else {
                    Err(AuthProtocolError::SignatureMismatch)
                }
            }
            _ => Err(AuthProtocolError::Malformed("expected verifier".into())),
        }
    }
}
