//! Running record of a SCRAM exchange

/// The three messages that make up the RFC 5802 `AuthMessage`.
///
/// Both the client proof and the expected server signature are computed over
/// `client-first-bare "," server-first "," client-final-without-proof`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScramTranscript {
    client_first_bare: Option<String>,
    server_first: Option<String>,
    client_final_without_proof: Option<String>,
}

impl ScramTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_client_first(&mut self, client_first_bare: impl Into<String>) {
        self.client_first_bare = Some(client_first_bare.into());
    }

    pub fn record_server_first(&mut self, server_first: impl Into<String>) {
        self.server_first = Some(server_first.into());
    }

    pub fn record_client_final(&mut self, client_final_without_proof: impl Into<String>) {
        self.client_final_without_proof = Some(client_final_without_proof.into());
    }

    pub fn client_first_bare(&self) -> Option<&str> {
        self.client_first_bare.as_deref()
    }

    /// `AuthMessage`, available once all three parts are recorded
    pub fn auth_message(&self) -> Option<String> {
        match (
            &self.client_first_bare,
            &self.server_first,
            &self.client_final_without_proof,
        ) {
            (Some(first), Some(server), Some(last)) => Some(format!("{},{},{}", first, server, last)),
            _ => None,
        }
    }
}
