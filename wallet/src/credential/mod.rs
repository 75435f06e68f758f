//! # Credential Module — Tokens, Credentials & the Credential Store
//!
//! ```text
//! token.rs   — Sequence numbers, the account secret, tokens, randomness
//! store.rs   — Concurrency-safe map: sequence id -> issued record
//! scheme.rs  — Issuer and verifier collaborator traits
//! ```
//!
//! A [`Credential`] is opaque here. The blind-signature math lives in the
//! credential scheme collaborator; this crate only moves bytes around,
//! stores them, and asks the scheme to re-randomize them.

pub mod scheme;
pub mod store;
pub mod token;

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use scheme::{CredentialIssuer, CredentialVerifier};
pub use store::{CredentialStore, StoreError};
pub use token::{AccountSecret, OsRandomness, RandomnessSource, SequenceNumber, Token, TokenError};

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An opaque blind signature over a [`Token`], as produced by the issuer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    bytes: Vec<u8>,
}

impl Credential {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Standard base64 of the serialized credential, the form the UI lists.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({} bytes)", self.bytes.len())
    }
}

// ---------------------------------------------------------------------------
// IssuedCredentialRecord
// ---------------------------------------------------------------------------

/// A credential together with the token it certifies.
///
/// The token is fixed for the record's lifetime. The credential may be
/// swapped in place (re-randomization) and the record may be marked spent,
/// but both only through [`CredentialStore`].
#[derive(Clone, Debug)]
pub struct IssuedCredentialRecord {
    token: Arc<Token>,
    credential: Arc<Credential>,
    spent: bool,
    issued_at: DateTime<Utc>,
}

impl IssuedCredentialRecord {
    pub fn new(token: Token, credential: Credential) -> Self {
        Self {
            token: Arc::new(token),
            credential: Arc::new(credential),
            spent: false,
            issued_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &Arc<Token> {
        &self.token
    }

    pub fn credential(&self) -> &Arc<Credential> {
        &self.credential
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// The store key for this record.
    pub fn sequence_id(&self) -> String {
        self.token.sequence_id()
    }

    /// The row the UI shows for this credential.
    pub fn list_item(&self) -> CredentialListItem {
        CredentialListItem {
            sequence: self.sequence_id(),
            credential: self.credential.to_base64(),
            value: self.token.value(),
            issued_at: self.issued_at,
        }
    }
}

/// A credential row as pushed to the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialListItem {
    /// Hex sequence identifier.
    pub sequence: String,
    /// Base64 serialized credential.
    pub credential: String,
    /// Declared value.
    pub value: u64,
    /// When the issuing authority returned the credential.
    pub issued_at: DateTime<Utc>,
}
