//! Collaborator traits for the credential scheme.
//!
//! Issuance is a network round-trip to the issuing authorities; spending
//! is a round-trip to a verifier that checks the credential and records
//! the sequence number on chain. Re-randomization is local math, but it
//! belongs to the scheme, so it sits on the issuer trait.

use async_trait::async_trait;

use super::{Credential, Token};
use crate::error::CollaboratorError;

/// Produces blind signatures over tokens.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Obtains a credential certifying `token`.
    async fn issue(&self, token: &Token) -> Result<Credential, CollaboratorError>;

    /// A fresh credential for the same token, unlinkable to `credential`.
    fn rerandomize(&self, credential: &Credential) -> Credential;
}

/// Accepts credentials on behalf of service providers.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Presents `credential` for `token` to the provider at
    /// `provider_address`.
    ///
    /// `Ok(false)` is a legitimate answer: the verifier looked at the
    /// credential and refused it, a double spend being the usual reason.
    async fn spend(
        &self,
        token: &Token,
        credential: &Credential,
        provider_id: &str,
        provider_address: &str,
    ) -> Result<bool, CollaboratorError>;
}
