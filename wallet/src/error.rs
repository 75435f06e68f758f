//! Error taxonomy for wallet workflows.
//!
//! Every workflow returns a [`WalletError`] on failure. The variants map
//! one-to-one onto the user-visible failure classes; [`WalletError::kind`]
//! flattens them into an [`ErrorKind`] for callers that only need the class.
//!
//! Collaborators (ledger RPC, credential issuer, verifier) report failures
//! as [`CollaboratorError`]. Workflows wrap those into the variant that
//! describes *which step* failed.

use std::fmt;

use thiserror::Error;

use crate::chain::Ledger;
use crate::config::ConfigError;
use crate::credential::{StoreError, TokenError};

/// Errors returned by wallet workflows.
#[derive(Debug, Error)]
pub enum WalletError {
    /// A user-supplied amount or value could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The token could not be constructed (value outside the allowed set).
    #[error("could not generate token: {0}")]
    TokenConstruction(#[from] TokenError),

    /// No credential is stored under the given sequence identifier.
    #[error("no credential exists for that sequence number ({0})")]
    UnknownCredential(String),

    /// The service provider is not in the configured directory.
    #[error("no service provider with identifier {0} exists")]
    UnknownProvider(String),

    /// The transaction was rejected before it reached a ledger.
    #[error("transaction submission failed: {0}")]
    Submission(String),

    /// The credential issuance service failed.
    #[error("could not obtain credential: {0}")]
    Issuance(String),

    /// The spend-verification service failed.
    #[error("could not spend the credential: {0}")]
    Spend(String),

    /// A finality wait ended (deadline or cancellation) before the
    /// expected state was observed.
    #[error("gave up waiting for {waited_for} after {elapsed_ms}ms")]
    DeadlineExceeded {
        /// What the wait was looking for.
        waited_for: String,
        /// Milliseconds spent waiting.
        elapsed_ms: u64,
    },

    /// A ledger read failed.
    #[error("failed to query {ledger} balance: {source}")]
    Query {
        /// The ledger that was being read.
        ledger: Ledger,
        /// The collaborator failure.
        #[source]
        source: CollaboratorError,
    },

    /// Account registration or lookup failed.
    #[error("account operation failed: {0}")]
    Account(String),

    /// The client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience alias used throughout the crate.
pub type WalletResult<T> = Result<T, WalletError>;

/// The failure class of a [`WalletError`], without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    TokenConstructionError,
    UnknownCredential,
    UnknownProvider,
    SubmissionError,
    IssuanceError,
    SpendError,
    DeadlineExceeded,
    QueryError,
    AccountError,
    ConfigError,
}

impl WalletError {
    /// Returns the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidInput(_) => ErrorKind::InvalidInput,
            WalletError::TokenConstruction(_) => ErrorKind::TokenConstructionError,
            WalletError::UnknownCredential(_) => ErrorKind::UnknownCredential,
            WalletError::UnknownProvider(_) => ErrorKind::UnknownProvider,
            WalletError::Submission(_) => ErrorKind::SubmissionError,
            WalletError::Issuance(_) => ErrorKind::IssuanceError,
            WalletError::Spend(_) => ErrorKind::SpendError,
            WalletError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            WalletError::Query { .. } => ErrorKind::QueryError,
            WalletError::Account(_) => ErrorKind::AccountError,
            WalletError::Config(_) => ErrorKind::ConfigError,
        }
    }
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(seq) => WalletError::UnknownCredential(seq),
            // A duplicate sequence means the random source repeated itself;
            // from the caller's point of view the issuance did not happen.
            StoreError::Duplicate(seq) => {
                WalletError::Issuance(format!("sequence {} is already in use", seq))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Failure reported by an external collaborator (ledger RPC, issuing
/// authority, verifier).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The request never got a usable answer (connection refused, timeout,
    /// malformed response).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote side answered and said no.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl CollaboratorError {
    /// Shorthand for a transport failure.
    pub fn transport(msg: impl fmt::Display) -> Self {
        CollaboratorError::Transport(msg.to_string())
    }

    /// Shorthand for a rejection.
    pub fn rejected(msg: impl fmt::Display) -> Self {
        CollaboratorError::Rejected(msg.to_string())
    }
}
