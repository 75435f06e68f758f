//! # Tokens, Sequence Numbers & the Account Secret
//!
//! A [`Token`] is the value-bearing secret a credential certifies. It is
//! built from three things:
//!
//! - a fresh random [`SequenceNumber`] (the credential's identity in the
//!   wallet and, on spend, its double-spend tag),
//! - the long-term [`AccountSecret`] generated once per session,
//! - the declared value, which must be one of [`ALLOWED_VALUES`].
//!
//! Tokens are immutable. Once handed to the issuer they belong to the
//! issued credential record and never change again.
//!
//! Randomness comes from a [`RandomnessSource`]. Uniqueness of sequence
//! numbers is probabilistic (256 bits of OS randomness); nobody keeps a
//! global list.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::config::{is_allowed_value, ALLOWED_VALUES};

/// Errors raised while constructing a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The scheme only signs a fixed set of denominations.
    #[error("value {value} is not one of the allowed credential values {allowed:?}")]
    ValueNotAllowed { value: u64, allowed: &'static [u64] },
}

// ---------------------------------------------------------------------------
// SequenceNumber
// ---------------------------------------------------------------------------

/// Random 256-bit sequence value identifying a single credential.
///
/// The string form (lowercase hex) is the key used by the credential store
/// and shown in the UI.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceNumber([u8; 32]);

impl SequenceNumber {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceNumber({}...)", &self.to_hex()[..12])
    }
}

// ---------------------------------------------------------------------------
// AccountSecret
// ---------------------------------------------------------------------------

/// The long-term account secret. Generated once per session and shared
/// read-only by every token the session creates.
///
/// `Debug` is redacted. The only way to see the bytes is to ask for them,
/// which the session does exactly once to display the secret to its owner.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountSecret([u8; 32]);

impl AccountSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex form for the one place that is allowed to show it.
    pub fn reveal_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AccountSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountSecret(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A value-bearing secret: `(sequence, account secret, value)`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    sequence: SequenceNumber,
    secret: AccountSecret,
    value: u64,
}

impl Token {
    /// Builds a token, rejecting values the scheme cannot sign.
    pub fn new(
        sequence: SequenceNumber,
        secret: AccountSecret,
        value: u64,
    ) -> Result<Self, TokenError> {
        if !is_allowed_value(value) {
            return Err(TokenError::ValueNotAllowed {
                value,
                allowed: &ALLOWED_VALUES,
            });
        }
        Ok(Self {
            sequence,
            secret,
            value,
        })
    }

    pub fn sequence(&self) -> &SequenceNumber {
        &self.sequence
    }

    pub fn secret(&self) -> &AccountSecret {
        &self.secret
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// The key this token is stored under.
    pub fn sequence_id(&self) -> String {
        self.sequence.to_hex()
    }

    /// Canonical byte encoding: `sequence || secret || value (8B BE)`.
    ///
    /// This is what gets blinded and signed. Fixed width, so no separators.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(72);
        out.extend_from_slice(self.sequence.as_bytes());
        out.extend_from_slice(self.secret.as_bytes());
        out.extend_from_slice(&self.value.to_be_bytes());
        out
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("sequence", &self.sequence)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Source of fresh field elements for sequence numbers and secrets.
///
/// A trait so tests can make sequences deterministic.
pub trait RandomnessSource: Send + Sync {
    fn fresh_sequence(&self) -> SequenceNumber;
    fn fresh_secret(&self) -> AccountSecret;
}

/// Randomness straight from the OS RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomness;

impl RandomnessSource for OsRandomness {
    fn fresh_sequence(&self) -> SequenceNumber {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        SequenceNumber(bytes)
    }

    fn fresh_secret(&self) -> AccountSecret {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        AccountSecret(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> AccountSecret {
        AccountSecret::from_bytes([7u8; 32])
    }

    #[test]
    fn token_accepts_allowed_values() {
        for value in ALLOWED_VALUES {
            let token = Token::new(SequenceNumber::from_bytes([1; 32]), secret(), value).unwrap();
            assert_eq!(token.value(), value);
        }
    }

    #[test]
    fn token_rejects_unlisted_value() {
        let err = Token::new(SequenceNumber::from_bytes([1; 32]), secret(), 3).unwrap_err();
        assert!(matches!(err, TokenError::ValueNotAllowed { value: 3, .. }));
    }

    #[test]
    fn token_bytes_are_fixed_width() {
        let token = Token::new(SequenceNumber::from_bytes([1; 32]), secret(), 10).unwrap();
        let bytes = token.to_bytes();
        assert_eq!(bytes.len(), 72);
        assert_eq!(&bytes[64..], &10u64.to_be_bytes());
    }

    #[test]
    fn sequence_id_is_hex() {
        let seq = SequenceNumber::from_bytes([0xAB; 32]);
        assert_eq!(seq.to_hex().len(), 64);
        assert!(seq.to_string().starts_with("abab"));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let dbg = format!("{:?}", secret());
        assert!(!dbg.contains("0707"));
        assert!(dbg.contains("redacted"));

        let token = Token::new(SequenceNumber::from_bytes([1; 32]), secret(), 10).unwrap();
        assert!(!format!("{:?}", token).contains("0707"));
    }

    #[test]
    fn os_randomness_produces_distinct_sequences() {
        let rng = OsRandomness;
        assert_ne!(rng.fresh_sequence(), rng.fresh_sequence());
    }
}
