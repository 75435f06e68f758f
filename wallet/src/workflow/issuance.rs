//! Credential issuance.
//!
//! The credential is stored (and announced) only after the issuer has
//! returned it. A failed issuance leaves the store exactly as it was.

use tracing::{debug, info, warn};

use crate::config::VALUE_SUFFIX;
use crate::credential::{IssuedCredentialRecord, Token};
use crate::error::{WalletError, WalletResult};
use crate::notify::UiSignal;
use crate::session::Session;

/// Parses a credential value as the UI presents it: `"10"` or `"10Nym"`.
pub fn parse_credential_value(input: &str) -> WalletResult<u64> {
    let trimmed = input.trim();
    let digits = trimmed.strip_suffix(VALUE_SUFFIX).unwrap_or(trimmed).trim();
    super::parse_amount(digits)
        .map_err(|_| WalletError::InvalidInput(format!("could not parse the value '{}'", input)))
}

/// Obtains a credential of the requested value and stores it.
///
/// # Errors
///
/// - [`WalletError::InvalidInput`] if `requested_value` is not a number.
/// - [`WalletError::TokenConstruction`] if the value is not an allowed
///   denomination.
/// - [`WalletError::Issuance`] if the issuer fails, or the generated
///   sequence number is already in the store.
pub async fn issue_credential(
    session: &Session,
    requested_value: &str,
) -> WalletResult<IssuedCredentialRecord> {
    let value = parse_credential_value(requested_value)?;
    let collaborators = session.collaborators();

    let sequence = collaborators.randomness.fresh_sequence();
    let token = Token::new(sequence, session.secret().clone(), value)?;
    debug!(sequence = %token.sequence(), value, "token generated");

    let credential = collaborators.issuer.issue(&token).await.map_err(|e| {
        warn!(value, error = %e, "issuer refused credential");
        WalletError::Issuance(e.to_string())
    })?;

    // Issuance burns native balance; show the new figures.
    session.sync().refresh_all().await;

    let record = IssuedCredentialRecord::new(token, credential);
    let sequence_id = record.sequence_id();
    session.store().put(sequence_id.clone(), record.clone())?;
    session
        .sink()
        .publish(UiSignal::NewCredential(record.list_item()));

    info!(
        sequence = %sequence_id,
        value,
        issued_at = %record.issued_at(),
        "credential issued"
    );
    Ok(record)
}
