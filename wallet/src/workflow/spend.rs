//! Spending and re-randomizing stored credentials.

use tracing::{info, warn};

use crate::credential::Credential;
use crate::error::{WalletError, WalletResult};
use crate::notify::{Severity, UiSignal};
use crate::session::Session;

/// Presents a stored credential to a service provider.
///
/// Lookups happen first: an unknown provider or sequence fails before any
/// network call and without touching the store. After the verifier has
/// been asked, the configured [`SpendPolicy`](crate::config::SpendPolicy)
/// decides whether the record is marked spent, and the outcome is shown to
/// the user either way.
///
/// Returns the verifier's verdict. `Ok(false)` is a normal outcome (e.g. a
/// double spend), not an error.
pub async fn spend_credential(
    session: &Session,
    provider_id: &str,
    sequence_id: &str,
) -> WalletResult<bool> {
    let address = session.directory().resolve(provider_id)?;
    let record = session.store().get(sequence_id)?;
    if record.is_spent() {
        warn!(sequence = %sequence_id, "credential was already marked spent, presenting anyway");
    }

    let value = record.token().value();
    let verdict = session
        .collaborators()
        .verifier
        .spend(record.token(), record.credential(), provider_id, address)
        .await;

    if session
        .config()
        .spend_policy
        .marks_spent(verdict.as_ref().ok().copied())
    {
        session.store().mark_spent(sequence_id)?;
        session.sink().publish(UiSignal::CredentialSpent {
            sequence: sequence_id.to_string(),
        });
    }

    match verdict {
        Ok(true) => {
            info!(provider = %provider_id, sequence = %sequence_id, value, "credential spent");
            session.sink().notify(
                Severity::Info,
                format!(
                    "Successfully spent credential worth {} Nym at service provider {} ({})",
                    value, provider_id, address
                ),
            );
            Ok(true)
        }
        Ok(false) => {
            warn!(provider = %provider_id, sequence = %sequence_id, value, "verifier rejected credential");
            session.sink().notify(
                Severity::Info,
                format!(
                    "Failed to spend credential worth {} Nym at service provider {} ({})",
                    value, provider_id, address
                ),
            );
            Ok(false)
        }
        Err(e) => Err(WalletError::Spend(e.to_string())),
    }
}

/// Swaps a stored credential for a fresh re-randomization of itself and
/// returns the new serialized form.
///
/// The token and the spent flag are untouched.
pub fn rerandomize_credential(session: &Session, sequence_id: &str) -> WalletResult<String> {
    let record = session.store().get(sequence_id)?;
    let fresh: Credential = session
        .collaborators()
        .issuer
        .rerandomize(record.credential());
    let encoded = fresh.to_base64();
    session.store().replace_credential(sequence_id, fresh)?;
    info!(sequence = %sequence_id, "credential re-randomized");
    Ok(encoded)
}
