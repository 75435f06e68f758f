//! Native ledger account status and registration.

use tracing::info;

use crate::error::{WalletError, WalletResult};
use crate::notify::UiSignal;
use crate::session::Session;

const REGISTRATION_CONTEXT: &str = "credpipe account registration v1";

/// Asks the ledger whether this wallet's account exists and publishes the
/// answer.
pub async fn check_account_exists(session: &Session) -> WalletResult<bool> {
    let exists = session
        .collaborators()
        .submit
        .account_exists()
        .await
        .map_err(|e| WalletError::Account(format!("could not check for account existence: {}", e)))?;
    session.sink().publish(UiSignal::AccountStatus(exists));
    Ok(exists)
}

/// Registers the account on the native ledger.
///
/// The registration payload is derived from the account secret, so it is
/// stable across calls and never reveals the secret itself.
pub async fn register_account(session: &Session) -> WalletResult<()> {
    let payload = registration_payload(session.secret().as_bytes());
    session
        .collaborators()
        .submit
        .register_account(&payload)
        .await
        .map_err(|e| WalletError::Account(format!("could not register account: {}", e)))?;
    session.sink().publish(UiSignal::AccountStatus(true));
    info!("account registered");
    Ok(())
}

fn registration_payload(secret: &[u8; 32]) -> Vec<u8> {
    blake3::derive_key(REGISTRATION_CONTEXT, secret).to_vec()
}
