//! # Workflow Module — What the User Can Do
//!
//! ```text
//! issuance.rs — Value -> token -> blind-signed credential -> store
//! spend.rs    — Present a stored credential at a service provider
//! funding.rs  — ERC20 <-> native transfers and the faucet, with finality waits
//! account.rs  — Native ledger account existence and registration
//! ```
//!
//! Each workflow is a plain `async fn` over a [`Session`](crate::Session).
//! None of them touch the busy indicator; the session's task launcher owns
//! that.

pub mod account;
pub mod funding;
pub mod issuance;
pub mod spend;

pub use account::{check_account_exists, register_account};
pub use funding::{redeem, request_faucet, transfer_to_pipe, FaucetOutcome, FundingOutcome};
pub use issuance::{issue_credential, parse_credential_value};
pub use spend::{rerandomize_credential, spend_credential};

use crate::error::{WalletError, WalletResult};

/// Parses a user-entered amount: a positive whole number.
pub fn parse_amount(input: &str) -> WalletResult<u64> {
    let trimmed = input.trim();
    let amount: u64 = trimmed
        .parse()
        .map_err(|e| WalletError::InvalidInput(format!("could not parse '{}': {}", input, e)))?;
    if amount == 0 {
        return Err(WalletError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}
