//! Ledger identifiers and the collaborator traits for reading and writing
//! the two ledgers.
//!
//! The wallet holds funds on two ledgers:
//!
//! - **ERC20** — the token contract on Ethereum. Has a *pending* balance
//!   (funds debited in unmined transactions) in addition to the confirmed
//!   one.
//! - **Native** — the native token ledger the credentials are drawn from.
//!
//! Value moves between them through the pipe account: a transfer to the
//! pipe account debits ERC20 and eventually credits native; a redeem does
//! the reverse. The wire protocol behind these traits is not our problem.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// One of the two ledgers the account lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ledger {
    /// ERC20-style token ledger (Ethereum).
    Erc20,
    /// Native token ledger.
    Native,
}

impl Ledger {
    /// Whether this ledger reports a separate pending balance.
    pub fn tracks_pending(self) -> bool {
        matches!(self, Ledger::Erc20)
    }

    pub fn name(self) -> &'static str {
        match self {
            Ledger::Erc20 => "erc20",
            Ledger::Native => "native",
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque handle to a submitted transaction (a tx hash, usually).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two transactions a faucet request produces: the ERC20 token
/// transfer and the native-currency transfer that pays for fees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaucetReceipt {
    pub token_tx: TxHandle,
    pub native_tx: TxHandle,
}

/// Read access to ledger balances.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// The confirmed balance on `ledger`.
    async fn confirmed_balance(&self, ledger: Ledger) -> Result<u64, CollaboratorError>;

    /// The pending balance on `ledger`. Ledgers without a pending notion
    /// return the confirmed balance.
    async fn pending_balance(&self, ledger: Ledger) -> Result<u64, CollaboratorError>;
}

/// Write access: submissions and transaction tracking.
#[async_trait]
pub trait LedgerSubmit: Send + Sync {
    /// Sends `amount` ERC20 tokens to the pipe account.
    async fn transfer_to_pipe(&self, amount: u64) -> Result<TxHandle, CollaboratorError>;

    /// Redeems `amount` native tokens back to ERC20.
    async fn redeem(&self, amount: u64) -> Result<TxHandle, CollaboratorError>;

    /// Asks the faucet for `amount` tokens (plus fee currency).
    async fn request_faucet(&self, amount: u64) -> Result<FaucetReceipt, CollaboratorError>;

    /// Blocks until `tx` is mined; `true` if it succeeded.
    async fn await_tx_resolution(&self, tx: &TxHandle) -> Result<bool, CollaboratorError>;

    /// Whether the account is registered on the native ledger.
    async fn account_exists(&self) -> Result<bool, CollaboratorError>;

    /// Registers the account on the native ledger.
    async fn register_account(&self, registration: &[u8]) -> Result<(), CollaboratorError>;
}
