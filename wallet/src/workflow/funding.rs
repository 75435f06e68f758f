//! Funding workflows: moving value between the two ledgers.
//!
//! Transfer and redeem share one shape:
//!
//! 1. parse the amount,
//! 2. read both confirmed balances,
//! 3. submit,
//! 4. wait on both ledgers until each shows `before ± amount`,
//! 5. republish and signal ready.
//!
//! The two waits run side by side under the same deadline. Either one
//! timing out fails the workflow; nothing is recorded on the way.
//!
//! The faucet cannot predict its effect on balances, so it waits on the two
//! transaction verdicts instead and only then refreshes.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::parse_amount;
use crate::chain::Ledger;
use crate::error::{WalletError, WalletResult};
use crate::notify::{BalanceKind, Severity, UiSignal};
use crate::session::Session;

/// Confirmed balances observed at the end of a funding workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingOutcome {
    pub amount: u64,
    pub erc20_balance: u64,
    pub native_balance: u64,
}

/// What the faucet's two transactions resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetOutcome {
    pub amount: u64,
    pub token_tx_succeeded: bool,
    pub native_tx_succeeded: bool,
}

impl FaucetOutcome {
    pub fn succeeded(&self) -> bool {
        self.token_tx_succeeded && self.native_tx_succeeded
    }
}

/// Direction of a funding transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    /// ERC20 -> native, through the pipe account.
    ToPipe,
    /// Native -> ERC20.
    Redeem,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::ToPipe => "transfer to pipe account",
            Direction::Redeem => "redeem",
        }
    }

    /// Expected confirmed balances once the transfer has settled.
    fn targets(self, erc20: u64, native: u64, amount: u64) -> WalletResult<(u64, u64)> {
        let insufficient = |ledger: Ledger, have: u64| {
            WalletError::InvalidInput(format!(
                "cannot move {} out of a {} balance of {}",
                amount, ledger, have
            ))
        };
        let overflow = |ledger: Ledger| {
            WalletError::InvalidInput(format!("{} would overflow the {} balance", amount, ledger))
        };

        match self {
            Direction::ToPipe => Ok((
                erc20
                    .checked_sub(amount)
                    .ok_or_else(|| insufficient(Ledger::Erc20, erc20))?,
                native
                    .checked_add(amount)
                    .ok_or_else(|| overflow(Ledger::Native))?,
            )),
            Direction::Redeem => Ok((
                erc20
                    .checked_add(amount)
                    .ok_or_else(|| overflow(Ledger::Erc20))?,
                native
                    .checked_sub(amount)
                    .ok_or_else(|| insufficient(Ledger::Native, native))?,
            )),
        }
    }
}

/// Moves `amount` ERC20 tokens to the pipe account and waits until the
/// matching native credit shows up.
pub async fn transfer_to_pipe(session: &Session, amount: &str) -> WalletResult<FundingOutcome> {
    run_transfer(session, Direction::ToPipe, amount).await
}

/// Moves `amount` native tokens back to the ERC20 side and waits until both
/// balances reflect it.
pub async fn redeem(session: &Session, amount: &str) -> WalletResult<FundingOutcome> {
    run_transfer(session, Direction::Redeem, amount).await
}

async fn run_transfer(
    session: &Session,
    direction: Direction,
    input: &str,
) -> WalletResult<FundingOutcome> {
    let amount = parse_amount(input)?;
    let (erc20_before, native_before) = session.sync().confirmed_pair().await?;
    let (erc20_target, native_target) = direction.targets(erc20_before, native_before, amount)?;

    let submit = &session.collaborators().submit;
    let submitted = match direction {
        Direction::ToPipe => submit.transfer_to_pipe(amount).await,
        Direction::Redeem => submit.redeem(amount).await,
    };
    let tx = submitted.map_err(|e| {
        WalletError::Submission(format!("{} of {} failed: {}", direction.label(), amount, e))
    })?;
    info!(
        direction = direction.label(),
        amount,
        %tx,
        erc20_target,
        native_target,
        "transaction submitted, waiting for both ledgers"
    );

    let deadline = session.finality_deadline();
    let cancel = session.cancel_signal();
    let watcher = session.watcher();
    let (erc20_balance, native_balance) = futures::future::try_join(
        watcher.await_balance(Ledger::Erc20, erc20_target, deadline, cancel.clone()),
        watcher.await_balance(Ledger::Native, native_target, deadline, cancel),
    )
    .await?;

    let sink = session.sink();
    sink.publish(UiSignal::Balance {
        ledger: Ledger::Erc20,
        kind: BalanceKind::Confirmed,
        amount: erc20_balance,
    });
    sink.publish(UiSignal::Balance {
        ledger: Ledger::Native,
        kind: BalanceKind::Confirmed,
        amount: native_balance,
    });
    sink.notify(
        Severity::Info,
        format!("{} of {} Nym completed", direction.label(), amount),
    );
    sink.publish(UiSignal::Ready);

    Ok(FundingOutcome {
        amount,
        erc20_balance,
        native_balance,
    })
}

/// Asks the faucet for the configured amount and waits for both of its
/// transactions to resolve.
///
/// Both verdicts must be positive before balances are refreshed. A negative
/// verdict is a warning, not an error: the returned [`FaucetOutcome`] says
/// which side failed.
pub async fn request_faucet(session: &Session) -> WalletResult<FaucetOutcome> {
    let amount = session.config().timing.faucet_amount;
    let submit = session.collaborators().submit.clone();

    let receipt = submit.request_faucet(amount).await.map_err(|e| {
        WalletError::Submission(format!("could not send request to the faucet: {}", e))
    })?;
    info!(
        amount,
        token_tx = %receipt.token_tx,
        native_tx = %receipt.native_tx,
        "faucet request accepted"
    );

    let deadline = session.finality_deadline();
    let cancel = session.cancel_signal();
    let watcher = session.watcher();
    let (token_tx_succeeded, native_tx_succeeded) = futures::future::try_join(
        watcher.await_resolution(
            submit.as_ref(),
            Ledger::Erc20,
            &receipt.token_tx,
            deadline,
            cancel.clone(),
        ),
        watcher.await_resolution(
            submit.as_ref(),
            Ledger::Native,
            &receipt.native_tx,
            deadline,
            cancel,
        ),
    )
    .await?;

    let outcome = FaucetOutcome {
        amount,
        token_tx_succeeded,
        native_tx_succeeded,
    };

    let sink = session.sink();
    if outcome.succeeded() {
        session.sync().refresh_all().await;
        sink.notify(
            Severity::Info,
            format!(
                "Received {} Nym from the faucet (plus some native tokens for transaction fees)",
                amount
            ),
        );
    } else {
        warn!(?outcome, "faucet transaction failed");
        sink.notify(
            Severity::Warning,
            "unknown error when trying to receive funds from the faucet".to_string(),
        );
    }
    sink.publish(UiSignal::Ready);

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn to_pipe_moves_erc20_into_native() {
        assert_eq!(Direction::ToPipe.targets(100, 5, 30).unwrap(), (70, 35));
    }

    #[test]
    fn redeem_moves_native_into_erc20() {
        assert_eq!(Direction::Redeem.targets(100, 50, 30).unwrap(), (130, 20));
    }

    #[test]
    fn insufficient_balance_is_invalid_input() {
        let err = Direction::ToPipe.targets(10, 0, 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = Direction::Redeem.targets(0, 10, 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn overflow_is_invalid_input() {
        let err = Direction::ToPipe.targets(u64::MAX, u64::MAX, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn faucet_needs_both_verdicts() {
        let mut outcome = FaucetOutcome {
            amount: 50,
            token_tx_succeeded: true,
            native_tx_succeeded: true,
        };
        assert!(outcome.succeeded());
        outcome.native_tx_succeeded = false;
        assert!(!outcome.succeeded());
    }
}
