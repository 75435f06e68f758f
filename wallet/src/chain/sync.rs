//! Best-effort balance refresh across both ledgers.
//!
//! Three numbers matter to the user: confirmed ERC20, pending ERC20 and
//! native. A refresh asks for all three at once. If one read fails the
//! other two still land; the failure is reported on its own and that
//! figure is simply left out of the snapshot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ledger::{Ledger, LedgerQuery};
use crate::error::{CollaboratorError, WalletError, WalletResult};
use crate::notify::{BalanceKind, NotificationSink, Severity, UiSignal};

/// The balances one refresh managed to read. `None` means that read failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Confirmed ERC20 balance.
    pub confirmed: Option<u64>,
    /// Pending ERC20 balance.
    pub pending: Option<u64>,
    /// Native ledger balance.
    pub native: Option<u64>,
}

impl BalanceSnapshot {
    /// `true` if every read succeeded.
    pub fn is_complete(&self) -> bool {
        self.confirmed.is_some() && self.pending.is_some() && self.native.is_some()
    }
}

/// Fetches and republishes balances.
pub struct BalanceSyncService {
    query: Arc<dyn LedgerQuery>,
    sink: Arc<dyn NotificationSink>,
}

impl BalanceSyncService {
    pub fn new(query: Arc<dyn LedgerQuery>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { query, sink }
    }

    /// Reads all three balances concurrently and publishes whatever came back.
    pub async fn refresh_all(&self) -> BalanceSnapshot {
        let (confirmed, pending, native) = tokio::join!(
            self.query.confirmed_balance(Ledger::Erc20),
            self.query.pending_balance(Ledger::Erc20),
            self.query.confirmed_balance(Ledger::Native),
        );

        let snapshot = BalanceSnapshot {
            confirmed: self.settle(Ledger::Erc20, BalanceKind::Confirmed, confirmed),
            pending: self.settle(Ledger::Erc20, BalanceKind::Pending, pending),
            native: self.settle(Ledger::Native, BalanceKind::Confirmed, native),
        };
        debug!(?snapshot, "balances refreshed");
        snapshot
    }

    /// Confirmed balances on both ledgers, all or nothing.
    ///
    /// Used as the "before" picture of a funding workflow, where a missing
    /// figure would make the finality target meaningless.
    pub async fn confirmed_pair(&self) -> WalletResult<(u64, u64)> {
        let (erc20, native) = tokio::join!(
            self.query.confirmed_balance(Ledger::Erc20),
            self.query.confirmed_balance(Ledger::Native),
        );
        let erc20 = erc20.map_err(|source| WalletError::Query {
            ledger: Ledger::Erc20,
            source,
        })?;
        let native = native.map_err(|source| WalletError::Query {
            ledger: Ledger::Native,
            source,
        })?;
        Ok((erc20, native))
    }

    fn settle(
        &self,
        ledger: Ledger,
        kind: BalanceKind,
        result: Result<u64, CollaboratorError>,
    ) -> Option<u64> {
        match result {
            Ok(amount) => {
                self.sink.publish(UiSignal::Balance {
                    ledger,
                    kind,
                    amount,
                });
                Some(amount)
            }
            Err(e) => {
                warn!(%ledger, ?kind, error = %e, "balance refresh failed");
                let what = match kind {
                    BalanceKind::Confirmed => format!("{} balance", ledger),
                    BalanceKind::Pending => format!("{} balance (pending)", ledger),
                };
                self.sink
                    .notify(Severity::Error, format!("failed to query for {}: {}", what, e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingSink;
    use async_trait::async_trait;

    struct Fixed {
        erc20: Result<u64, CollaboratorError>,
        pending: Result<u64, CollaboratorError>,
        native: Result<u64, CollaboratorError>,
    }

    #[async_trait]
    impl LedgerQuery for Fixed {
        async fn confirmed_balance(&self, ledger: Ledger) -> Result<u64, CollaboratorError> {
            match ledger {
                Ledger::Erc20 => self.erc20.clone(),
                Ledger::Native => self.native.clone(),
            }
        }

        async fn pending_balance(&self, _ledger: Ledger) -> Result<u64, CollaboratorError> {
            self.pending.clone()
        }
    }

    #[tokio::test]
    async fn refresh_publishes_all_three() {
        let sink = Arc::new(RecordingSink::new());
        let svc = BalanceSyncService::new(
            Arc::new(Fixed {
                erc20: Ok(100),
                pending: Ok(90),
                native: Ok(25),
            }),
            sink.clone(),
        );

        let snap = svc.refresh_all().await;
        assert!(snap.is_complete());
        assert_eq!(snap.native, Some(25));
        assert_eq!(sink.signals().len(), 3);
        assert!(sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_hide_the_others() {
        let sink = Arc::new(RecordingSink::new());
        let svc = BalanceSyncService::new(
            Arc::new(Fixed {
                erc20: Ok(100),
                pending: Err(CollaboratorError::transport("timeout")),
                native: Ok(25),
            }),
            sink.clone(),
        );

        let snap = svc.refresh_all().await;
        assert_eq!(
            snap,
            BalanceSnapshot {
                confirmed: Some(100),
                pending: None,
                native: Some(25),
            }
        );
        assert_eq!(sink.count(Severity::Error), 1);
        assert_eq!(sink.signals().len(), 2);
    }

    #[tokio::test]
    async fn every_failure_is_reported_separately() {
        let sink = Arc::new(RecordingSink::new());
        let svc = BalanceSyncService::new(
            Arc::new(Fixed {
                erc20: Err(CollaboratorError::transport("a")),
                pending: Err(CollaboratorError::transport("b")),
                native: Err(CollaboratorError::transport("c")),
            }),
            sink.clone(),
        );

        let snap = svc.refresh_all().await;
        assert_eq!(snap, BalanceSnapshot::default());
        assert_eq!(sink.count(Severity::Error), 3);
    }

    #[tokio::test]
    async fn confirmed_pair_fails_on_any_error() {
        let sink = Arc::new(RecordingSink::new());
        let svc = BalanceSyncService::new(
            Arc::new(Fixed {
                erc20: Ok(1),
                pending: Ok(1),
                native: Err(CollaboratorError::transport("down")),
            }),
            sink,
        );

        let err = svc.confirmed_pair().await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::Query {
                ledger: Ledger::Native,
                ..
            }
        ));
    }
}
