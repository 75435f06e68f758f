//! # Chain Finality Watcher
//!
//! Submitting a transaction is the easy part. Knowing when its effect is
//! actually visible is where the time goes: an ERC20 transfer needs to be
//! mined, and the native ledger credit only shows up after the pipe
//! account's watchers have relayed it.
//!
//! The watcher polls a [`LedgerQuery`] on a fixed interval until the
//! balance equals the expected target exactly, or the deadline passes, or
//! the wait is cancelled.
//!
//! ## Rules
//!
//! 1. **The interval is sacred.** A failing query does not cause a retry
//!    storm; the next attempt happens on the next tick.
//! 2. **Query errors are not fatal.** They are reported to the sink and the
//!    wait carries on. Only the deadline or cancellation ends a wait early.
//! 3. **Progress is visible.** Every tick republishes the latest confirmed
//!    (and, for ERC20, pending) balance, so a wait that eventually times out
//!    still shows the user where things got to.
//! 4. **A match is only a match on fresh data.** The target must be equal to
//!    what *this* tick observed, not something remembered from earlier.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::ledger::{Ledger, LedgerQuery, LedgerSubmit, TxHandle};
use crate::error::{WalletError, WalletResult};
use crate::notify::{BalanceKind, NotificationSink, Severity, UiSignal};

/// Shortest poll interval. Tokio's interval timer rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Polls ledger state until it converges on an expected value.
pub struct ChainFinalityWatcher {
    query: Arc<dyn LedgerQuery>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
}

/// Balances seen on the most recent successful reads.
#[derive(Default)]
struct LastSeen {
    confirmed: Option<u64>,
    pending: Option<u64>,
}

impl ChainFinalityWatcher {
    /// `interval` is raised to 1ms if shorter.
    pub fn new(
        query: Arc<dyn LedgerQuery>,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
    ) -> Self {
        Self {
            query,
            sink,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the confirmed balance on `ledger` equals `target`.
    ///
    /// The first poll happens one interval after the call. Returns the
    /// observed balance on a match.
    ///
    /// # Errors
    ///
    /// [`WalletError::DeadlineExceeded`] if `deadline` passes or `cancel`
    /// fires first. Nothing else ends the wait.
    pub async fn await_balance(
        &self,
        ledger: Ledger,
        target: u64,
        deadline: Instant,
        mut cancel: CancelSignal,
    ) -> WalletResult<u64> {
        let started = Instant::now();
        let waited_for = format!("{} balance {}", ledger, target);

        let mut ticker = time::interval_at(started + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let expiry = time::sleep_until(deadline);
        tokio::pin!(expiry);

        let mut last = LastSeen::default();
        let mut polls: u32 = 0;

        debug!(%ledger, target, "waiting for balance");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(gave_up(waited_for, started));
                }
                _ = &mut expiry => {
                    return Err(gave_up(waited_for, started));
                }
                _ = ticker.tick() => {}
            }

            // The query itself is raced against the deadline too; a hung
            // RPC call must not outlive the wait.
            let observed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(gave_up(waited_for, started));
                }
                _ = &mut expiry => {
                    return Err(gave_up(waited_for, started));
                }
                observed = self.poll_once(ledger, &mut last) => observed,
            };
            polls += 1;

            if observed == Some(target) {
                info!(
                    %ledger,
                    target,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "balance reached target"
                );
                return Ok(target);
            }
        }
    }

    /// Waits for a submitted transaction to resolve.
    ///
    /// Returns the ledger's verdict (`true` = succeeded). A transport error
    /// from the collaborator ends the wait with a query error; there is
    /// nothing to poll in between.
    pub async fn await_resolution(
        &self,
        submit: &dyn LedgerSubmit,
        ledger: Ledger,
        tx: &TxHandle,
        deadline: Instant,
        mut cancel: CancelSignal,
    ) -> WalletResult<bool> {
        let started = Instant::now();
        let waited_for = format!("{} transaction {}", ledger, tx);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(gave_up(waited_for, started)),
            _ = time::sleep_until(deadline) => Err(gave_up(waited_for, started)),
            res = submit.await_tx_resolution(tx) => {
                let ok = res.map_err(|source| WalletError::Query { ledger, source })?;
                debug!(%ledger, %tx, success = ok, "transaction resolved");
                Ok(ok)
            }
        }
    }

    /// One tick: read, publish, report. Returns this tick's confirmed
    /// balance, or `None` if the read failed.
    async fn poll_once(&self, ledger: Ledger, last: &mut LastSeen) -> Option<u64> {
        let confirmed = match self.query.confirmed_balance(ledger).await {
            Ok(amount) => {
                last.confirmed = Some(amount);
                Some(amount)
            }
            Err(e) => {
                warn!(%ledger, error = %e, "balance query failed, will retry next tick");
                self.sink.notify(
                    Severity::Error,
                    format!("failed to query for {} balance: {}", ledger, e),
                );
                None
            }
        };
        if let Some(amount) = last.confirmed {
            self.sink.publish(UiSignal::Balance {
                ledger,
                kind: BalanceKind::Confirmed,
                amount,
            });
        }

        if ledger.tracks_pending() {
            match self.query.pending_balance(ledger).await {
                Ok(amount) => last.pending = Some(amount),
                Err(e) => {
                    warn!(%ledger, error = %e, "pending balance query failed");
                    self.sink.notify(
                        Severity::Error,
                        format!("failed to query for {} balance (pending): {}", ledger, e),
                    );
                }
            }
            if let Some(amount) = last.pending {
                self.sink.publish(UiSignal::Balance {
                    ledger,
                    kind: BalanceKind::Pending,
                    amount,
                });
            }
        }

        confirmed
    }
}

fn gave_up(waited_for: String, started: Instant) -> WalletError {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    warn!(waited_for = %waited_for, elapsed_ms, "wait ended before target was observed");
    WalletError::DeadlineExceeded {
        waited_for,
        elapsed_ms,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
