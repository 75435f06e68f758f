//! # Chain Module — Ledgers, Finality & Balance Sync
//!
//! ```text
//! ledger.rs   — Ledger ids, tx handles, LedgerQuery / LedgerSubmit traits
//! cancel.rs   — watch-channel cancellation shared by every wait
//! watcher.rs  — Polls until a balance or transaction reaches finality
//! sync.rs     — Best-effort refresh of all displayed balances
//! ```
//!
//! "Finality" here is pragmatic: the moment a transaction's effect is
//! reliably visible through a balance query. Confirmation latency is
//! unbounded in practice, so every wait in this module takes a deadline
//! and a [`CancelSignal`].

pub mod cancel;
pub mod ledger;
pub mod sync;
pub mod watcher;

pub use cancel::{CancelHandle, CancelSignal};
pub use ledger::{FaucetReceipt, Ledger, LedgerQuery, LedgerSubmit, TxHandle};
pub use sync::{BalanceSnapshot, BalanceSyncService};
pub use watcher::ChainFinalityWatcher;
