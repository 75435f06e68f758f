// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # credpipe — Credential Wallet Orchestration
//!
//! This crate drives the lifecycle of anonymous value credentials backed by
//! a two-ledger account: an ERC20-style token ledger and a native token
//! ledger bridged through a pipe account. Funds move from the ERC20 side to
//! the native side, get converted into blind-signed credentials, and those
//! credentials are later spent at third-party service providers.
//!
//! The cryptography is somebody else's job. The credential scheme, the
//! chain RPC client and the UI are collaborators behind traits; what lives
//! here is the part that has to survive the real world: calls that fail,
//! transactions that take forever to show up, and a credential map touched
//! from several tasks at once.
//!
//! ## Architecture
//!
//! - **credential** — Tokens, opaque credentials, and the concurrent
//!   credential store.
//! - **chain** — Ledger collaborator traits, the finality watcher that polls
//!   until balances converge, and the best-effort balance sync.
//! - **workflow** — Issuance, spend, funding and account workflows.
//! - **session** — The explicit session object: collaborators, config,
//!   store and secret, plus the fire-and-forget task launcher.
//! - **directory** — Service provider id to address lookup.
//! - **notify** — Notifications and UI signals, and the busy-indicator
//!   guard that is released on every exit path.
//! - **devnet** — In-memory collaborators for tests and the CLI demo.
//! - **config** — Constants and the TOML client configuration.
//!
//! ## Ground Rules
//!
//! 1. Amounts are `u64`. No floats anywhere near money.
//! 2. Nothing retries on its own. Every retry is a fresh user action.
//! 3. Every wait has a deadline and a cancellation signal. Nothing hangs.
//! 4. The busy indicator is a guard, not a pair of calls someone can forget.

pub mod chain;
pub mod config;
pub mod credential;
pub mod devnet;
pub mod directory;
pub mod error;
pub mod notify;
pub mod session;
pub mod workflow;

pub use error::{CollaboratorError, ErrorKind, WalletError, WalletResult};
pub use directory::ServiceProviderDirectory;
pub use session::{Collaborators, Session};
