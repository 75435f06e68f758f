//! # Devnet — In-Memory Collaborators
//!
//! A self-contained stand-in for the chain, the issuing authorities and the
//! verifiers. The CLI demo runs against it, and so do the integration
//! tests.
//!
//! It behaves like the real thing where the wallet cares:
//!
//! - Submissions settle after a delay, in two hops: the source ledger first,
//!   then the relayed credit on the other ledger.
//! - ERC20 has a pending balance that moves at submission time; the
//!   confirmed balance only moves once the transfer is "mined".
//! - The verifier remembers sequence numbers and refuses a second spend.
//! - Faults can be injected: unreachable nodes, rejected submissions, failed
//!   faucet transactions, credits that never arrive.
//!
//! Credentials are not real blind signatures. The issuer tags the token
//! with a keyed BLAKE3 hash and hides the tag under a per-credential
//! nonce, which is enough to make re-randomized credentials byte-distinct
//! while staying verifiable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::chain::{FaucetReceipt, Ledger, LedgerQuery, LedgerSubmit, TxHandle};
use crate::credential::{
    AccountSecret, Credential, CredentialIssuer, CredentialVerifier, RandomnessSource,
    SequenceNumber, Token,
};
use crate::error::CollaboratorError;
use crate::session::Collaborators;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Starting state and timing of a devnet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevnetConfig {
    /// Confirmed ERC20 balance at genesis.
    pub initial_erc20: u64,
    /// Native balance at genesis.
    pub initial_native: u64,
    /// Time for each settlement hop.
    pub settle_delay_ms: u64,
    /// Whether the account is already registered at genesis.
    pub account_registered: bool,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            initial_erc20: 1_000,
            initial_native: 0,
            settle_delay_ms: 5_000,
            account_registered: false,
        }
    }
}

impl DevnetConfig {
    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Everything a devnet run needs, wired together.
#[derive(Clone)]
pub struct Devnet {
    pub ledger: DevnetLedger,
    pub issuer: DevnetIssuer,
    pub verifier: DevnetVerifier,
}

impl Devnet {
    pub fn new(config: DevnetConfig) -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self {
            ledger: DevnetLedger::new(config),
            issuer: DevnetIssuer::new(key),
            verifier: DevnetVerifier::new(key),
        }
    }

    /// Collaborators backed by this devnet and the OS RNG.
    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with(Arc::new(crate::credential::OsRandomness))
    }

    /// Collaborators backed by this devnet and the given randomness.
    pub fn collaborators_with(&self, randomness: Arc<dyn RandomnessSource>) -> Collaborators {
        Collaborators {
            query: Arc::new(self.ledger.clone()),
            submit: Arc::new(self.ledger.clone()),
            issuer: Arc::new(self.issuer.clone()),
            verifier: Arc::new(self.verifier.clone()),
            randomness,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TxStatus {
    Pending,
    Resolved(bool),
}

#[derive(Debug)]
struct LedgerState {
    erc20: u64,
    /// ERC20 submitted but not yet mined. Negative effects only.
    erc20_in_flight: u64,
    native: u64,
    registered: bool,
    registration: Option<Vec<u8>>,
    txs: HashMap<String, TxStatus>,
}

/// Faults the next operations will hit.
#[derive(Debug, Default)]
struct Faults {
    /// Number of upcoming balance queries that fail.
    failing_queries: AtomicU32,
    reject_submissions: AtomicBool,
    fail_faucet_token_tx: AtomicBool,
    fail_faucet_native_tx: AtomicBool,
    /// Relayed credits are dropped, so the second hop never lands.
    stall_relay: AtomicBool,
    /// Transaction status lookups fail with a transport error.
    unreachable_tx_status: AtomicBool,
}

struct LedgerInner {
    config: DevnetConfig,
    state: RwLock<LedgerState>,
    faults: Faults,
    /// Bumped on every state change; waiters subscribe to it.
    version: watch::Sender<u64>,
    queries: AtomicU64,
    submissions: AtomicU64,
}

/// Both ledgers and the pipe account between them.
#[derive(Clone)]
pub struct DevnetLedger {
    inner: Arc<LedgerInner>,
}

impl DevnetLedger {
    pub fn new(config: DevnetConfig) -> Self {
        let state = LedgerState {
            erc20: config.initial_erc20,
            erc20_in_flight: 0,
            native: config.initial_native,
            registered: config.account_registered,
            registration: None,
            txs: HashMap::new(),
        };
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(LedgerInner {
                config,
                state: RwLock::new(state),
                faults: Faults::default(),
                version,
                queries: AtomicU64::new(0),
                submissions: AtomicU64::new(0),
            }),
        }
    }

    // -- fault injection ----------------------------------------------------

    /// The next `n` balance queries fail with a transport error.
    pub fn fail_next_queries(&self, n: u32) {
        self.inner.faults.failing_queries.store(n, Ordering::SeqCst);
    }

    /// Every submission is rejected until switched off again.
    pub fn reject_submissions(&self, reject: bool) {
        self.inner
            .faults
            .reject_submissions
            .store(reject, Ordering::SeqCst);
    }

    /// Faucet transactions on `ledger` resolve as failed.
    pub fn fail_faucet_tx(&self, ledger: Ledger, fail: bool) {
        let flag = match ledger {
            Ledger::Erc20 => &self.inner.faults.fail_faucet_token_tx,
            Ledger::Native => &self.inner.faults.fail_faucet_native_tx,
        };
        flag.store(fail, Ordering::SeqCst);
    }

    /// Relayed credits never land on the destination ledger.
    pub fn stall_relay(&self, stall: bool) {
        self.inner.faults.stall_relay.store(stall, Ordering::SeqCst);
    }

    /// Transaction status lookups fail as if the node were unreachable.
    pub fn fail_tx_resolution(&self, fail: bool) {
        self.inner
            .faults
            .unreachable_tx_status
            .store(fail, Ordering::SeqCst);
    }

    // -- inspection ---------------------------------------------------------

    /// Confirmed balances as `(erc20, native)`.
    pub fn balances(&self) -> (u64, u64) {
        let state = self.inner.state.read();
        (state.erc20, state.native)
    }

    /// Balance queries answered so far, failed ones included.
    pub fn query_count(&self) -> u64 {
        self.inner.queries.load(Ordering::SeqCst)
    }

    /// Submissions accepted so far.
    pub fn submission_count(&self) -> u64 {
        self.inner.submissions.load(Ordering::SeqCst)
    }

    pub fn registration(&self) -> Option<Vec<u8>> {
        self.inner.state.read().registration.clone()
    }

    // -- internals ----------------------------------------------------------

    fn mutate<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        let out = f(&mut self.inner.state.write());
        self.inner.version.send_modify(|v| *v += 1);
        out
    }

    fn new_tx(&self) -> TxHandle {
        let handle = TxHandle(format!("0x{}", Uuid::new_v4().simple()));
        self.mutate(|s| s.txs.insert(handle.0.clone(), TxStatus::Pending));
        handle
    }

    fn check_submission(&self) -> Result<(), CollaboratorError> {
        if self.inner.faults.reject_submissions.load(Ordering::SeqCst) {
            return Err(CollaboratorError::rejected("node refused the transaction"));
        }
        self.inner.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Runs `step` after one settle delay on a background task.
    fn after_delay(&self, hops: u32, step: impl FnOnce(&DevnetLedger) + Send + 'static) {
        let ledger = self.clone();
        let delay = self.inner.config.settle_delay() * hops;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            step(&ledger);
        });
    }

    fn relay_stalled(&self) -> bool {
        self.inner.faults.stall_relay.load(Ordering::SeqCst)
    }

    fn answer(
        &self,
        ledger: Ledger,
        read: impl FnOnce(&LedgerState) -> u64,
    ) -> Result<u64, CollaboratorError> {
        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        let failing = &self.inner.faults.failing_queries;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CollaboratorError::transport(format!(
                "{} node unreachable",
                ledger
            )));
        }
        Ok(read(&self.inner.state.read()))
    }
}

#[async_trait]
impl LedgerQuery for DevnetLedger {
    async fn confirmed_balance(&self, ledger: Ledger) -> Result<u64, CollaboratorError> {
        self.answer(ledger, |s| match ledger {
            Ledger::Erc20 => s.erc20,
            Ledger::Native => s.native,
        })
    }

    async fn pending_balance(&self, ledger: Ledger) -> Result<u64, CollaboratorError> {
        self.answer(ledger, |s| match ledger {
            Ledger::Erc20 => s.erc20.saturating_sub(s.erc20_in_flight),
            Ledger::Native => s.native,
        })
    }
}

#[async_trait]
impl LedgerSubmit for DevnetLedger {
    async fn transfer_to_pipe(&self, amount: u64) -> Result<TxHandle, CollaboratorError> {
        self.check_submission()?;
        self.mutate(|s| {
            if s.erc20.saturating_sub(s.erc20_in_flight) < amount {
                return Err(CollaboratorError::rejected("insufficient ERC20 balance"));
            }
            s.erc20_in_flight += amount;
            Ok(())
        })?;
        let tx = self.new_tx();
        debug!(%tx, amount, "devnet: transfer to pipe submitted");

        let mined = tx.clone();
        self.after_delay(1, move |ledger| {
            ledger.mutate(|s| {
                s.erc20_in_flight = s.erc20_in_flight.saturating_sub(amount);
                s.erc20 = s.erc20.saturating_sub(amount);
                s.txs.insert(mined.0.clone(), TxStatus::Resolved(true));
            });
        });
        if !self.relay_stalled() {
            self.after_delay(2, move |ledger| {
                ledger.mutate(|s| s.native += amount);
            });
        }
        Ok(tx)
    }

    async fn redeem(&self, amount: u64) -> Result<TxHandle, CollaboratorError> {
        self.check_submission()?;
        if self.inner.state.read().native < amount {
            return Err(CollaboratorError::rejected("insufficient native balance"));
        }
        let tx = self.new_tx();
        debug!(%tx, amount, "devnet: redeem submitted");

        let mined = tx.clone();
        self.after_delay(1, move |ledger| {
            ledger.mutate(|s| {
                s.native = s.native.saturating_sub(amount);
                s.txs.insert(mined.0.clone(), TxStatus::Resolved(true));
            });
        });
        if !self.relay_stalled() {
            self.after_delay(2, move |ledger| {
                ledger.mutate(|s| s.erc20 += amount);
            });
        }
        Ok(tx)
    }

    async fn request_faucet(&self, amount: u64) -> Result<FaucetReceipt, CollaboratorError> {
        self.check_submission()?;
        let receipt = FaucetReceipt {
            token_tx: self.new_tx(),
            native_tx: self.new_tx(),
        };
        let token_ok = !self.inner.faults.fail_faucet_token_tx.load(Ordering::SeqCst);
        let native_ok = !self.inner.faults.fail_faucet_native_tx.load(Ordering::SeqCst);
        debug!(amount, token_ok, native_ok, "devnet: faucet request");

        let token_tx = receipt.token_tx.0.clone();
        let native_tx = receipt.native_tx.0.clone();
        self.after_delay(1, move |ledger| {
            ledger.mutate(|s| {
                if token_ok {
                    s.erc20 += amount;
                }
                s.txs.insert(token_tx, TxStatus::Resolved(token_ok));
                // The native transfer only carries fee currency, which the
                // wallet does not display.
                s.txs.insert(native_tx, TxStatus::Resolved(native_ok));
            });
        });
        Ok(receipt)
    }

    async fn await_tx_resolution(&self, tx: &TxHandle) -> Result<bool, CollaboratorError> {
        if self.inner.faults.unreachable_tx_status.load(Ordering::SeqCst) {
            return Err(CollaboratorError::transport(format!(
                "status of {} unavailable",
                tx
            )));
        }
        let mut changes = self.inner.version.subscribe();
        loop {
            let status = self.inner.state.read().txs.get(&tx.0).copied();
            match status {
                None => {
                    return Err(CollaboratorError::rejected(format!(
                        "unknown transaction {}",
                        tx
                    )))
                }
                Some(TxStatus::Resolved(ok)) => return Ok(ok),
                Some(TxStatus::Pending) => trace!(%tx, "devnet: transaction still pending"),
            }
            if changes.changed().await.is_err() {
                return Err(CollaboratorError::transport("devnet shut down"));
            }
        }
    }

    async fn account_exists(&self) -> Result<bool, CollaboratorError> {
        Ok(self.inner.state.read().registered)
    }

    async fn register_account(&self, registration: &[u8]) -> Result<(), CollaboratorError> {
        self.check_submission()?;
        let registration = registration.to_vec();
        self.mutate(|s| {
            s.registered = true;
            s.registration = Some(registration);
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Credential scheme
// ---------------------------------------------------------------------------

/// Wire form of a devnet credential.
#[derive(Serialize, Deserialize)]
struct DevnetCredential {
    nonce: [u8; 32],
    /// `tag(token) XOR mask(nonce)`.
    masked_tag: [u8; 32],
}

impl DevnetCredential {
    fn encode(&self) -> Credential {
        // Serializing two fixed arrays cannot fail.
        Credential::from_bytes(bincode::serialize(self).unwrap_or_default())
    }

    fn decode(credential: &Credential) -> Option<Self> {
        bincode::deserialize(credential.as_bytes()).ok()
    }

    fn unmasked_tag(&self) -> [u8; 32] {
        xor(&self.masked_tag, &mask(&self.nonce))
    }
}

fn tag(key: &[u8; 32], token: &Token) -> [u8; 32] {
    *blake3::keyed_hash(key, &token.to_bytes()).as_bytes()
}

fn mask(nonce: &[u8; 32]) -> [u8; 32] {
    *blake3::hash(nonce).as_bytes()
}

fn xor(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

fn fresh_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Signs tokens with the devnet authority key.
#[derive(Clone)]
pub struct DevnetIssuer {
    key: [u8; 32],
    failing: Arc<AtomicBool>,
    issued: Arc<AtomicU64>,
}

impl DevnetIssuer {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            failing: Arc::new(AtomicBool::new(false)),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Makes the issuing authorities unreachable until switched back.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.failing.store(unreachable, Ordering::SeqCst);
    }

    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialIssuer for DevnetIssuer {
    async fn issue(&self, token: &Token) -> Result<Credential, CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::transport("issuing authorities unreachable"));
        }
        let nonce = fresh_nonce();
        let credential = DevnetCredential {
            masked_tag: xor(&tag(&self.key, token), &mask(&nonce)),
            nonce,
        };
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(credential.encode())
    }

    fn rerandomize(&self, credential: &Credential) -> Credential {
        let Some(old) = DevnetCredential::decode(credential) else {
            return credential.clone();
        };
        let nonce = fresh_nonce();
        DevnetCredential {
            masked_tag: xor(&old.unmasked_tag(), &mask(&nonce)),
            nonce,
        }
        .encode()
    }
}

/// Checks devnet credentials and remembers what was spent.
#[derive(Clone)]
pub struct DevnetVerifier {
    key: [u8; 32],
    /// Sequence hex -> provider it was spent at.
    spent: Arc<DashMap<String, String>>,
    unreachable: Arc<AtomicBool>,
    calls: Arc<AtomicU64>,
}

impl DevnetVerifier {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            spent: Arc::new(DashMap::new()),
            unreachable: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Spend calls received, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Provider a sequence was spent at, if any.
    pub fn spent_at(&self, sequence: &SequenceNumber) -> Option<String> {
        self.spent.get(&sequence.to_hex()).map(|p| p.value().clone())
    }
}

#[async_trait]
impl CredentialVerifier for DevnetVerifier {
    async fn spend(
        &self,
        token: &Token,
        credential: &Credential,
        provider_id: &str,
        provider_address: &str,
    ) -> Result<bool, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::transport(format!(
                "verifier at {} unreachable",
                provider_address
            )));
        }
        let valid = DevnetCredential::decode(credential)
            .map(|c| c.unmasked_tag() == tag(&self.key, token))
            .unwrap_or(false);
        if !valid {
            debug!(provider = %provider_id, "devnet: credential failed verification");
            return Ok(false);
        }
        match self.spent.entry(token.sequence().to_hex()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(provider = %provider_id, "devnet: double spend refused");
                Ok(false)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(provider_id.to_string());
                Ok(true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Reproducible randomness from a fixed seed.
pub struct SeededRandomness {
    rng: Mutex<StdRng>,
}

impl SeededRandomness {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }
}

impl RandomnessSource for SeededRandomness {
    fn fresh_sequence(&self) -> SequenceNumber {
        SequenceNumber::from_bytes(self.next_bytes())
    }

    fn fresh_secret(&self) -> AccountSecret {
        AccountSecret::from_bytes(self.next_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(seq: u8, value: u64) -> Token {
        Token::new(
            SequenceNumber::from_bytes([seq; 32]),
            AccountSecret::from_bytes([1; 32]),
            value,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn issued_credentials_verify_once() {
        let devnet = Devnet::new(DevnetConfig::default());
        let t = token(3, 10);
        let cred = devnet.issuer.issue(&t).await.unwrap();

        assert!(devnet.verifier.spend(&t, &cred, "sp", "0x1").await.unwrap());
        assert!(!devnet.verifier.spend(&t, &cred, "sp", "0x1").await.unwrap());
        assert_eq!(devnet.verifier.spent_at(t.sequence()).as_deref(), Some("sp"));
    }

    #[tokio::test]
    async fn rerandomized_credential_differs_but_verifies() {
        let devnet = Devnet::new(DevnetConfig::default());
        let t = token(4, 5);
        let cred = devnet.issuer.issue(&t).await.unwrap();
        let fresh = devnet.issuer.rerandomize(&cred);

        assert_ne!(cred, fresh);
        assert!(devnet.verifier.spend(&t, &fresh, "sp", "0x1").await.unwrap());
    }

    #[tokio::test]
    async fn credential_for_another_token_is_refused() {
        let devnet = Devnet::new(DevnetConfig::default());
        let cred = devnet.issuer.issue(&token(5, 10)).await.unwrap();
        assert!(!devnet
            .verifier
            .spend(&token(6, 10), &cred, "sp", "0x1")
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_settles_in_two_hops() {
        let ledger = DevnetLedger::new(DevnetConfig {
            initial_erc20: 100,
            settle_delay_ms: 1_000,
            ..DevnetConfig::default()
        });
        let tx = ledger.transfer_to_pipe(40).await.unwrap();

        assert_eq!(ledger.pending_balance(Ledger::Erc20).await.unwrap(), 60);
        assert_eq!(ledger.confirmed_balance(Ledger::Erc20).await.unwrap(), 100);

        assert!(ledger.await_tx_resolution(&tx).await.unwrap());
        assert_eq!(ledger.balances(), (60, 0));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(ledger.balances(), (60, 40));
    }

    #[tokio::test]
    async fn injected_query_failures_run_out() {
        let ledger = DevnetLedger::new(DevnetConfig::default());
        ledger.fail_next_queries(2);
        assert!(ledger.confirmed_balance(Ledger::Erc20).await.is_err());
        assert!(ledger.confirmed_balance(Ledger::Native).await.is_err());
        assert!(ledger.confirmed_balance(Ledger::Erc20).await.is_ok());
        assert_eq!(ledger.query_count(), 3);
    }

    #[tokio::test]
    async fn unknown_transaction_is_rejected() {
        let ledger = DevnetLedger::new(DevnetConfig::default());
        let err = ledger
            .await_tx_resolution(&TxHandle("0xnope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(_)));
    }

    #[test]
    fn seeded_randomness_is_reproducible() {
        let a = SeededRandomness::new(7);
        let b = SeededRandomness::new(7);
        assert_eq!(a.fresh_sequence(), b.fresh_sequence());
    }
}
