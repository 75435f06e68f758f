//! # Session
//!
//! One [`Session`] per running wallet. It owns the configuration, the
//! credential store, the long-term account secret and the collaborator
//! handles, and every workflow takes it explicitly.
//!
//! The session is cheap to clone (one `Arc`), which is how background tasks
//! get hold of it. The `spawn_*` methods are the fire-and-forget surface a
//! UI calls into: each one turns the busy indicator on for exactly the
//! lifetime of the task, reports any error as an `Error` notification, and
//! hands back the `JoinHandle` for callers that do want the result.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::chain::{
    BalanceSnapshot, BalanceSyncService, CancelHandle, CancelSignal, ChainFinalityWatcher,
    LedgerQuery, LedgerSubmit,
};
use crate::config::{value_labels, ClientConfig};
use crate::credential::{
    AccountSecret, CredentialIssuer, CredentialStore, CredentialVerifier, IssuedCredentialRecord,
    RandomnessSource,
};
use crate::directory::ServiceProviderDirectory;
use crate::error::WalletResult;
use crate::notify::{BusyGuard, NotificationSink, Severity, UiSignal};
use crate::workflow::{self, FaucetOutcome, FundingOutcome};

/// External systems the wallet talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub query: Arc<dyn LedgerQuery>,
    pub submit: Arc<dyn LedgerSubmit>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub randomness: Arc<dyn RandomnessSource>,
}

/// The running wallet.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ClientConfig,
    directory: ServiceProviderDirectory,
    collaborators: Collaborators,
    sink: Arc<dyn NotificationSink>,
    store: CredentialStore,
    secret: AccountSecret,
    watcher: ChainFinalityWatcher,
    sync: BalanceSyncService,
    cancel: CancelHandle,
}

impl Session {
    /// Validates `config` and builds a session with a freshly generated
    /// account secret.
    pub fn new(
        config: ClientConfig,
        collaborators: Collaborators,
        sink: Arc<dyn NotificationSink>,
    ) -> WalletResult<Self> {
        let secret = collaborators.randomness.fresh_secret();
        Self::with_secret(config, collaborators, sink, secret)
    }

    /// Like [`Session::new`] but reuses an existing secret.
    pub fn with_secret(
        config: ClientConfig,
        collaborators: Collaborators,
        sink: Arc<dyn NotificationSink>,
        secret: AccountSecret,
    ) -> WalletResult<Self> {
        config.validate()?;
        let watcher = ChainFinalityWatcher::new(
            collaborators.query.clone(),
            sink.clone(),
            config.timing.poll_interval(),
        );
        let sync = BalanceSyncService::new(collaborators.query.clone(), sink.clone());
        let (cancel, _) = CancelSignal::channel();

        Ok(Self {
            inner: Arc::new(SessionInner {
                directory: ServiceProviderDirectory::from_config(&config),
                config,
                collaborators,
                sink,
                store: CredentialStore::new(),
                secret,
                watcher,
                sync,
                cancel,
            }),
        })
    }

    /// Publishes everything the UI needs before the first user action:
    /// the secret, the configured endpoints, the value and provider choices,
    /// and the account status.
    pub async fn bootstrap(&self) -> bool {
        let sink = self.sink();
        let config = self.config();
        sink.publish(UiSignal::Secret(self.secret().reveal_hex()));
        sink.publish(UiSignal::Endpoints {
            ethereum_node: config.primary_ethereum_node().to_string(),
            erc20_contract: config.erc20_contract.clone(),
            pipe_account: config.pipe_account.clone(),
            issuing_authorities: config.issuing_authorities.clone(),
            blockchain_nodes: config.blockchain_nodes.clone(),
        });
        sink.publish(UiSignal::ValueOptions(value_labels()));
        sink.publish(UiSignal::ProviderOptions(self.directory().ids()));

        let exists = match workflow::check_account_exists(self).await {
            Ok(exists) => exists,
            Err(e) => {
                sink.notify(Severity::Error, e.to_string());
                sink.publish(UiSignal::AccountStatus(false));
                false
            }
        };
        info!(
            identifier = %config.identifier,
            providers = self.directory().len(),
            account_registered = exists,
            "session ready"
        );
        exists
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn directory(&self) -> &ServiceProviderDirectory {
        &self.inner.directory
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.inner.collaborators
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.inner.sink
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn secret(&self) -> &AccountSecret {
        &self.inner.secret
    }

    pub fn watcher(&self) -> &ChainFinalityWatcher {
        &self.inner.watcher
    }

    pub fn sync(&self) -> &BalanceSyncService {
        &self.inner.sync
    }

    /// A signal that fires when [`Session::cancel_all`] is called.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.inner.cancel.signal()
    }

    /// Cancels every wait in progress and every wait started afterwards.
    /// Used on shutdown.
    pub fn cancel_all(&self) {
        info!("cancelling outstanding waits");
        self.inner.cancel.cancel();
    }

    /// Deadline for a finality wait starting now.
    pub fn finality_deadline(&self) -> Instant {
        Instant::now() + self.config().timing.finality_timeout()
    }

    // -----------------------------------------------------------------------
    // Synchronous actions
    // -----------------------------------------------------------------------

    /// Re-randomizes a stored credential and returns its new base64 form.
    /// Failures are also shown to the user.
    pub fn rerandomize(&self, sequence_id: &str) -> WalletResult<String> {
        workflow::rerandomize_credential(self, sequence_id).map_err(|e| {
            self.sink().notify(Severity::Error, e.to_string());
            e
        })
    }

    // -----------------------------------------------------------------------
    // Background actions
    // -----------------------------------------------------------------------

    pub fn spawn_refresh(&self) -> JoinHandle<WalletResult<BalanceSnapshot>> {
        self.spawn_task("refresh balances", |s| async move {
            Ok(s.sync().refresh_all().await)
        })
    }

    pub fn spawn_issue(
        &self,
        value: impl Into<String>,
    ) -> JoinHandle<WalletResult<IssuedCredentialRecord>> {
        let value = value.into();
        self.spawn_task("issue credential", move |s| async move {
            workflow::issue_credential(&s, &value).await
        })
    }

    pub fn spawn_spend(
        &self,
        provider_id: impl Into<String>,
        sequence_id: impl Into<String>,
    ) -> JoinHandle<WalletResult<bool>> {
        let provider_id = provider_id.into();
        let sequence_id = sequence_id.into();
        self.spawn_task("spend credential", move |s| async move {
            workflow::spend_credential(&s, &provider_id, &sequence_id).await
        })
    }

    pub fn spawn_transfer_to_pipe(
        &self,
        amount: impl Into<String>,
    ) -> JoinHandle<WalletResult<FundingOutcome>> {
        let amount = amount.into();
        self.spawn_task("transfer to pipe", move |s| async move {
            workflow::transfer_to_pipe(&s, &amount).await
        })
    }

    pub fn spawn_redeem(
        &self,
        amount: impl Into<String>,
    ) -> JoinHandle<WalletResult<FundingOutcome>> {
        let amount = amount.into();
        self.spawn_task("redeem", move |s| async move {
            workflow::redeem(&s, &amount).await
        })
    }

    pub fn spawn_faucet(&self) -> JoinHandle<WalletResult<FaucetOutcome>> {
        self.spawn_task("faucet", |s| async move { workflow::request_faucet(&s).await })
    }

    pub fn spawn_register_account(&self) -> JoinHandle<WalletResult<()>> {
        self.spawn_task("register account", |s| async move {
            workflow::register_account(&s).await
        })
    }

    /// Runs `work` on the runtime with the busy indicator held. An error is
    /// logged and shown before the indicator goes off.
    fn spawn_task<T, F, Fut>(&self, name: &'static str, work: F) -> JoinHandle<WalletResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(Session) -> Fut + Send + 'static,
        Fut: Future<Output = WalletResult<T>> + Send + 'static,
    {
        let session = self.clone();
        let span = info_span!("task", name);
        tokio::spawn(
            async move {
                let _busy = BusyGuard::acquire(session.sink().clone());
                let result = work(session.clone()).await;
                if let Err(e) = &result {
                    error!(kind = ?e.kind(), error = %e, "task failed");
                    session.sink().notify(Severity::Error, e.to_string());
                }
                result
            }
            .instrument(span),
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identifier", &self.config().identifier)
            .field("credentials", &self.store().len())
            .field("providers", &self.directory().len())
            .finish_non_exhaustive()
    }
}
