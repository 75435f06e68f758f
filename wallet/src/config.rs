//! # Client Configuration & Constants
//!
//! Every magic number the wallet uses lives here, next to the TOML-backed
//! [`ClientConfig`] that a deployment actually edits. If you're hardcoding
//! a poll interval somewhere else, you're doing it wrong.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Credential Values
// ---------------------------------------------------------------------------

/// The only denominations the credential scheme will sign. Anything else
/// is rejected at token construction, before any network call happens.
pub const ALLOWED_VALUES: [u64; 7] = [1, 2, 5, 10, 20, 50, 100];

/// Display suffix for credential values. The UI shows `"10Nym"`, and the
/// issuance workflow accepts input with or without it.
pub const VALUE_SUFFIX: &str = "Nym";

// ---------------------------------------------------------------------------
// Timing Defaults
// ---------------------------------------------------------------------------

/// How often the finality watcher re-reads a balance. Two seconds is
/// roughly one block on the chains this talks to; polling faster just
/// burns RPC quota.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// How long a funding workflow waits for both ledgers to converge before
/// giving up. Ethereum on a bad day is slow, so be generous.
pub const DEFAULT_FINALITY_TIMEOUT_MS: u64 = 120_000;

/// Amount requested from the faucet. The faucet decides what it actually
/// sends, which is why faucet requests wait on transaction confirmation
/// instead of balance equality.
pub const DEFAULT_FAUCET_AMOUNT: u64 = 50;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Spend Policy
// ---------------------------------------------------------------------------

/// When the spend workflow marks a credential as spent.
///
/// The default marks every attempted credential, so a retry of the same
/// credential visibly hits the verifier's double-spend rejection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPolicy {
    /// Mark spent after every attempt, including transport errors.
    #[default]
    Always,
    /// Mark spent whenever the verifier returned a verdict (true or false),
    /// but not when the call itself failed.
    AfterVerdict,
    /// Mark spent only when the verifier accepted the credential.
    SuccessOnly,
}

impl SpendPolicy {
    /// Decides whether a spend attempt with the given outcome marks the
    /// credential. `None` means the verifier call errored.
    pub fn marks_spent(self, verdict: Option<bool>) -> bool {
        match self {
            SpendPolicy::Always => true,
            SpendPolicy::AfterVerdict => verdict.is_some(),
            SpendPolicy::SuccessOnly => verdict == Some(true),
        }
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Poll and deadline settings for chain finality waits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// Milliseconds between balance polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum milliseconds a single funding workflow waits for finality.
    #[serde(default = "default_finality_timeout_ms")]
    pub finality_timeout_ms: u64,

    /// Amount requested from the faucet.
    #[serde(default = "default_faucet_amount")]
    pub faucet_amount: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_finality_timeout_ms() -> u64 {
    DEFAULT_FINALITY_TIMEOUT_MS
}

fn default_faucet_amount() -> u64 {
    DEFAULT_FAUCET_AMOUNT
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            finality_timeout_ms: DEFAULT_FINALITY_TIMEOUT_MS,
            faucet_amount: DEFAULT_FAUCET_AMOUNT,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything a wallet session needs to know about its environment.
///
/// Read-only once a session is built. Loaded from TOML:
///
/// ```toml
/// identifier = "alice"
/// account_keys_file = "/home/alice/.credpipe/account.key"
/// ethereum_nodes = ["https://ropsten.example.org"]
/// erc20_contract = "0x5a6c6b7d..."
/// pipe_account = "0x1c2d3e4f..."
///
/// [service_providers]
/// sp1 = "0x7a8b9c0d..."
///
/// [timing]
/// poll_interval_ms = 2000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Human-readable client identifier.
    pub identifier: String,

    /// Path to the account key file. Only displayed; key handling is the
    /// RPC client's business.
    #[serde(default)]
    pub account_keys_file: PathBuf,

    /// Ethereum RPC endpoints. The first one is the one shown to the user.
    #[serde(default)]
    pub ethereum_nodes: Vec<String>,

    /// Address of the ERC20 token contract.
    #[serde(default)]
    pub erc20_contract: String,

    /// Address of the pipe account bridging the two ledgers.
    #[serde(default)]
    pub pipe_account: String,

    /// Issuing authority endpoints.
    #[serde(default)]
    pub issuing_authorities: Vec<String>,

    /// Native-ledger node endpoints.
    #[serde(default)]
    pub blockchain_nodes: Vec<String>,

    /// Service provider directory: provider id -> ledger address.
    #[serde(default)]
    pub service_providers: BTreeMap<String, String>,

    /// When spend attempts mark a credential as spent.
    #[serde(default)]
    pub spend_policy: SpendPolicy,

    /// Poll and deadline settings.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl ClientConfig {
    /// A minimal configuration with default timing and no endpoints.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            account_keys_file: PathBuf::new(),
            ethereum_nodes: Vec::new(),
            erc20_contract: String::new(),
            pipe_account: String::new(),
            issuing_authorities: Vec::new(),
            blockchain_nodes: Vec::new(),
            service_providers: BTreeMap::new(),
            spend_policy: SpendPolicy::default(),
            timing: TimingConfig::default(),
        }
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// A `file://` prefix is stripped, because file pickers love adding one.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = path.as_ref().to_string_lossy();
        let path = PathBuf::from(raw.strip_prefix("file://").unwrap_or(&raw));

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the workflows cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.poll_interval_ms must be positive".into(),
            ));
        }
        if self.timing.finality_timeout_ms < self.timing.poll_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "timing.finality_timeout_ms ({}) is shorter than one poll interval ({})",
                self.timing.finality_timeout_ms, self.timing.poll_interval_ms
            )));
        }
        if self.timing.faucet_amount == 0 {
            return Err(ConfigError::Invalid(
                "timing.faucet_amount must be positive".into(),
            ));
        }
        if let Some((id, _)) = self
            .service_providers
            .iter()
            .find(|(_, addr)| addr.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "service provider '{}' has an empty address",
                id
            )));
        }
        Ok(())
    }

    /// The endpoint shown in the UI, or `"none specified"`.
    pub fn primary_ethereum_node(&self) -> &str {
        self.ethereum_nodes
            .first()
            .map(String::as_str)
            .unwrap_or("none specified")
    }
}

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns `true` if the scheme can sign a credential of this value.
pub fn is_allowed_value(value: u64) -> bool {
    ALLOWED_VALUES.contains(&value)
}

/// The value list offered to the user, e.g. `["1Nym", "2Nym", ...]`.
pub fn value_labels() -> Vec<String> {
    ALLOWED_VALUES
        .iter()
        .map(|v| format!("{}{}", v, VALUE_SUFFIX))
        .collect()
}
