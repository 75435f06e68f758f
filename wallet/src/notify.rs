//! # Notifications, UI Signals & the Busy Guard
//!
//! The wallet never talks to a UI toolkit directly. Everything it wants to
//! show goes through a [`NotificationSink`]:
//!
//! - **notifications** — one-way user messages, categorized as error,
//!   warning or info;
//! - **signals** — plain data pushes ([`UiSignal`]) for balances, new
//!   credentials, account status, busy indicators and the like.
//!
//! Neither expects an acknowledgment. A sink that drops everything on the
//! floor is a perfectly valid sink.
//!
//! [`EventBus`] fans events out over a `tokio::sync::broadcast` channel,
//! which is what the CLI and any UI adapter subscribe to.
//! [`RecordingSink`] keeps everything in memory for tests.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::chain::Ledger;
use crate::credential::CredentialListItem;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Category of a user notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// The dialog title the UI uses for this category.
    pub fn title(self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Notification",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// UI Signals
// ---------------------------------------------------------------------------

/// Which balance figure a [`UiSignal::Balance`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceKind {
    Confirmed,
    Pending,
}

/// Data pushed to the UI. No acknowledgment, no return path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiSignal {
    /// A freshly observed balance.
    Balance {
        ledger: Ledger,
        kind: BalanceKind,
        amount: u64,
    },
    /// A credential was issued and stored.
    NewCredential(CredentialListItem),
    /// A credential was marked spent.
    CredentialSpent { sequence: String },
    /// Whether the account is registered on the native ledger.
    AccountStatus(bool),
    /// Busy indicator on (`true`) or off (`false`).
    Busy(bool),
    /// The long-term secret, shown once to its owner.
    Secret(String),
    /// Credential values the user may request.
    ValueOptions(Vec<String>),
    /// Service providers the user may spend at.
    ProviderOptions(Vec<String>),
    /// Where the wallet is pointed, for display.
    Endpoints {
        ethereum_node: String,
        erc20_contract: String,
        pipe_account: String,
        issuing_authorities: Vec<String>,
        blockchain_nodes: Vec<String>,
    },
    /// A funding workflow finished; clear any "waiting for chain" label.
    Ready,
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Destination for notifications and UI signals.
pub trait NotificationSink: Send + Sync {
    /// Shows a message to the user.
    fn notify(&self, severity: Severity, message: String);

    /// Pushes a data update to the UI.
    fn publish(&self, signal: UiSignal);
}

/// Everything the wallet emits, as one stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEvent {
    Notification { severity: Severity, message: String },
    Signal(UiSignal),
}

/// Broadcast-backed sink. Subscribers that lag lose the oldest events;
/// nobody is blocked by a slow UI.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<WalletEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: WalletEvent) {
        // No subscribers is fine: nobody is looking.
        let _ = self.tx.send(event);
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, severity: Severity, message: String) {
        self.send(WalletEvent::Notification { severity, message });
    }

    fn publish(&self, signal: UiSignal) {
        self.send(WalletEvent::Signal(signal));
    }
}

/// Sink that remembers every event, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<WalletEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WalletEvent> {
        self.events.lock().clone()
    }

    pub fn notifications(&self) -> Vec<(Severity, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WalletEvent::Notification { severity, message } => {
                    Some((*severity, message.clone()))
                }
                WalletEvent::Signal(_) => None,
            })
            .collect()
    }

    pub fn signals(&self) -> Vec<UiSignal> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WalletEvent::Signal(s) => Some(s.clone()),
                WalletEvent::Notification { .. } => None,
            })
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.notifications()
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, severity: Severity, message: String) {
        self.events
            .lock()
            .push(WalletEvent::Notification { severity, message });
    }

    fn publish(&self, signal: UiSignal) {
        self.events.lock().push(WalletEvent::Signal(signal));
    }
}

// ---------------------------------------------------------------------------
// BusyGuard
// ---------------------------------------------------------------------------

/// Holds the busy indicator on for as long as it lives.
///
/// Acquiring publishes `Busy(true)`; dropping publishes `Busy(false)`.
/// Early returns, `?`, panics unwinding through the task: all of them drop
/// the guard, so the indicator always comes back.
#[must_use = "the busy indicator is released as soon as the guard is dropped"]
pub struct BusyGuard {
    sink: Arc<dyn NotificationSink>,
}

impl BusyGuard {
    pub fn acquire(sink: Arc<dyn NotificationSink>) -> Self {
        sink.publish(UiSignal::Busy(true));
        Self { sink }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.sink.publish(UiSignal::Busy(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_guard_toggles_on_scope_exit() {
        let sink = Arc::new(RecordingSink::new());
        {
            let _guard = BusyGuard::acquire(sink.clone());
            assert_eq!(sink.signals(), vec![UiSignal::Busy(true)]);
        }
        assert_eq!(
            sink.signals(),
            vec![UiSignal::Busy(true), UiSignal::Busy(false)]
        );
    }

    #[test]
    fn busy_guard_released_on_early_return() {
        fn fallible(sink: Arc<RecordingSink>) -> Result<(), &'static str> {
            let _guard = BusyGuard::acquire(sink);
            Err::<(), _>("boom")?;
            Ok(())
        }

        let sink = Arc::new(RecordingSink::new());
        assert!(fallible(sink.clone()).is_err());
        assert_eq!(sink.signals().last(), Some(&UiSignal::Busy(false)));
    }

    #[test]
    fn severity_titles() {
        assert_eq!(Severity::Error.title(), "Error");
        assert_eq!(Severity::Warning.title(), "Warning");
        assert_eq!(Severity::Info.title(), "Notification");
    }

    #[tokio::test]
    async fn event_bus_delivers_to_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.notify(Severity::Info, "hello".into());
        bus.publish(UiSignal::Ready);

        assert_eq!(
            rx.recv().await.unwrap(),
            WalletEvent::Notification {
                severity: Severity::Info,
                message: "hello".into()
            }
        );
        assert_eq!(rx.recv().await.unwrap(), WalletEvent::Signal(UiSignal::Ready));
    }

    #[test]
    fn event_bus_without_subscribers_does_not_fail() {
        let bus = EventBus::new(4);
        bus.notify(Severity::Error, "nobody listens".into());
    }

    #[test]
    fn recording_sink_counts_by_severity() {
        let sink = RecordingSink::new();
        sink.notify(Severity::Error, "a".into());
        sink.notify(Severity::Error, "b".into());
        sink.notify(Severity::Info, "c".into());
        assert_eq!(sink.count(Severity::Error), 2);
        assert_eq!(sink.count(Severity::Warning), 0);
    }
}
