//! # Prometheus Metrics
//!
//! Counters fed from the wallet's event stream. Registered in a dedicated
//! [`prometheus::Registry`] under the `credpipe` prefix and dumped in the
//! text exposition format at the end of a run.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use credpipe_wallet::notify::{Severity, UiSignal, WalletEvent};

#[derive(Clone)]
pub struct ClientMetrics {
    registry: Registry,
    /// Credentials issued and stored.
    pub credentials_issued_total: IntCounter,
    /// Credentials marked spent.
    pub credentials_spent_total: IntCounter,
    /// Spends the verifier refused.
    pub spend_rejections_total: IntCounter,
    /// User notifications, by severity.
    pub notifications_total: IntCounterVec,
}

impl ClientMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("credpipe".into()), None)?;

        let credentials_issued_total = IntCounter::new(
            "credentials_issued_total",
            "Credentials issued and added to the store",
        )?;
        registry.register(Box::new(credentials_issued_total.clone()))?;

        let credentials_spent_total = IntCounter::new(
            "credentials_spent_total",
            "Credentials marked spent after a spend attempt",
        )?;
        registry.register(Box::new(credentials_spent_total.clone()))?;

        let spend_rejections_total = IntCounter::new(
            "spend_rejections_total",
            "Spend attempts the verifier refused, double spends included",
        )?;
        registry.register(Box::new(spend_rejections_total.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "User notifications by severity"),
            &["severity"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            registry,
            credentials_issued_total,
            credentials_spent_total,
            spend_rejections_total,
            notifications_total,
        })
    }

    /// Updates counters from one wallet event.
    pub fn observe(&self, event: &WalletEvent) {
        match event {
            WalletEvent::Notification { severity, .. } => {
                self.notifications_total
                    .with_label_values(&[severity_label(*severity)])
                    .inc();
            }
            WalletEvent::Signal(UiSignal::NewCredential(_)) => self.credentials_issued_total.inc(),
            WalletEvent::Signal(UiSignal::CredentialSpent { .. }) => {
                self.credentials_spent_total.inc()
            }
            WalletEvent::Signal(_) => {}
        }
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Metric label for a severity. Kept apart from the dialog titles.
fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use credpipe_wallet::credential::CredentialListItem;

    #[test]
    fn events_drive_counters() {
        let m = ClientMetrics::new().unwrap();
        m.observe(&WalletEvent::Signal(UiSignal::NewCredential(
            CredentialListItem {
                sequence: "ab".into(),
                credential: "AA==".into(),
                value: 10,
                issued_at: Utc::now(),
            },
        )));
        m.observe(&WalletEvent::Signal(UiSignal::CredentialSpent {
            sequence: "ab".into(),
        }));
        m.observe(&WalletEvent::Notification {
            severity: Severity::Warning,
            message: "x".into(),
        });
        m.observe(&WalletEvent::Signal(UiSignal::Busy(true)));

        assert_eq!(m.credentials_issued_total.get(), 1);
        assert_eq!(m.credentials_spent_total.get(), 1);
        assert_eq!(
            m.notifications_total.with_label_values(&["warning"]).get(),
            1
        );

        let text = m.encode().unwrap();
        assert!(text.contains("credpipe_credentials_issued_total 1"));
        assert!(text.contains("severity=\"warning\""));
    }

    #[test]
    fn info_notifications_use_the_info_label() {
        let m = ClientMetrics::new().unwrap();
        for severity in [Severity::Info, Severity::Info, Severity::Error] {
            m.observe(&WalletEvent::Notification {
                severity,
                message: "x".into(),
            });
        }

        assert_eq!(m.notifications_total.with_label_values(&["info"]).get(), 2);
        assert_eq!(m.notifications_total.with_label_values(&["error"]).get(), 1);
        let text = m.encode().unwrap();
        assert!(text.contains("severity=\"info\""));
        assert!(!text.contains("severity=\"notification\""));
    }
}
