//! Cancellation for chain waits.
//!
//! Built on a `tokio::sync::watch` channel: the session keeps the
//! [`CancelHandle`], every wait gets a cloned [`CancelSignal`]. Sending
//! `true` or dropping the handle cancels every wait still listening.

use tokio::sync::watch;

/// Fires the cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels every signal created from this handle, now and later.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// A new signal tied to this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Observes a [`CancelHandle`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A handle and its first signal.
    pub fn channel() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation fires (or the handle is dropped).
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let (handle, mut signal) = CancelSignal::channel();
        let waiter = tokio::spawn(async move { signal.cancelled().await });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn late_signal_sees_earlier_cancel() {
        let (handle, _first) = CancelSignal::channel();
        handle.cancel();
        let mut late = handle.signal();
        assert!(late.is_cancelled());
        late.cancelled().await;
    }

    #[tokio::test]
    async fn dropping_handle_cancels() {
        let (handle, mut signal) = CancelSignal::channel();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("dropped handle should cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn never_stays_pending() {
        let mut signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let res = tokio::time::timeout(Duration::from_secs(3600), signal.cancelled()).await;
        assert!(res.is_err());
    }
}
