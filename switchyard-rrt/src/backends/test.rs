use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use switchyard_common::{Mail, ProcessingState};
use tokio::sync::Notify;

use crate::{error::TransportError, transport::Transport};

/// A mail handed to [`RecordingTransport`], with the state it was sent to
#[derive(Debug)]
pub struct Injected {
    pub mail: Mail,
    pub state: Option<ProcessingState>,
}

impl Injected {
    /// The state the mail will be processed in next
    #[must_use]
    pub fn effective_state(&self) -> &ProcessingState {
        self.state.as_ref().unwrap_or_else(|| self.mail.state())
    }
}

/// Transport that keeps every injected mail for inspection
///
/// It can be told to refuse mail, to exercise failure handling.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    injected: Arc<Mutex<Vec<Injected>>>,
    refuse: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse, or stop refusing, every subsequent injection
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Remove and return everything injected so far
    #[must_use]
    pub fn take(&self) -> Vec<Injected> {
        std::mem::take(&mut *self.injected.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Wait until at least `expected` mails have been injected
    ///
    /// # Errors
    /// Returns an error if `timeout` elapses first
    pub async fn wait_for_count(
        &self,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.count() >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn inject(&self, mail: Mail, state: Option<ProcessingState>) -> Result<(), TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected {
                mail: mail.name(),
                reason: "refusing all mail".to_string(),
            });
        }

        self.injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Injected { mail, state });
        self.notify.notify_waiters();

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use switchyard_common::Envelope;

    use super::*;

    fn mail() -> Mail {
        Mail::new(Envelope::default(), b"Subject: t\r\n\r\n".as_slice())
    }

    #[tokio::test]
    async fn test_records_injected_mail() {
        let transport = RecordingTransport::new();
        transport.inject(mail(), None).await.unwrap();
        transport
            .inject(mail(), Some(ProcessingState::ERROR))
            .await
            .unwrap();

        transport
            .wait_for_count(2, Duration::from_secs(1))
            .await
            .unwrap();

        let injected = transport.take();
        assert_eq!(injected.len(), 2);
        assert_eq!(injected[0].effective_state(), &ProcessingState::ROOT);
        assert_eq!(injected[1].effective_state(), &ProcessingState::ERROR);
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn test_refusal() {
        let transport = RecordingTransport::new();
        transport.refuse(true);

        let result = transport.inject(mail(), None).await;
        assert!(matches!(result, Err(TransportError::Rejected { .. })));
        assert_eq!(transport.count(), 0);

        transport.refuse(false);
        assert!(transport.inject(mail(), None).await.is_ok());
    }
}
