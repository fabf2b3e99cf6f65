//! Onboarding notifier: composes the "your agent is live" email and hands
//! it to the delivery collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tracing::{error, info};

use super::email::{EmailDelivery, OutboundEmail};
use super::toast::{ToastKind, Toaster};
use crate::error::DeliveryError;
use crate::records::model::PersistedAgentRecord;

/// Used in place of a missing agent name.
pub const FALLBACK_AGENT_NAME: &str = "Your AI Agent";

const FAILURE_MESSAGE: &str = "Failed to send onboarding email. Please try again.";

/// Compose the onboarding email for `record`.
pub fn compose_onboarding_email(
    record: &PersistedAgentRecord,
    dashboard_url: &str,
) -> Result<OutboundEmail, DeliveryError> {
    let address = record
        .agent
        .email
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| DeliveryError::InvalidAddress {
            address: String::new(),
            reason: format!("agent {} has no assigned address", record.id()),
        })?;

    let name = record.agent.display_name().unwrap_or(FALLBACK_AGENT_NAME);
    let link = format!(
        "{}/agents/{}",
        dashboard_url.trim_end_matches('/'),
        record.id()
    );

    let body = format!(
        "Hi there,\n\n\
         {name} is set up and ready to start handling your email.\n\n\
         Agent address: {address}\n\
         Dashboard: {link}\n\n\
         From the dashboard you can review replies, adjust the tone, and upload \
         more knowledge files at any time.\n\n\
         The Agent Studio team\n"
    );

    Ok(OutboundEmail {
        to: address.to_string(),
        subject: format!("{name} is live"),
        body,
    })
}

/// Sends onboarding emails and tracks whether one is in flight.
pub struct OnboardingNotifier {
    delivery: Arc<dyn EmailDelivery>,
    toaster: Arc<dyn Toaster>,
    dashboard_url: String,
    in_flight_count: AtomicUsize,
    in_flight: watch::Sender<bool>,
}

impl OnboardingNotifier {
    pub fn new(
        delivery: Arc<dyn EmailDelivery>,
        toaster: Arc<dyn Toaster>,
        dashboard_url: impl Into<String>,
    ) -> Self {
        let (in_flight, _rx) = watch::channel(false);
        Self {
            delivery,
            toaster,
            dashboard_url: dashboard_url.into(),
            in_flight_count: AtomicUsize::new(0),
            in_flight,
        }
    }

    /// Whether any send is in flight.
    pub fn is_sending(&self) -> bool {
        *self.in_flight.borrow()
    }

    /// Watch the in-flight flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.in_flight.subscribe()
    }

    /// Compose and deliver the onboarding email. Failures are logged in full
    /// but reported to the user generically. No automatic retry.
    pub async fn send(&self, record: &PersistedAgentRecord) -> Result<(), DeliveryError> {
        self.begin();

        let outcome = match compose_onboarding_email(record, &self.dashboard_url) {
            Ok(email) => self.delivery.deliver(&email).await.map(|()| email.to),
            Err(e) => Err(e),
        };

        self.finish();

        match outcome {
            Ok(to) => {
                info!(agent_id = %record.id(), to = %to, "Onboarding email sent");
                self.toaster.notify(
                    ToastKind::Success,
                    "Email sent",
                    &format!("Onboarding email sent to {to}"),
                );
                Ok(())
            }
            Err(e) => {
                error!(agent_id = %record.id(), error = %e, "Onboarding email failed");
                self.toaster.notify(ToastKind::Error, "Error", FAILURE_MESSAGE);
                Err(e)
            }
        }
    }

    fn begin(&self) {
        self.in_flight_count.fetch_add(1, Ordering::SeqCst);
        self.in_flight.send_replace(true);
    }

    fn finish(&self) {
        // Overlapping sends keep the flag up until the last one finishes.
        if self.in_flight_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.send_replace(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::notify::toast::ToastLog;
    use crate::records::model::AgentRow;

    /// Records deliveries and the in-flight flag observed during each one.
    struct RecordingDelivery {
        flag: Mutex<Option<watch::Receiver<bool>>>,
        sent: Mutex<Vec<(OutboundEmail, bool)>>,
        fail: bool,
    }

    impl RecordingDelivery {
        fn new(fail: bool) -> Self {
            Self {
                flag: Mutex::new(None),
                sent: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl EmailDelivery for RecordingDelivery {
        async fn deliver(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
            let in_flight = self
                .flag
                .lock()
                .unwrap()
                .as_ref()
                .map(|rx| *rx.borrow())
                .unwrap_or(false);
            self.sent.lock().unwrap().push((email.clone(), in_flight));
            if self.fail {
                return Err(DeliveryError::Transport("535 auth rejected".into()));
            }
            Ok(())
        }
    }

    fn record(name: Option<&str>, email: Option<&str>) -> PersistedAgentRecord {
        let mut agent = AgentRow::new("agent-42");
        agent.name = name.map(String::from);
        agent.email = email.map(String::from);
        PersistedAgentRecord::merge(agent, vec![])
    }

    fn notifier(fail: bool) -> (Arc<RecordingDelivery>, Arc<ToastLog>, OnboardingNotifier) {
        let delivery = Arc::new(RecordingDelivery::new(fail));
        let toasts = Arc::new(ToastLog::default());
        let notifier = OnboardingNotifier::new(
            Arc::clone(&delivery) as Arc<dyn EmailDelivery>,
            Arc::clone(&toasts) as Arc<dyn Toaster>,
            "https://studio.test/",
        );
        *delivery.flag.lock().unwrap() = Some(notifier.subscribe());
        (delivery, toasts, notifier)
    }

    #[tokio::test]
    async fn send_success_toggles_flag_and_toasts_once() {
        let (delivery, toasts, notifier) = notifier(false);
        assert!(!notifier.is_sending());

        notifier
            .send(&record(Some("Acme"), Some("a@b.com")))
            .await
            .unwrap();

        assert!(!notifier.is_sending());
        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (email, in_flight_during) = &sent[0];
        assert!(*in_flight_during, "flag must be up while delivering");
        assert_eq!(email.to, "a@b.com");
        assert!(email.subject.contains("Acme"));
        assert!(email.body.contains("https://studio.test/agents/agent-42"));
        assert_eq!(toasts.count(ToastKind::Success), 1);
        assert_eq!(toasts.count(ToastKind::Error), 0);
    }

    #[tokio::test]
    async fn failure_is_generic_and_clears_flag() {
        let (_delivery, toasts, notifier) = notifier(true);
        let err = notifier
            .send(&record(Some("Acme"), Some("a@b.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
        assert!(!notifier.is_sending());

        let recent = toasts.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, ToastKind::Error);
        assert!(!recent[0].message.contains("535"));
    }

    #[tokio::test]
    async fn missing_address_fails_without_delivery() {
        let (delivery, toasts, notifier) = notifier(false);
        assert!(notifier.send(&record(Some("Acme"), None)).await.is_err());
        assert!(delivery.sent.lock().unwrap().is_empty());
        assert_eq!(toasts.count(ToastKind::Error), 1);
        assert!(!notifier.is_sending());
    }

    #[tokio::test]
    async fn caller_may_retry_after_failure() {
        let (delivery, _toasts, notifier) = notifier(true);
        let target = record(None, Some("a@b.com"));
        assert!(notifier.send(&target).await.is_err());
        assert!(notifier.send(&target).await.is_err());
        assert_eq!(delivery.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn compose_falls_back_to_generic_name() {
        let email = compose_onboarding_email(&record(Some("  "), Some("x@y.com")), "https://d").unwrap();
        assert!(email.subject.starts_with(FALLBACK_AGENT_NAME));
        assert!(email.body.contains("Agent address: x@y.com"));
        assert!(email.body.contains("Dashboard: https://d/agents/agent-42"));
    }
}
