//! Outbound email delivery: SMTP via lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::DeliveryError;

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_SMTP_HOST` is not set (delivery disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("EMAIL_SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

/// A composed message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers composed email. Fire-and-forget from the caller's perspective.
#[async_trait]
pub trait EmailDelivery: Send + Sync {
    async fn deliver(&self, email: &OutboundEmail) -> Result<(), DeliveryError>;
}

/// Parse an address, mapping failures to `DeliveryError::InvalidAddress`.
pub fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Delivery over SMTP.
pub struct SmtpDelivery {
    config: EmailConfig,
}

impl SmtpDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, DeliveryError> {
        Message::builder()
            .from(parse_mailbox(&self.config.from_address)?)
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.clone())
            .body(email.body.clone())
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

#[async_trait]
impl EmailDelivery for SmtpDelivery {
    async fn deliver(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let message = self.build_message(email)?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        // lettre's SMTP transport is blocking.
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DeliveryError::Transport(format!("SMTP task panicked: {e}")))?
            .map_err(|e| DeliveryError::Transport(format!("SMTP send failed: {e}")))?;

        info!(to = %email.to, "Email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured: logs and drops the message.
pub struct DisabledDelivery;

#[async_trait]
impl EmailDelivery for DisabledDelivery {
    async fn deliver(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        parse_mailbox(&email.to)?;
        warn!(to = %email.to, subject = %email.subject, "SMTP not configured, email dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.test".into(),
            smtp_port: 587,
            username: "bot".into(),
            password: SecretString::from("pw"),
            from_address: "Agent Studio <hello@studio.test>".into(),
        }
    }

    #[test]
    fn builds_message_with_display_name_sender() {
        let delivery = SmtpDelivery::new(config());
        let message = delivery
            .build_message(&OutboundEmail {
                to: "a@b.com".into(),
                subject: "Hi".into(),
                body: "Body".into(),
            })
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains("Subject: Hi"));
    }

    #[test]
    fn invalid_recipient_is_reported() {
        let delivery = SmtpDelivery::new(config());
        let err = delivery
            .build_message(&OutboundEmail {
                to: "not an address".into(),
                subject: "Hi".into(),
                body: "Body".into(),
            })
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn disabled_delivery_still_validates() {
        let ok = OutboundEmail {
            to: "a@b.com".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(DisabledDelivery.deliver(&ok).await.is_ok());

        let bad = OutboundEmail {
            to: "nope".into(),
            ..ok
        };
        assert!(DisabledDelivery.deliver(&bad).await.is_err());
    }
}
