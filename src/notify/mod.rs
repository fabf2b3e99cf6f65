//! Outbound notifications: onboarding email, SMTP delivery, and toasts.

pub mod email;
pub mod onboarding;
pub mod toast;

pub use email::{DisabledDelivery, EmailConfig, EmailDelivery, OutboundEmail, SmtpDelivery};
pub use onboarding::OnboardingNotifier;
pub use toast::{Toast, ToastKind, ToastLog, Toaster};
