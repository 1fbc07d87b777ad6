use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use super::error::ReportError;
use super::Alert;
use crate::config::{AlertConfig, SmtpConfig};

/// Outbound channel for failure alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), ReportError>;
}

/// Sends alerts as plain-text mail through an SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Address,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(alerts: &AlertConfig, smtp: &SmtpConfig) -> Result<Self, ReportError> {
        let from = alerts.from.parse::<Address>()?;
        let recipients = alerts
            .recipients
            .iter()
            .map(|addr| addr.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(ReportError::NoRecipients);
        }

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host).port(smtp.port);
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            recipients,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), ReportError> {
        let mut message = Message::builder()
            .from(Mailbox::new(
                Some(alert.channel.sender_name().to_string()),
                self.from.clone(),
            ))
            .subject(alert.channel.subject())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            message = message.to(recipient.clone());
        }
        let message = message.body(alert.body.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Used when no SMTP relay is configured; alerts only reach the log.
pub struct LogOnlyNotifier;

#[async_trait]
impl Notifier for LogOnlyNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), ReportError> {
        warn!(
            event = "alert_not_mailed",
            subject = alert.channel.subject(),
            "{}",
            alert.body
        );
        Ok(())
    }
}

/// Picks the SMTP notifier when a relay and recipients are configured,
/// otherwise log-only.
pub fn from_config(alerts: &AlertConfig) -> Result<Box<dyn Notifier>, ReportError> {
    match &alerts.smtp {
        Some(smtp) if !alerts.recipients.is_empty() => {
            Ok(Box::new(SmtpNotifier::new(alerts, smtp)?))
        }
        _ => Ok(Box::new(LogOnlyNotifier)),
    }
}
