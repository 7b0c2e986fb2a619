use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::EmailSettings;
use crate::metrics::NOTIFICATIONS_TOTAL;

/// What happened. Carried verbatim to every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assigned,
    Completed,
    Reviewed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assigned => "assigned",
            NotificationKind::Completed => "completed",
            NotificationKind::Reviewed => "reviewed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient_id: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub subject: String,
    pub body: String,
    /// Structured payload for machine consumers (push channel), e.g.
    /// `{score, allCorrect}` on review completion.
    pub payload: serde_json::Value,
}

/// One delivery channel. Implementations may fail; the dispatcher logs and
/// moves on, so a channel outage can never reach the caller's transaction.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// SMTP channel. Sending can be disabled wholesale via `EMAIL_SEND_DISABLED`
/// or by leaving the email settings unconfigured.
pub struct EmailSink {
    settings: Option<EmailSettings>,
}

impl EmailSink {
    pub fn new(settings: Option<EmailSettings>) -> Self {
        Self { settings }
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn build_mailer(settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(settings.login.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        if Self::sending_disabled() {
            tracing::info!(
                "email sending disabled, skipping {} notification to {}",
                notification.kind.as_str(),
                notification.recipient_email
            );
            return Ok(());
        }

        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| anyhow!("Email settings are not configured"))?;

        let from_address: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .context("Invalid from email address")?;
        let to_address: Mailbox = format!(
            "{} <{}>",
            notification.recipient_name, notification.recipient_email
        )
        .parse()
        .context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(&notification.subject)
            .body(notification.body.clone())
            .context("Failed to build notification email")?;

        let mailer = Self::build_mailer(settings)?;
        mailer
            .send(email)
            .await
            .context("Failed to send notification email")?;

        Ok(())
    }
}

/// Webhook channel for push notifications. Posts the structured payload to
/// the configured endpoint.
pub struct PushSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl PushSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl NotificationSink for PushSink {
    fn channel(&self) -> &'static str {
        "push"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({
                "kind": notification.kind.as_str(),
                "recipientId": notification.recipient_id,
                "title": notification.subject,
                "payload": notification.payload,
            }))
            .send()
            .await
            .context("Failed to reach push webhook")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "push webhook returned HTTP {}",
                response.status().as_u16()
            ));
        }
        Ok(())
    }
}

/// Fans one notification out to every configured channel on background
/// tasks. Dispatch happens after the durable state change commits and is
/// never awaited on the hot path; each channel's failure is caught and
/// logged independently so one outage cannot suppress another channel.
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn dispatch(&self, notification: Notification) -> Vec<JoinHandle<()>> {
        self.sinks
            .iter()
            .map(|sink| {
                let sink = sink.clone();
                let notification = notification.clone();
                tokio::spawn(async move {
                    let channel = sink.channel();
                    match sink.deliver(&notification).await {
                        Ok(()) => {
                            NOTIFICATIONS_TOTAL
                                .with_label_values(&[channel, notification.kind.as_str(), "sent"])
                                .inc();
                            tracing::info!(
                                "delivered {} notification to {} via {}",
                                notification.kind.as_str(),
                                notification.recipient_email,
                                channel
                            );
                        }
                        Err(err) => {
                            NOTIFICATIONS_TOTAL
                                .with_label_values(&[channel, notification.kind.as_str(), "failed"])
                                .inc();
                            tracing::error!(
                                "failed to deliver {} notification to {} via {}: {:#}",
                                notification.kind.as_str(),
                                notification.recipient_email,
                                channel,
                                err
                            );
                        }
                    }
                })
            })
            .collect()
    }
}

/// Test doubles for the notification pipeline, also usable from the
/// integration suite.
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification instead of delivering it.
    #[derive(Default)]
    pub struct RecordingSink {
        pub delivered: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn channel(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, notification: &Notification) -> Result<()> {
            self.delivered
                .lock()
                .expect("recording mutex poisoned")
                .push(notification.clone());
            Ok(())
        }
    }

    /// Always fails; used to prove one channel's outage does not suppress
    /// the other.
    pub struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        fn channel(&self) -> &'static str {
            "failing"
        }

        async fn deliver(&self, _notification: &Notification) -> Result<()> {
            Err(anyhow!("channel is down"))
        }
    }
}
