use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::{Envelope, UserNotification};

/// Final delivery target of queued events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct EventMessage<'a> {
    pattern: &'a str,
    data: &'a UserNotification,
}

/// Posts events to the mail service as JSON.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build notification http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for HttpSink {
    async fn deliver(&self, envelope: &Envelope) -> anyhow::Result<()> {
        let message = EventMessage {
            pattern: envelope.event.as_str(),
            data: &envelope.payload,
        };
        self.client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .with_context(|| format!("post {} event", envelope.event.as_str()))?
            .error_for_status()
            .context("mail service rejected event")?;
        Ok(())
    }
}

/// Used when no mail service is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, envelope: &Envelope) -> anyhow::Result<()> {
        info!(
            event = envelope.event.as_str(),
            user_id = %envelope.payload.id,
            email = %envelope.payload.email,
            "notification (no mail service configured)"
        );
        Ok(())
    }
}
