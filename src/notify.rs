//! Best-effort notifications.
//!
//! Delivery failures are logged and dropped; they never change the outcome
//! of the operation that triggered them.

use crate::config::PushoverConfig;
use crate::error::{MtarError, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    /// Every event, including individual tar writes and queue progress
    All,
    /// Queue completion and write completion only
    Limited,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyEvent {
    QueueProgress,
    QueueComplete,
    SegmentWritten,
    WriteComplete,
}

impl NotifyLevel {
    pub fn allows(&self, event: NotifyEvent) -> bool {
        match self {
            NotifyLevel::All => true,
            NotifyLevel::Limited => matches!(
                event,
                NotifyEvent::QueueComplete | NotifyEvent::WriteComplete
            ),
            NotifyLevel::None => false,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, message: &str) -> Result<()>;
}

/// Drops every message.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _title: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

pub struct PushoverNotifier {
    client: reqwest::Client,
    api_url: String,
    token: String,
    user: String,
}

impl PushoverNotifier {
    pub fn new(config: &PushoverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MtarError::notification(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| PUSHOVER_API_URL.to_string()),
            token: config.token.clone(),
            user: config.user.clone(),
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<()> {
        let form = [
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("title", title),
            ("message", message),
        ];

        let response = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| MtarError::notification(format!("pushover request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MtarError::notification(format!(
                "pushover responded with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// A notifier gated by a level.
pub struct Notifications {
    level: NotifyLevel,
    notifier: Box<dyn Notifier>,
}

impl Notifications {
    pub fn new(level: NotifyLevel, notifier: Box<dyn Notifier>) -> Self {
        Self { level, notifier }
    }

    pub fn disabled() -> Self {
        Self::new(NotifyLevel::None, Box::new(NullNotifier))
    }

    /// Send if the level allows `event`. Never fails.
    pub async fn notify(&self, event: NotifyEvent, title: &str, message: &str) {
        if !self.level.allows(event) {
            return;
        }

        match self.notifier.send(title, message).await {
            Ok(()) => debug!("Notification sent: {}", title),
            Err(e) => warn!("Notification '{}' not delivered: {}", title, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recording(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, title: &str, _message: &str) -> Result<()> {
            self.0.lock().push(title.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send(&self, _title: &str, _message: &str) -> Result<()> {
            Err(MtarError::notification("offline"))
        }
    }

    #[test]
    fn test_level_gates_events() {
        assert!(NotifyLevel::All.allows(NotifyEvent::SegmentWritten));
        assert!(NotifyLevel::Limited.allows(NotifyEvent::WriteComplete));
        assert!(NotifyLevel::Limited.allows(NotifyEvent::QueueComplete));
        assert!(!NotifyLevel::Limited.allows(NotifyEvent::QueueProgress));
        assert!(!NotifyLevel::None.allows(NotifyEvent::WriteComplete));
    }

    #[tokio::test]
    async fn test_limited_notifications() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifications =
            Notifications::new(NotifyLevel::Limited, Box::new(Recording(sent.clone())));

        notifications.notify(NotifyEvent::SegmentWritten, "tar 3", "").await;
        notifications.notify(NotifyEvent::WriteComplete, "done", "").await;

        assert_eq!(*sent.lock(), vec!["done".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let notifications = Notifications::new(NotifyLevel::All, Box::new(Failing));
        notifications.notify(NotifyEvent::WriteComplete, "done", "").await;
    }
}
