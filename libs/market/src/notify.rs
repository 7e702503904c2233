use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

/// Upper bound on a single delivery attempt.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Opaque id of a delivered message, used to thread replies onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub u64);

/// Chat transport that delivers notifications. Delivery is best effort.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends `text`, as a reply to `reply_to` when the transport can thread.
    async fn send(&self, text: &str, reply_to: Option<MessageHandle>) -> Result<MessageHandle>;
}

/// [`NotificationSink::send`] that gives up after `limit`, so a stuck
/// transport cannot hold a scheduled run open.
pub async fn send_within(
    sink: &dyn NotificationSink,
    limit: Duration,
    text: &str,
    reply_to: Option<MessageHandle>,
) -> Result<MessageHandle> {
    tokio::time::timeout(limit, sink.send(text, reply_to))
        .await
        .map_err(|_| anyhow!("send timed out after {}s", limit.as_secs_f64()))?
}
