use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use market::{MessageHandle, NotificationSink};
use serenity::all::{ChannelId, CreateMessage, Http, MessageId};
use tracing::debug;

/// Posts notifications to one Discord channel over the REST API. Holds its own
/// `Http` client so delivery keeps working while the gateway reconnects.
#[derive(Clone)]
pub struct ChannelSink {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelSink {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }

    pub fn from_token(token: &str, channel_id: u64) -> Self {
        Self::new(Arc::new(Http::new(token)), ChannelId::new(channel_id))
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn send(&self, text: &str, reply_to: Option<MessageHandle>) -> Result<MessageHandle> {
        let mut msg = CreateMessage::new().content(text);
        if let Some(MessageHandle(id)) = reply_to {
            msg = msg.reference_message((self.channel, MessageId::new(id)));
        }

        let sent = self.channel.send_message(&self.http, msg).await?;
        debug!(channel_id = %self.channel, message_id = %sent.id, "message sent");

        Ok(MessageHandle(sent.id.get()))
    }
}
