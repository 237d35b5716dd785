use serde::Deserialize;

use propwire_common::{ApiError, RequestDescriptor};

use crate::{
    client::ApiClient,
    types::{ChannelSnapshot, ChatChannelSummary, ChatMessage},
};

/// Event the backend broadcasts on a conversation's private channel when
/// a message lands.
pub const EVENT_MESSAGE_SENT: &str = "MessageSent";

/// Payload of [`EVENT_MESSAGE_SENT`]: `{"message": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEnvelope {
    pub message: ChatMessage,
}

impl ApiClient {
    pub async fn chat_channels(&self) -> Result<Vec<ChatChannelSummary>, ApiError> {
        self.fetch(RequestDescriptor::get("agent/chat")).await
    }

    /// Fetch one conversation: history, members, and the requesting
    /// user's id.
    pub async fn chat_channel(&self, id: u64) -> Result<ChannelSnapshot, ApiError> {
        self.fetch(RequestDescriptor::get(format!("agent/chat/channels/{id}")))
            .await
    }

    /// Post a message. Delivery back to subscribers happens over the
    /// realtime channel, not in this response.
    pub async fn send_message(&self, channel_id: u64, message: &str) -> Result<(), ApiError> {
        self.fetch_unit(
            RequestDescriptor::post(format!("agent/chat/channels/{channel_id}/send"))
                .json(serde_json::json!({ "message": message })),
        )
        .await
    }
}
