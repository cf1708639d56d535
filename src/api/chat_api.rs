use async_trait::async_trait;
use serde::Serialize;

use crate::error::SyncResult;
use crate::models::{Message, MessageId, MessageKind, MessagePage, Room, RoomId};

/// Body for `POST /rooms/{roomId}/messages`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    pub kind: MessageKind,
}

/// REST collaborators consumed by the sync core. The production
/// implementation is [`crate::api::RestChatApi`]; tests substitute an
/// in-memory stub behind this trait.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_rooms(&self) -> SyncResult<Vec<Room>>;

    async fn fetch_messages(&self, room_id: RoomId, page: u32, size: u32)
        -> SyncResult<MessagePage>;

    /// Authoritative send. The returned row is the persisted message; the
    /// local view is populated by the broadcast echo, not by this response.
    async fn send_message(&self, room_id: RoomId, request: &SendMessageRequest)
        -> SyncResult<Message>;

    async fn edit_message(&self, message_id: MessageId, content: &str) -> SyncResult<Message>;

    async fn delete_message(&self, message_id: MessageId) -> SyncResult<()>;
}
