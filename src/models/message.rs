use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::room::RoomId;

pub type MessageId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    Image,
}

/// A chat message as held in a room's view. Server-assigned id, unique per
/// room; ordered by `(sent_at, id)`. Deletion is a flag so the render layer
/// can choose between a tombstone and removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_username: String,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
}

/// Wire-level envelope fanned out on `topic/room.{roomId}`. The `type` field
/// is the discriminant; payload fields are scoped per variant so reconciler
/// branches are exhaustive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEnvelope {
    #[serde(rename = "CHAT_MESSAGE", rename_all = "camelCase")]
    Create {
        room_id: RoomId,
        message_id: MessageId,
        user_id: UserId,
        username: String,
        content: String,
        #[serde(default)]
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "MESSAGE_EDITED", rename_all = "camelCase")]
    Edit {
        room_id: RoomId,
        message_id: MessageId,
        content: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "MESSAGE_DELETED", rename_all = "camelCase")]
    Delete {
        room_id: RoomId,
        message_id: MessageId,
    },
}

impl ChatEnvelope {
    pub fn room_id(&self) -> RoomId {
        match self {
            ChatEnvelope::Create { room_id, .. }
            | ChatEnvelope::Edit { room_id, .. }
            | ChatEnvelope::Delete { room_id, .. } => *room_id,
        }
    }

    pub fn message_id(&self) -> MessageId {
        match self {
            ChatEnvelope::Create { message_id, .. }
            | ChatEnvelope::Edit { message_id, .. }
            | ChatEnvelope::Delete { message_id, .. } => *message_id,
        }
    }
}

/// Per-room in-memory projection: the ordered message sequence plus the
/// cursor for paginated history. Created on room activation, discarded on
/// deactivation; history is re-fetched on the next activation.
#[derive(Debug)]
pub struct RoomViewState {
    pub room_id: RoomId,
    pub(crate) messages: Vec<Message>,
    /// Next history page to fetch, `None` once the server reports the last page.
    pub next_page: Option<u32>,
}

impl RoomViewState {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            messages: Vec::new(),
            next_page: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}
