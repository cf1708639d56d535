use serde::{Deserialize, Serialize};

use crate::models::message::Message;

pub type RoomId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomKind {
    Direct,
    Group,
    Project,
}

/// A conversation scope. Fetched read-only from the room-listing collaborator;
/// this core never mutates rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub kind: RoomKind,
    pub member_count: u32,
}

/// One page of the paginated history endpoint
/// (`GET /rooms/{roomId}/messages?page&size`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub content: Vec<Message>,
    pub page: u32,
    pub size: u32,
    /// Whether this is the final page.
    pub last: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_parses_wire_shape() {
        let json = r#"{"id":3,"name":"payroll-migration","kind":"PROJECT","memberCount":9}"#;
        let room: Room = serde_json::from_str(json).unwrap();
        assert_eq!(room.id, 3);
        assert_eq!(room.kind, RoomKind::Project);
        assert_eq!(room.member_count, 9);
    }

    #[test]
    fn message_page_parses_content_array() {
        let json = r#"{
            "content": [{
                "id": 10,
                "roomId": 3,
                "senderId": 42,
                "senderUsername": "jsmith",
                "content": "standup in 5",
                "kind": "TEXT",
                "sentAt": "2025-11-03T09:00:00Z"
            }],
            "page": 0,
            "size": 50,
            "last": true
        }"#;
        let page: MessagePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.content.len(), 1);
        assert!(page.last);
        assert_eq!(page.content[0].id, 10);
        assert!(!page.content[0].deleted);
    }
}
