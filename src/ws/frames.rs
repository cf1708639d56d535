//! Control frames sent by the client over the realtime channel.
//!
//! Inbound traffic on the room topics is the [`ChatEnvelope`] union in
//! `models::message`; everything the client writes is one of the tagged
//! actions below.

use serde::Serialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::models::{ChatEnvelope, RoomId};

/// Outbound send destination for the realtime path. The REST send endpoint is
/// the authoritative path; publishing here as well would double-deliver.
pub const SEND_DESTINATION: &str = "app/chat.send";

/// Broadcast channel for one room.
pub fn room_destination(room_id: RoomId) -> String {
    format!("topic/room.{room_id}")
}

/// Per-user private channel. Same subscription mechanics as the room topics;
/// notification delivery itself is handled outside this core.
pub fn notifications_destination(username: &str) -> String {
    format!("user/{username}/queue/notifications")
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action")]
pub enum ClientFrame {
    #[serde(rename = "SUBSCRIBE")]
    Subscribe { destination: String },
    #[serde(rename = "UNSUBSCRIBE")]
    Unsubscribe { destination: String },
    #[serde(rename = "SEND")]
    Send { destination: String, body: Value },
}

impl ClientFrame {
    pub fn to_json(&self) -> String {
        // ClientFrame serialization cannot fail: no non-string keys, no
        // fallible Serialize impls.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Decode an inbound textual frame into a chat envelope. Malformed frames
/// are a diagnostic, never a reason to drop the connection.
pub fn parse_envelope(text: &str) -> SyncResult<ChatEnvelope> {
    serde_json::from_str(text).map_err(|e| SyncError::MalformedEnvelope(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_envelope_reports_malformed_frames() {
        let err = parse_envelope("{\"type\":\"CHAT_MESSAGE\"").unwrap_err();
        assert!(matches!(err, SyncError::MalformedEnvelope(_)));

        let ok = parse_envelope(
            r#"{"type":"MESSAGE_DELETED","roomId":7,"messageId":55}"#,
        )
        .unwrap();
        assert_eq!(ok.message_id(), 55);
    }

    #[test]
    fn destinations_follow_channel_patterns() {
        assert_eq!(room_destination(7), "topic/room.7");
        assert_eq!(
            notifications_destination("jsmith"),
            "user/jsmith/queue/notifications"
        );
    }

    #[test]
    fn subscribe_frame_shape() {
        let frame = ClientFrame::Subscribe {
            destination: room_destination(7),
        };
        assert_eq!(
            frame.to_json(),
            r#"{"action":"SUBSCRIBE","destination":"topic/room.7"}"#
        );
    }

    #[test]
    fn send_frame_carries_body() {
        let frame = ClientFrame::Send {
            destination: SEND_DESTINATION.to_string(),
            body: json!({"roomId": 7, "content": "hello"}),
        };
        let json = frame.to_json();
        assert!(json.contains(r#""action":"SEND""#));
        assert!(json.contains(r#""destination":"app/chat.send""#));
        assert!(json.contains(r#""content":"hello""#));
    }
}
