//! Pure reconciliation of broadcast envelopes into a room's ordered view.
//!
//! No I/O and no panics: malformed or out-of-order input returns the state
//! unchanged plus a diagnostic. The uniqueness invariant (one message per id)
//! and the ordering invariant (`(sent_at, id)` ascending) hold after every
//! fold, which is what makes the broadcast echo safe as the single insertion
//! path for sent messages.

use crate::models::{ChatEnvelope, Message, MessageId, RoomId, RoomViewState};

/// Outcome of folding one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    Inserted,
    /// Re-delivered CREATE for an id already present; state unchanged.
    Duplicate,
    Edited,
    Deleted,
    /// EDIT or DELETE referencing an id the room has never seen. Dropped;
    /// the next history refresh self-corrects.
    UnknownId(MessageId),
    /// Envelope addressed to a different room; state unchanged.
    WrongRoom { expected: RoomId, received: RoomId },
}

pub fn apply(state: &mut RoomViewState, envelope: ChatEnvelope) -> Fold {
    if envelope.room_id() != state.room_id {
        return Fold::WrongRoom {
            expected: state.room_id,
            received: envelope.room_id(),
        };
    }

    match envelope {
        ChatEnvelope::Create {
            room_id,
            message_id,
            user_id,
            username,
            content,
            kind,
            timestamp,
        } => {
            if state.contains(message_id) {
                return Fold::Duplicate;
            }
            insert_sorted(
                &mut state.messages,
                Message {
                    id: message_id,
                    room_id,
                    sender_id: user_id,
                    sender_username: username,
                    content,
                    kind,
                    sent_at: timestamp,
                    edited_at: None,
                    deleted: false,
                },
            );
            Fold::Inserted
        }
        ChatEnvelope::Edit {
            message_id,
            content,
            timestamp,
            ..
        } => match state.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.content = content;
                message.edited_at = Some(timestamp);
                Fold::Edited
            }
            None => Fold::UnknownId(message_id),
        },
        ChatEnvelope::Delete { message_id, .. } => {
            match state.messages.iter_mut().find(|m| m.id == message_id) {
                Some(message) => {
                    // Content is kept; the render layer decides between a
                    // tombstone and removal.
                    message.deleted = true;
                    Fold::Deleted
                }
                None => Fold::UnknownId(message_id),
            }
        }
    }
}

/// Fold a history page into the view. Rows already present (e.g. delivered
/// over the broadcast channel between two page fetches) are skipped.
/// Returns the number of rows inserted.
pub fn merge_history(state: &mut RoomViewState, batch: Vec<Message>) -> usize {
    let mut inserted = 0;
    for message in batch {
        if message.room_id != state.room_id || state.contains(message.id) {
            continue;
        }
        insert_sorted(&mut state.messages, message);
        inserted += 1;
    }
    inserted
}

fn insert_sorted(messages: &mut Vec<Message>, message: Message) {
    let at = messages.partition_point(|m| (m.sent_at, m.id) <= (message.sent_at, message.id));
    messages.insert(at, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_762_000_000 + secs, 0).unwrap()
    }

    fn create(room_id: RoomId, message_id: MessageId, content: &str, at: i64) -> ChatEnvelope {
        ChatEnvelope::Create {
            room_id,
            message_id,
            user_id: 42,
            username: "jsmith".to_string(),
            content: content.to_string(),
            kind: MessageKind::Text,
            timestamp: ts(at),
        }
    }

    fn ids(state: &RoomViewState) -> Vec<MessageId> {
        state.messages().iter().map(|m| m.id).collect()
    }

    #[test]
    fn create_is_idempotent() {
        let mut state = RoomViewState::new(7);
        assert_eq!(apply(&mut state, create(7, 101, "hello", 0)), Fold::Inserted);
        assert_eq!(
            apply(&mut state, create(7, 101, "hello", 0)),
            Fold::Duplicate
        );
        assert_eq!(state.len(), 1);
        assert_eq!(state.messages()[0].content, "hello");
    }

    #[test]
    fn creates_are_ordered_by_timestamp_then_id() {
        let mut state = RoomViewState::new(7);
        apply(&mut state, create(7, 3, "third", 30));
        apply(&mut state, create(7, 1, "first", 10));
        // Same timestamp as id 3: tie broken by id.
        apply(&mut state, create(7, 2, "second", 30));
        assert_eq!(ids(&state), vec![1, 2, 3]);
    }

    #[test]
    fn edit_updates_in_place() {
        let mut state = RoomViewState::new(7);
        apply(&mut state, create(7, 1, "first", 10));
        apply(&mut state, create(7, 2, "secnd", 20));
        apply(&mut state, create(7, 3, "third", 30));

        let fold = apply(
            &mut state,
            ChatEnvelope::Edit {
                room_id: 7,
                message_id: 2,
                content: "second".to_string(),
                timestamp: ts(40),
            },
        );
        assert_eq!(fold, Fold::Edited);
        assert_eq!(ids(&state), vec![1, 2, 3]);

        let edited = &state.messages()[1];
        assert_eq!(edited.content, "second");
        assert_eq!(edited.edited_at, Some(ts(40)));
        assert_eq!(edited.sender_id, 42);
        assert_eq!(edited.sent_at, ts(20));
    }

    #[test]
    fn edit_before_create_is_absorbed() {
        let mut state = RoomViewState::new(7);
        let fold = apply(
            &mut state,
            ChatEnvelope::Edit {
                room_id: 7,
                message_id: 55,
                content: "early".to_string(),
                timestamp: ts(0),
            },
        );
        assert_eq!(fold, Fold::UnknownId(55));
        assert!(state.is_empty());

        // A later CREATE for the same id inserts normally.
        assert_eq!(apply(&mut state, create(7, 55, "late", 1)), Fold::Inserted);
        assert_eq!(state.messages()[0].content, "late");
        assert_eq!(state.messages()[0].edited_at, None);
    }

    #[test]
    fn delete_marks_without_removing() {
        let mut state = RoomViewState::new(7);
        apply(&mut state, create(7, 1, "keep me", 10));
        let fold = apply(
            &mut state,
            ChatEnvelope::Delete {
                room_id: 7,
                message_id: 1,
            },
        );
        assert_eq!(fold, Fold::Deleted);
        assert_eq!(state.len(), 1);
        assert!(state.messages()[0].deleted);
        assert_eq!(state.messages()[0].content, "keep me");
    }

    #[test]
    fn unknown_id_delete_is_noop() {
        let mut state = RoomViewState::new(7);
        apply(&mut state, create(7, 1, "only", 10));
        let fold = apply(
            &mut state,
            ChatEnvelope::Delete {
                room_id: 7,
                message_id: 999,
            },
        );
        assert_eq!(fold, Fold::UnknownId(999));
        assert_eq!(state.len(), 1);
        assert!(!state.messages()[0].deleted);
    }

    #[test]
    fn wrong_room_envelope_leaves_state_unchanged() {
        let mut state = RoomViewState::new(7);
        apply(&mut state, create(7, 1, "mine", 10));
        let fold = apply(&mut state, create(8, 2, "not mine", 20));
        assert_eq!(
            fold,
            Fold::WrongRoom {
                expected: 7,
                received: 8
            }
        );
        assert_eq!(ids(&state), vec![1]);
    }

    #[test]
    fn merge_history_skips_rows_already_delivered() {
        let mut state = RoomViewState::new(7);
        apply(&mut state, create(7, 2, "echoed", 20));

        let page = vec![
            Message {
                id: 1,
                room_id: 7,
                sender_id: 42,
                sender_username: "jsmith".to_string(),
                content: "older".to_string(),
                kind: MessageKind::Text,
                sent_at: ts(10),
                edited_at: None,
                deleted: false,
            },
            Message {
                id: 2,
                room_id: 7,
                sender_id: 42,
                sender_username: "jsmith".to_string(),
                content: "echoed".to_string(),
                kind: MessageKind::Text,
                sent_at: ts(20),
                edited_at: None,
                deleted: false,
            },
        ];
        assert_eq!(merge_history(&mut state, page), 1);
        assert_eq!(ids(&state), vec![1, 2]);
    }
}
