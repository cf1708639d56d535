pub mod message;
pub mod room;

pub use message::{ChatEnvelope, Message, MessageId, MessageKind, RoomViewState, UserId};
pub use room::{MessagePage, Room, RoomId, RoomKind};
