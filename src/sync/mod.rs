pub mod reconciler;
pub mod room_session;
pub mod sender;

pub use reconciler::Fold;
pub use room_session::RoomSessionController;
pub use sender::SendCoordinator;
