//! Authoritative send path.
//!
//! Sends go over REST; the local view is populated exclusively by the
//! broadcast echo (which includes the sender), so nothing is appended
//! optimistically here. Reconciler CREATE dedup is what prevents a
//! double-entry, not suppression of the echo. A failed send therefore
//! leaves no phantom entry to roll back.

use std::sync::Arc;

use tokio::sync::watch;

use crate::api::{ChatApi, SendMessageRequest};
use crate::error::{SyncError, SyncResult};
use crate::models::{Message, MessageId, MessageKind, RoomId};
use crate::ws::ConnectionStatus;

pub struct SendCoordinator {
    api: Arc<dyn ChatApi>,
    status: watch::Receiver<ConnectionStatus>,
}

impl SendCoordinator {
    pub fn new(api: Arc<dyn ChatApi>, status: watch::Receiver<ConnectionStatus>) -> Self {
        Self { api, status }
    }

    /// While disconnected, sends fail synchronously with `NotConnected` so
    /// the caller can surface feedback instead of writing into a void: the
    /// echo that would populate the view cannot arrive.
    fn ensure_connected(&self) -> SyncResult<()> {
        if *self.status.borrow() == ConnectionStatus::Connected {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    pub async fn send(
        &self,
        room_id: RoomId,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> SyncResult<Message> {
        self.ensure_connected()?;
        let request = SendMessageRequest {
            content: content.into(),
            kind,
        };
        let message = self.api.send_message(room_id, &request).await?;
        tracing::debug!(
            room_id,
            message_id = message.id,
            "send accepted; awaiting broadcast echo"
        );
        Ok(message)
    }

    pub async fn edit(&self, message_id: MessageId, content: &str) -> SyncResult<Message> {
        self.ensure_connected()?;
        self.api.edit_message(message_id, content).await
    }

    pub async fn delete(&self, message_id: MessageId) -> SyncResult<()> {
        self.ensure_connected()?;
        self.api.delete_message(message_id).await
    }
}
