//! Per-active-room orchestration: history seed, live subscription, teardown.

use std::sync::Arc;

use tokio::sync::{mpsc::UnboundedReceiver, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::api::ChatApi;
use crate::error::SyncResult;
use crate::models::{ChatEnvelope, RoomId, RoomViewState};
use crate::sync::reconciler::{self, Fold};
use crate::ws::SubscriptionRegistry;

struct ActiveRoom {
    room_id: RoomId,
    view: Arc<RwLock<RoomViewState>>,
    pump: JoinHandle<()>,
}

/// Owns the transition between "no active room" and "room N active".
///
/// Activation: tear down the previous room, seed the view from history page
/// zero, subscribe, and start the envelope pump. Deactivation: unsubscribe,
/// wait for the pump to drain, discard the view. Both run under one mutex so
/// a rapid double-switch can never leave two live subscriptions, and a stale
/// room's envelope can never reach the new room's view: each activation gets
/// its own delivery channel and its own view state.
pub struct RoomSessionController {
    api: Arc<dyn ChatApi>,
    registry: Arc<SubscriptionRegistry>,
    page_size: u32,
    active: Mutex<Option<ActiveRoom>>,
}

impl RoomSessionController {
    pub fn new(api: Arc<dyn ChatApi>, registry: Arc<SubscriptionRegistry>, page_size: u32) -> Self {
        Self {
            api,
            registry,
            page_size,
            active: Mutex::new(None),
        }
    }

    /// Activate a room, returning the shared view handle the UI observes.
    pub async fn activate(&self, room_id: RoomId) -> SyncResult<Arc<RwLock<RoomViewState>>> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            Self::shut_down(previous, &self.registry).await;
        }

        let page = self.api.fetch_messages(room_id, 0, self.page_size).await?;
        let mut state = RoomViewState::new(room_id);
        reconciler::merge_history(&mut state, page.content);
        state.next_page = if page.last { None } else { Some(1) };

        let receiver = self.registry.subscribe(room_id).await?;
        let view = Arc::new(RwLock::new(state));
        let pump = tokio::spawn(Self::pump(receiver, view.clone(), room_id));

        *active = Some(ActiveRoom {
            room_id,
            view: view.clone(),
            pump,
        });
        tracing::info!(room_id, "room activated");
        Ok(view)
    }

    /// Deactivate the current room, if any. Idempotent; also the unmount
    /// path.
    pub async fn deactivate(&self) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            let room_id = previous.room_id;
            Self::shut_down(previous, &self.registry).await;
            tracing::info!(room_id, "room deactivated");
        }
    }

    /// Fetch the next history page into the active room's view. Returns
    /// `Ok(false)` when there is no active room or no page left.
    pub async fn load_older(&self) -> SyncResult<bool> {
        let mut active = self.active.lock().await;
        let Some(room) = active.as_mut() else {
            return Ok(false);
        };
        let Some(page_number) = room.view.read().await.next_page else {
            return Ok(false);
        };

        let page = self
            .api
            .fetch_messages(room.room_id, page_number, self.page_size)
            .await?;
        let mut state = room.view.write().await;
        let inserted = reconciler::merge_history(&mut state, page.content);
        state.next_page = if page.last { None } else { Some(page_number + 1) };
        tracing::debug!(
            room_id = room.room_id,
            page = page_number,
            inserted,
            "history page folded"
        );
        Ok(true)
    }

    pub async fn active_room(&self) -> Option<RoomId> {
        self.active.lock().await.as_ref().map(|room| room.room_id)
    }

    pub async fn view(&self) -> Option<Arc<RwLock<RoomViewState>>> {
        self.active.lock().await.as_ref().map(|room| room.view.clone())
    }

    async fn shut_down(previous: ActiveRoom, registry: &SubscriptionRegistry) {
        // Unsubscribing drops the delivery sender; the pump drains whatever
        // was already queued for the old room and then terminates.
        registry.unsubscribe(previous.room_id).await;
        let _ = previous.pump.await;
    }

    async fn pump(
        mut receiver: UnboundedReceiver<ChatEnvelope>,
        view: Arc<RwLock<RoomViewState>>,
        room_id: RoomId,
    ) {
        while let Some(envelope) = receiver.recv().await {
            let fold = {
                let mut state = view.write().await;
                reconciler::apply(&mut state, envelope)
            };
            match fold {
                Fold::UnknownId(message_id) => {
                    tracing::warn!(room_id, message_id, "edit/delete for unknown message dropped")
                }
                Fold::WrongRoom { expected, received } => {
                    tracing::warn!(expected, received, "misrouted envelope ignored")
                }
                Fold::Duplicate => tracing::debug!(room_id, "duplicate create ignored"),
                Fold::Inserted | Fold::Edited | Fold::Deleted => {}
            }
        }
        tracing::debug!(room_id, "envelope pump stopped");
    }
}
