use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};

pub mod frames;
pub mod transport;

pub use transport::{
    ConnectionStatus, Frame, FrameSink, FrameStream, Transport, TransportConfig, TransportSession,
    WsTransport,
};

use crate::error::{SyncError, SyncResult};
use crate::models::{ChatEnvelope, RoomId};
use frames::ClientFrame;
use transport::ConnectionHandle;

/// One room's binding to the shared connection: destination address plus the
/// delivery channel the room controller consumes.
struct RoomSubscription {
    destination: String,
    sender: UnboundedSender<ChatEnvelope>,
}

/// Multiplexes per-room subscriptions over the single transport session and
/// guarantees exactly one live delivery path per room.
///
/// All mutation goes through the inner `RwLock`, so a reconnect replay and a
/// user-triggered room switch cannot interleave on the same room's entry.
pub struct SubscriptionRegistry {
    handle: Arc<ConnectionHandle>,
    rooms: RwLock<HashMap<RoomId, RoomSubscription>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new(handle: Arc<ConnectionHandle>) -> Self {
        Self {
            handle,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a room's broadcast topic. Replace semantics: an existing
    /// subscription for the room is torn down first, so two handlers never
    /// fire for the same room. Fails with `NotConnected` rather than
    /// buffering the intent.
    pub async fn subscribe(
        &self,
        room_id: RoomId,
    ) -> SyncResult<UnboundedReceiver<ChatEnvelope>> {
        if self.handle.status() != ConnectionStatus::Connected {
            return Err(SyncError::NotConnected);
        }

        let mut rooms = self.rooms.write().await;
        if let Some(previous) = rooms.remove(&room_id) {
            tracing::debug!(room_id, "replacing existing subscription");
            let _ = self
                .handle
                .send_frame(Frame::Text(
                    ClientFrame::Unsubscribe {
                        destination: previous.destination,
                    }
                    .to_json(),
                ))
                .await;
        }

        let destination = frames::room_destination(room_id);
        self.handle
            .send_frame(Frame::Text(
                ClientFrame::Subscribe {
                    destination: destination.clone(),
                }
                .to_json(),
            ))
            .await?;

        let (tx, rx) = unbounded_channel();
        rooms.insert(
            room_id,
            RoomSubscription {
                destination,
                sender: tx,
            },
        );
        tracing::debug!(room_id, total = rooms.len(), "subscribed");
        Ok(rx)
    }

    /// Idempotent; no-op when nothing is registered for the room.
    pub async fn unsubscribe(&self, room_id: RoomId) {
        let mut rooms = self.rooms.write().await;
        if let Some(subscription) = rooms.remove(&room_id) {
            if self.handle.status() == ConnectionStatus::Connected {
                let _ = self
                    .handle
                    .send_frame(Frame::Text(
                        ClientFrame::Unsubscribe {
                            destination: subscription.destination,
                        }
                        .to_json(),
                    ))
                    .await;
            }
            tracing::debug!(room_id, remaining = rooms.len(), "unsubscribed");
        }
    }

    pub async fn is_subscribed(&self, room_id: RoomId) -> bool {
        self.rooms.read().await.contains_key(&room_id)
    }

    pub async fn subscribed_rooms(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Route an inbound envelope to its room's delivery channel. Envelopes
    /// for rooms without a subscription are dropped; dead senders are pruned.
    pub(crate) async fn dispatch(&self, envelope: ChatEnvelope) {
        let room_id = envelope.room_id();
        let mut rooms = self.rooms.write().await;
        let dead = match rooms.get(&room_id) {
            Some(subscription) => subscription.sender.send(envelope).is_err(),
            None => {
                tracing::debug!(room_id, "dropping envelope for room without subscription");
                return;
            }
        };
        if dead {
            rooms.remove(&room_id);
            tracing::debug!(room_id, "removed dead subscriber");
        }
    }

    /// Re-issue the subscribe frame for every registered room after a
    /// reconnect, keeping the existing delivery channels. Replay order is
    /// ascending room id so recovery is deterministic.
    pub(crate) async fn replay(&self) {
        let rooms = self.rooms.read().await;
        let mut ids: Vec<RoomId> = rooms.keys().copied().collect();
        ids.sort_unstable();
        for room_id in ids {
            if let Some(subscription) = rooms.get(&room_id) {
                let frame = ClientFrame::Subscribe {
                    destination: subscription.destination.clone(),
                };
                if let Err(err) = self.handle.send_frame(Frame::Text(frame.to_json())).await {
                    // Connection dropped again mid-replay; the driver retries.
                    tracing::warn!(room_id, error = %err, "subscription replay interrupted");
                    return;
                }
            }
        }
        if !rooms.is_empty() {
            tracing::info!(count = rooms.len(), "subscriptions replayed");
        }
    }

    /// Drop every subscription. Delivery channels close, so room controllers
    /// observe end-of-stream.
    pub(crate) async fn clear_all(&self) {
        let mut rooms = self.rooms.write().await;
        if !rooms.is_empty() {
            tracing::debug!(count = rooms.len(), "dropping all subscriptions");
            rooms.clear();
        }
    }
}
