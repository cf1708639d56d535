#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;

use chat_sync_client::api::{ChatApi, SendMessageRequest};
use chat_sync_client::config::RetryConfig;
use chat_sync_client::error::{SyncError, SyncResult};
use chat_sync_client::models::{
    ChatEnvelope, Message, MessageId, MessageKind, MessagePage, Room, RoomId,
};
use chat_sync_client::ws::{ConnectionStatus, TransportConfig, TransportSession};

pub fn test_config() -> TransportConfig {
    TransportConfig {
        url: "ws://mock.internal/ws".to_string(),
        heartbeat_interval: Duration::from_secs(30),
        heartbeat_timeout: Duration::from_secs(60),
        retry: RetryConfig {
            retry_delay: Duration::from_millis(10),
            max_retries: 2,
        },
    }
}

pub async fn wait_for_status(session: &TransportSession, want: ConnectionStatus) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if session.current_status() == want {
            return;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for status {want:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_762_000_000 + secs, 0).unwrap()
}

pub fn create_envelope(
    room_id: RoomId,
    message_id: MessageId,
    content: &str,
    secs: i64,
) -> ChatEnvelope {
    ChatEnvelope::Create {
        room_id,
        message_id,
        user_id: 42,
        username: "jsmith".to_string(),
        content: content.to_string(),
        kind: MessageKind::Text,
        timestamp: ts(secs),
    }
}

pub fn message(room_id: RoomId, id: MessageId, content: &str, secs: i64) -> Message {
    Message {
        id,
        room_id,
        sender_id: 42,
        sender_username: "jsmith".to_string(),
        content: content.to_string(),
        kind: MessageKind::Text,
        sent_at: ts(secs),
        edited_at: None,
        deleted: false,
    }
}

/// In-memory REST collaborator: scripted history pages and send results.
pub struct StubApi {
    pages: Mutex<HashMap<(RoomId, u32), MessagePage>>,
    send_results: Mutex<Vec<SyncResult<Message>>>,
    pub sent: Mutex<Vec<(RoomId, String)>>,
}

impl StubApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(HashMap::new()),
            send_results: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub async fn put_page(&self, room_id: RoomId, page: u32, content: Vec<Message>, last: bool) {
        let size = content.len() as u32;
        self.pages.lock().await.insert(
            (room_id, page),
            MessagePage {
                content,
                page,
                size,
                last,
            },
        );
    }

    pub async fn queue_send(&self, result: SyncResult<Message>) {
        self.send_results.lock().await.push(result);
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl ChatApi for StubApi {
    async fn list_rooms(&self) -> SyncResult<Vec<Room>> {
        Ok(Vec::new())
    }

    async fn fetch_messages(
        &self,
        room_id: RoomId,
        page: u32,
        size: u32,
    ) -> SyncResult<MessagePage> {
        Ok(self
            .pages
            .lock()
            .await
            .get(&(room_id, page))
            .cloned()
            .unwrap_or(MessagePage {
                content: Vec::new(),
                page,
                size,
                last: true,
            }))
    }

    async fn send_message(
        &self,
        room_id: RoomId,
        request: &SendMessageRequest,
    ) -> SyncResult<Message> {
        self.sent
            .lock()
            .await
            .push((room_id, request.content.clone()));
        let mut results = self.send_results.lock().await;
        if results.is_empty() {
            return Err(SyncError::Api {
                status: 500,
                message: "no scripted send result".to_string(),
            });
        }
        results.remove(0)
    }

    async fn edit_message(&self, _message_id: MessageId, _content: &str) -> SyncResult<Message> {
        Err(SyncError::Api {
            status: 501,
            message: "edit not scripted".to_string(),
        })
    }

    async fn delete_message(&self, _message_id: MessageId) -> SyncResult<()> {
        Ok(())
    }
}
