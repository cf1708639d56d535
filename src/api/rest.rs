//! Reqwest-backed implementation of the chat REST collaborators.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;

use crate::api::chat_api::{ChatApi, SendMessageRequest};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::models::{Message, MessageId, MessagePage, Room, RoomId};

#[derive(Debug, Clone, Serialize)]
struct EditMessageRequest<'a> {
    content: &'a str,
}

#[derive(Clone)]
pub struct RestChatApi {
    client: Client,
    base_url: String,
    token: String,
}

impl RestChatApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &Config, token: impl Into<String>) -> Self {
        Self::new(config.api_base_url.clone(), token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.token))
    }

    async fn check(response: Response) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), %message, "chat api request failed");
        Err(SyncError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChatApi for RestChatApi {
    async fn list_rooms(&self) -> SyncResult<Vec<Room>> {
        let response = self
            .authorized(self.client.get(self.url("/rooms")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_messages(
        &self,
        room_id: RoomId,
        page: u32,
        size: u32,
    ) -> SyncResult<MessagePage> {
        let url = self.url(&format!("/rooms/{room_id}/messages"));
        let response = self
            .authorized(self.client.get(url).query(&[("page", page), ("size", size)]))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn send_message(
        &self,
        room_id: RoomId,
        request: &SendMessageRequest,
    ) -> SyncResult<Message> {
        let url = self.url(&format!("/rooms/{room_id}/messages"));
        let response = self
            .authorized(self.client.post(url).json(request))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn edit_message(&self, message_id: MessageId, content: &str) -> SyncResult<Message> {
        let url = self.url(&format!("/messages/{message_id}"));
        let response = self
            .authorized(self.client.put(url).json(&EditMessageRequest { content }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_message(&self, message_id: MessageId) -> SyncResult<()> {
        let url = self.url(&format!("/messages/{message_id}"));
        let response = self.authorized(self.client.delete(url)).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
