//! Client-side realtime chat synchronization core.
//!
//! Owns one multiplexed websocket connection to the chat broker, multiplexes
//! per-room subscriptions over it, and reconciles create/edit/delete
//! envelopes into per-room ordered, duplicate-free message views. Sends go
//! over REST; the broadcast echo is the only path that inserts into the
//! local view.
//!
//! Construction happens on login, teardown on logout:
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_sync_client::api::RestChatApi;
//! use chat_sync_client::config::Config;
//! use chat_sync_client::sync::{RoomSessionController, SendCoordinator};
//! use chat_sync_client::ws::{TransportConfig, TransportSession, WsTransport};
//!
//! # async fn login(token: String) -> chat_sync_client::error::SyncResult<()> {
//! let config = Config::from_env()?;
//! let session = TransportSession::new(
//!     Arc::new(WsTransport::new()),
//!     TransportConfig::from_config(&config),
//! );
//! session.connect(&token).await?;
//!
//! let api = Arc::new(RestChatApi::from_config(&config, token));
//! let rooms = RoomSessionController::new(api.clone(), session.registry(), config.history_page_size);
//! let sender = SendCoordinator::new(api, session.status());
//!
//! let view = rooms.activate(7).await?;
//! # let _ = (view, sender);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod sync;
pub mod testing;
pub mod ws;
