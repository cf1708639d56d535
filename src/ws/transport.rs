//! The single realtime connection: handshake, heartbeat, reconnection.
//!
//! A [`TransportSession`] is constructed explicitly on login and torn down on
//! logout; components that need it hold a reference rather than importing
//! ambient state. The IO endpoint is abstracted behind [`Transport`] so the
//! integration tests can drive the session over an in-memory link
//! ([`crate::testing::MockTransport`]).

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::config::{Config, RetryConfig};
use crate::error::{SyncError, SyncResult};
use crate::ws::frames::{self, ClientFrame};
use crate::ws::SubscriptionRegistry;

/// Lifecycle of the single realtime connection.
///
/// `Disconnected` is both the initial state and the terminal state after the
/// reconnect budget is spent; only an explicit `connect` leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Transport-level frame, independent of the websocket library in use.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Ping,
    Pong,
    Close,
}

#[async_trait]
pub trait FrameStream: Send {
    async fn next(&mut self) -> Option<SyncResult<Frame>>;
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> SyncResult<()>;
    async fn close(&mut self) -> SyncResult<()>;
}

/// Connection factory boundary. Implementations perform the handshake with
/// the given bearer credential and hand back the framed read/write halves.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(
        &self,
        url: &str,
        credential: &str,
        session_id: Uuid,
    ) -> SyncResult<(Box<dyn FrameStream>, Box<dyn FrameSink>)>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub retry: RetryConfig,
}

impl TransportConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.ws_url.clone(),
            heartbeat_interval: config.heartbeat_interval,
            heartbeat_timeout: config.heartbeat_timeout,
            retry: config.retry,
        }
    }
}

enum DisconnectCause {
    LocalClose,
    RemoteClosed,
    HeartbeatTimeout,
    Read(String),
    Write(String),
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectCause::LocalClose => write!(f, "closed locally"),
            DisconnectCause::RemoteClosed => write!(f, "closed by server"),
            DisconnectCause::HeartbeatTimeout => write!(f, "heartbeat timeout"),
            DisconnectCause::Read(err) => write!(f, "read failed: {err}"),
            DisconnectCause::Write(err) => write!(f, "write failed: {err}"),
        }
    }
}

/// Shared view of the live connection used by the session, its driver task,
/// and the subscription registry: status signal, write half, last failure.
pub(crate) struct ConnectionHandle {
    status_tx: watch::Sender<ConnectionStatus>,
    writer: Mutex<Option<Box<dyn FrameSink>>>,
    last_failure: RwLock<Option<SyncError>>,
}

impl ConnectionHandle {
    fn new() -> Self {
        Self {
            status_tx: watch::Sender::new(ConnectionStatus::Disconnected),
            writer: Mutex::new(None),
            last_failure: RwLock::new(None),
        }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    /// Write a frame to the live connection. Outside `Connected` this reports
    /// `NotConnected` rather than queueing.
    pub(crate) async fn send_frame(&self, frame: Frame) -> SyncResult<()> {
        if self.status() != ConnectionStatus::Connected {
            return Err(SyncError::NotConnected);
        }
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => sink.send(frame).await,
            None => Err(SyncError::NotConnected),
        }
    }

    async fn install_writer(&self, sink: Box<dyn FrameSink>) {
        *self.writer.lock().await = Some(sink);
    }

    async fn drop_writer(&self) -> Option<Box<dyn FrameSink>> {
        self.writer.lock().await.take()
    }

    async fn record_failure(&self, err: SyncError) {
        *self.last_failure.write().await = Some(err);
    }

    async fn clear_failure(&self) {
        *self.last_failure.write().await = None;
    }

    async fn failure(&self) -> Option<SyncError> {
        self.last_failure.read().await.clone()
    }
}

struct Lifecycle {
    driver: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

/// Owns exactly one realtime connection on behalf of the authenticated
/// client session.
pub struct TransportSession {
    transport: Arc<dyn Transport>,
    config: TransportConfig,
    session_id: Uuid,
    handle: Arc<ConnectionHandle>,
    registry: Arc<SubscriptionRegistry>,
    lifecycle: Mutex<Lifecycle>,
}

impl TransportSession {
    pub fn new(transport: Arc<dyn Transport>, config: TransportConfig) -> Arc<Self> {
        let handle = Arc::new(ConnectionHandle::new());
        let registry = Arc::new(SubscriptionRegistry::new(handle.clone()));
        Arc::new(Self {
            transport,
            config,
            session_id: Uuid::new_v4(),
            handle,
            registry,
            lifecycle: Mutex::new(Lifecycle {
                driver: None,
                shutdown: None,
            }),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        self.registry.clone()
    }

    /// Connectivity signal for the UI layer ("connected"/"disconnected"
    /// indicator, send affordances).
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.handle.watch()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.handle.status()
    }

    /// The failure that ended the last connection attempt, if any.
    pub async fn last_failure(&self) -> Option<SyncError> {
        self.handle.failure().await
    }

    /// Establish the connection. A missing credential fails immediately with
    /// `AuthMissing` without a handshake attempt. A failed handshake enters
    /// the bounded retry loop; once the budget is spent the call returns
    /// `ReconnectExhausted` and the session settles in `Disconnected`.
    pub async fn connect(&self, credential: &str) -> SyncResult<()> {
        if credential.trim().is_empty() {
            return Err(SyncError::AuthMissing);
        }

        let mut lifecycle = self.lifecycle.lock().await;
        if self.handle.status() != ConnectionStatus::Disconnected {
            tracing::debug!(status = ?self.handle.status(), "connect ignored; session already live");
            return Ok(());
        }

        self.handle.clear_failure().await;
        self.handle.set_status(ConnectionStatus::Connecting);
        tracing::info!(session_id = %self.session_id, url = %self.config.url, "connecting");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reader = match self
            .transport
            .connect(&self.config.url, credential, self.session_id)
            .await
        {
            Ok((reader, writer)) => {
                self.handle.install_writer(writer).await;
                self.handle.set_status(ConnectionStatus::Connected);
                tracing::info!(session_id = %self.session_id, "connected");
                reader
            }
            Err(err) => {
                tracing::warn!(error = %err, "handshake failed; entering reconnect");
                self.handle.record_failure(err).await;
                self.handle.set_status(ConnectionStatus::Reconnecting);
                let mut rx = shutdown_rx.clone();
                Self::reconnect_loop(
                    &self.transport,
                    &self.config,
                    &self.handle,
                    &self.registry,
                    credential,
                    self.session_id,
                    &mut rx,
                )
                .await?
            }
        };

        let driver = tokio::spawn(Self::drive(
            self.transport.clone(),
            self.config.clone(),
            self.handle.clone(),
            self.registry.clone(),
            credential.to_string(),
            self.session_id,
            reader,
            shutdown_rx,
        ));
        *lifecycle = Lifecycle {
            driver: Some(driver),
            shutdown: Some(shutdown_tx),
        };
        Ok(())
    }

    /// Deterministic teardown: stop the driver, close the socket, drop every
    /// subscription, settle in `Disconnected`. Idempotent.
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(shutdown) = lifecycle.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(driver) = lifecycle.driver.take() {
            let _ = driver.await;
        }
        if let Some(mut writer) = self.handle.drop_writer().await {
            let _ = writer.close().await;
        }
        self.registry.clear_all().await;
        if self.handle.status() != ConnectionStatus::Disconnected {
            self.handle.set_status(ConnectionStatus::Disconnected);
            tracing::info!(session_id = %self.session_id, "disconnected");
        }
    }

    /// Publish an application frame to a destination. Only valid in
    /// `Connected`; in any other state reports `NotConnected` without
    /// queueing.
    pub async fn publish(
        &self,
        destination: impl Into<String>,
        body: serde_json::Value,
    ) -> SyncResult<()> {
        let frame = ClientFrame::Send {
            destination: destination.into(),
            body,
        };
        self.handle.send_frame(Frame::Text(frame.to_json())).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        transport: Arc<dyn Transport>,
        config: TransportConfig,
        handle: Arc<ConnectionHandle>,
        registry: Arc<SubscriptionRegistry>,
        credential: String,
        session_id: Uuid,
        mut reader: Box<dyn FrameStream>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let cause =
                Self::run_connected(&handle, &registry, &config, &mut reader, &mut shutdown_rx)
                    .await;
            if matches!(cause, DisconnectCause::LocalClose) {
                return;
            }

            tracing::warn!(session_id = %session_id, cause = %cause, "transport dropped");
            let _ = handle.drop_writer().await;
            handle
                .record_failure(SyncError::TransportDropped(cause.to_string()))
                .await;
            handle.set_status(ConnectionStatus::Reconnecting);

            match Self::reconnect_loop(
                &transport,
                &config,
                &handle,
                &registry,
                &credential,
                session_id,
                &mut shutdown_rx,
            )
            .await
            {
                Ok(new_reader) => reader = new_reader,
                Err(_) => return,
            }
        }
    }

    /// Pump frames off the live connection and keep the heartbeat. Returns
    /// the cause once the connection is no longer usable.
    async fn run_connected(
        handle: &ConnectionHandle,
        registry: &SubscriptionRegistry,
        config: &TransportConfig,
        reader: &mut Box<dyn FrameStream>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> DisconnectCause {
        let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                frame = reader.next() => match frame {
                    None => return DisconnectCause::RemoteClosed,
                    Some(Err(err)) => return DisconnectCause::Read(err.to_string()),
                    Some(Ok(Frame::Close)) => return DisconnectCause::RemoteClosed,
                    Some(Ok(Frame::Ping)) | Some(Ok(Frame::Pong)) => {
                        last_inbound = Instant::now();
                    }
                    Some(Ok(Frame::Text(text))) => {
                        last_inbound = Instant::now();
                        match frames::parse_envelope(&text) {
                            Ok(envelope) => registry.dispatch(envelope).await,
                            Err(err) => tracing::warn!(error = %err, "dropping inbound frame"),
                        }
                    }
                },
                _ = heartbeat.tick() => {
                    if last_inbound.elapsed() > config.heartbeat_timeout {
                        return DisconnectCause::HeartbeatTimeout;
                    }
                    if let Err(err) = handle.send_frame(Frame::Ping).await {
                        return DisconnectCause::Write(err.to_string());
                    }
                }
                _ = shutdown_rx.changed() => return DisconnectCause::LocalClose,
            }
        }
    }

    /// Fixed-delay, bounded reconnect loop. On success the registry replays
    /// its subscriptions before the new reader is handed back; on exhaustion
    /// every subscription is dropped and the session settles in
    /// `Disconnected`.
    async fn reconnect_loop(
        transport: &Arc<dyn Transport>,
        config: &TransportConfig,
        handle: &ConnectionHandle,
        registry: &SubscriptionRegistry,
        credential: &str,
        session_id: Uuid,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SyncResult<Box<dyn FrameStream>> {
        let mut attempts: u32 = 0;
        loop {
            if attempts >= config.retry.max_retries {
                tracing::error!(
                    session_id = %session_id,
                    attempts,
                    "reconnect budget exhausted; dropping subscriptions"
                );
                registry.clear_all().await;
                let err = SyncError::ReconnectExhausted { attempts };
                handle.record_failure(err.clone()).await;
                handle.set_status(ConnectionStatus::Disconnected);
                return Err(err);
            }
            attempts += 1;

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    handle.set_status(ConnectionStatus::Disconnected);
                    return Err(SyncError::TransportDropped("session closed during reconnect".into()));
                }
                _ = tokio::time::sleep(config.retry.retry_delay) => {}
            }

            match transport.connect(&config.url, credential, session_id).await {
                Ok((reader, writer)) => {
                    handle.install_writer(writer).await;
                    handle.clear_failure().await;
                    handle.set_status(ConnectionStatus::Connected);
                    registry.replay().await;
                    tracing::info!(session_id = %session_id, attempt = attempts, "reconnected");
                    return Ok(reader);
                }
                Err(err) => {
                    tracing::warn!(attempt = attempts, error = %err, "reconnect attempt failed");
                }
            }
        }
    }
}

type WsRead = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type WsWrite = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    WsMessage,
>;

struct WsFrameStream {
    inner: WsRead,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next(&mut self) -> Option<SyncResult<Frame>> {
        loop {
            match self.inner.next().await {
                None => return None,
                Some(Err(err)) => {
                    return Some(Err(SyncError::TransportDropped(err.to_string())))
                }
                Some(Ok(message)) => match message {
                    WsMessage::Text(text) => {
                        return Some(Ok(Frame::Text(text.as_str().to_string())))
                    }
                    WsMessage::Ping(_) => return Some(Ok(Frame::Ping)),
                    WsMessage::Pong(_) => return Some(Ok(Frame::Pong)),
                    WsMessage::Close(_) => return Some(Ok(Frame::Close)),
                    // The broker speaks JSON text; anything else is noise.
                    WsMessage::Binary(_) | WsMessage::Frame(_) => continue,
                },
            }
        }
    }
}

struct WsFrameSink {
    inner: WsWrite,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&mut self, frame: Frame) -> SyncResult<()> {
        let message = match frame {
            Frame::Text(text) => WsMessage::text(text),
            Frame::Ping => WsMessage::Ping(Vec::new().into()),
            Frame::Pong => WsMessage::Pong(Vec::new().into()),
            Frame::Close => WsMessage::Close(None),
        };
        self.inner
            .send(message)
            .await
            .map_err(|err| SyncError::TransportDropped(err.to_string()))
    }

    async fn close(&mut self) -> SyncResult<()> {
        self.inner
            .close()
            .await
            .map_err(|err| SyncError::TransportDropped(err.to_string()))
    }
}

/// Production transport over tokio-tungstenite. The bearer credential rides
/// on the upgrade request; a rejected upgrade is a failed handshake.
#[derive(Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        url: &str,
        credential: &str,
        session_id: Uuid,
    ) -> SyncResult<(Box<dyn FrameStream>, Box<dyn FrameSink>)> {
        let mut request = url
            .into_client_request()
            .map_err(|err| SyncError::HandshakeFailed(err.to_string()))?;
        let bearer = format!("Bearer {credential}")
            .parse()
            .map_err(|_| SyncError::HandshakeFailed("credential is not a valid header".into()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        let client_id = session_id
            .to_string()
            .parse()
            .map_err(|_| SyncError::HandshakeFailed("session id is not a valid header".into()))?;
        request.headers_mut().insert("x-client-id", client_id);

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|err| SyncError::HandshakeFailed(err.to_string()))?;
        let (write, read) = stream.split();
        Ok((
            Box::new(WsFrameStream { inner: read }),
            Box::new(WsFrameSink { inner: write }),
        ))
    }
}
