//! Test support: an in-memory transport that pairs each accepted connection
//! with a server-side endpoint the test drives directly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::models::ChatEnvelope;
use crate::ws::{Frame, FrameSink, FrameStream, Transport};

struct MockState {
    attempts: AtomicU32,
    fail_next: AtomicU32,
    listener_tx: UnboundedSender<MockServerEnd>,
}

/// Channel-backed [`Transport`]. Every successful `connect` hands a
/// [`MockServerEnd`] to the paired [`MockListener`].
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> (Self, MockListener) {
        let (listener_tx, incoming) = unbounded_channel();
        (
            Self {
                state: Arc::new(MockState {
                    attempts: AtomicU32::new(0),
                    fail_next: AtomicU32::new(0),
                    listener_tx,
                }),
            },
            MockListener { incoming },
        )
    }

    /// Make the next `count` connection attempts fail their handshake.
    pub fn fail_handshakes(&self, count: u32) {
        self.state.fail_next.store(count, Ordering::SeqCst);
    }

    /// Total connection attempts observed, successful or not.
    pub fn attempts(&self) -> u32 {
        self.state.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        _url: &str,
        _credential: &str,
        _session_id: Uuid,
    ) -> SyncResult<(Box<dyn FrameStream>, Box<dyn FrameSink>)> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .state
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                if remaining > 0 {
                    Some(remaining - 1)
                } else {
                    None
                }
            })
            .is_ok();
        if refused {
            return Err(SyncError::HandshakeFailed("mock handshake refused".into()));
        }

        let (to_client_tx, to_client_rx) = unbounded_channel();
        let (to_server_tx, to_server_rx) = unbounded_channel();
        let _ = self.state.listener_tx.send(MockServerEnd {
            outbound: to_server_rx,
            to_client: to_client_tx,
        });
        Ok((
            Box::new(ChannelFrameStream { rx: to_client_rx }),
            Box::new(ChannelFrameSink { tx: to_server_tx }),
        ))
    }
}

/// Server side of the mock link: accepts connections as the session (re)dials.
pub struct MockListener {
    incoming: UnboundedReceiver<MockServerEnd>,
}

impl MockListener {
    pub async fn accept(&mut self) -> MockServerEnd {
        self.incoming.recv().await.expect("mock transport dropped")
    }
}

/// One accepted connection as seen by the "broker".
pub struct MockServerEnd {
    outbound: UnboundedReceiver<Frame>,
    to_client: UnboundedSender<Frame>,
}

impl MockServerEnd {
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next textual frame written by the client, skipping heartbeat frames.
    pub async fn recv_text(&mut self) -> Option<String> {
        while let Some(frame) = self.outbound.recv().await {
            match frame {
                Frame::Text(text) => return Some(text),
                Frame::Ping | Frame::Pong => continue,
                Frame::Close => return None,
            }
        }
        None
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Frame::Text(text.into()));
    }

    pub fn send_envelope(&self, envelope: &ChatEnvelope) {
        self.send_text(serde_json::to_string(envelope).expect("serialize envelope"));
    }

    pub fn send_pong(&self) {
        let _ = self.to_client.send(Frame::Pong);
    }

    /// Sever the link; the client observes end-of-stream and enters its
    /// reconnect path.
    pub fn drop_link(self) {}
}

struct ChannelFrameStream {
    rx: UnboundedReceiver<Frame>,
}

#[async_trait]
impl FrameStream for ChannelFrameStream {
    async fn next(&mut self) -> Option<SyncResult<Frame>> {
        self.rx.recv().await.map(Ok)
    }
}

struct ChannelFrameSink {
    tx: UnboundedSender<Frame>,
}

#[async_trait]
impl FrameSink for ChannelFrameSink {
    async fn send(&mut self, frame: Frame) -> SyncResult<()> {
        self.tx
            .send(frame)
            .map_err(|_| SyncError::TransportDropped("mock peer closed".into()))
    }

    async fn close(&mut self) -> SyncResult<()> {
        Ok(())
    }
}
