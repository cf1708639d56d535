use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error, Clone)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing credential: connect requires a session token")]
    AuthMissing,

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("transport dropped: {0}")]
    TransportDropped(String),

    #[error("reconnect budget exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("not connected")]
    NotConnected,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("api error: status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("http error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Http(e.to_string())
    }
}

impl SyncError {
    /// Whether the error reflects lost connectivity rather than a rejected
    /// operation. Drives the "disconnected" indicator and send affordances.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SyncError::HandshakeFailed(_)
                | SyncError::TransportDropped(_)
                | SyncError::ReconnectExhausted { .. }
                | SyncError::NotConnected
        )
    }
}
