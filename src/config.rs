use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Reconnection policy: fixed delay between attempts, bounded attempt count.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub retry_delay: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Realtime endpoint, e.g. "ws://chat.internal:3000/ws".
    pub ws_url: String,
    /// REST base for the room/message collaborators, e.g. "http://chat.internal:3000/api".
    pub api_base_url: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub retry: RetryConfig,
    /// Page size for paginated history fetches.
    pub history_page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::SyncError> {
        dotenv().ok();
        let ws_url = env::var("CHAT_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:3000/ws".into());
        let api_base_url =
            env::var("CHAT_API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000/api".into());

        let heartbeat_interval_secs = env::var("CHAT_HEARTBEAT_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5u64);
        let heartbeat_timeout_secs = env::var("CHAT_HEARTBEAT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30u64);
        if heartbeat_timeout_secs <= heartbeat_interval_secs {
            return Err(crate::error::SyncError::Config(format!(
                "CHAT_HEARTBEAT_TIMEOUT_SECS ({heartbeat_timeout_secs}) must exceed \
                 CHAT_HEARTBEAT_INTERVAL_SECS ({heartbeat_interval_secs})"
            )));
        }

        let retry_delay_ms = env::var("CHAT_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000u64);
        let max_retries = env::var("CHAT_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5u32);

        let history_page_size = env::var("CHAT_HISTORY_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50u32);

        Ok(Self {
            ws_url,
            api_base_url,
            heartbeat_interval: Duration::from_secs(heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(heartbeat_timeout_secs),
            retry: RetryConfig {
                retry_delay: Duration::from_millis(retry_delay_ms),
                max_retries,
            },
            history_page_size,
        })
    }
}
