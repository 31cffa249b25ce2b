use meridian_core::BarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid kline: {0}")]
    InvalidKline(#[from] BarError),

    #[error("Kline open time out of range: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Connection manager is shut down")]
    Shutdown,
}

pub type LiveResult<T> = std::result::Result<T, LiveError>;
