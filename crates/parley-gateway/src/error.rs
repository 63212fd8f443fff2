use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("token is not a valid header value")]
    InvalidToken,

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}
