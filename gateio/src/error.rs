use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("missing configuration: {0}")]
    Config(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("pong timeout")]
    PongTimeout,

    #[error("stale connection: {0}ms since last message")]
    StaleConnection(u64),

    #[error("batch of {0} exceeds the venue limit of 20")]
    BatchTooLarge(usize),

    #[error("authentication required for {0}")]
    AuthRequired(&'static str),
}

pub type Result<T> = std::result::Result<T, GateError>;
