use thiserror::Error;

use crate::session::composer::ComposeError;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("not permitted: {0}")]
    NotPermitted(&'static str),

    #[error("connection closed")]
    Closed,
}

impl ChatError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ChatError::Forbidden(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
