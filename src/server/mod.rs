pub mod client;

use thiserror::Error;

use crate::command::DecodeError;

pub use client::ServerClient;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ServerError {
    /// True when the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// The server's reply to a registration, whatever its status.
#[derive(Debug, Clone)]
pub struct Registration {
    pub status: u16,
    pub body: String,
}
