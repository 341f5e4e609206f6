pub mod driver;
pub mod sink;

use thiserror::Error;

use crate::server::ServerError;

pub use driver::{Pipeline, PlaybackStats, StreamFormat, play};
pub use sink::{AudioSink, DacSink};

/// How a playback invocation ended, as reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Success,
    Error,
}

impl PlaybackOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// `Success` only when the stream ran to its natural end.
    pub fn of<T>(result: &Result<T, PlaybackError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(_) => Self::Error,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio source unavailable: {0}")]
    Source(#[from] ServerError),

    #[error("stream is not playable WAV: {0}")]
    Format(hound::Error),

    #[error("decode failed after {frames} frames: {source}")]
    Decode { frames: u64, source: hound::Error },

    #[error("audio output failed: {0}")]
    Output(#[from] std::io::Error),

    #[error("playback task aborted: {0}")]
    Aborted(String),
}
