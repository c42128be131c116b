use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Everything that can end a recognition session without a transcript.
///
/// None of these are retried internally. Callers that want a retry policy
/// can use [`RecognizeError::is_connection`] to tell transport failures
/// apart from rejections by the service.
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("failed to build signed URL: {0}")]
    AuthBuild(String),

    #[error("failed to open connection: {0}")]
    Connection(#[from] tungstenite::Error),

    #[error("recognition service returned code {code}: {message}")]
    RemoteApplication {
        code: i64,
        message: String,
        sid: Option<String>,
    },

    #[error("connection lost before final result: {0}")]
    ConnectionLost(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audio transcoding failed: {0}")]
    Transcode(String),

    #[error("audio buffer is empty")]
    EmptyAudio,

    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    #[error("recognition cancelled")]
    Cancelled,

    #[error("no final result within {0:?}")]
    Timeout(Duration),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("blocking recognition called from inside an async runtime")]
    InsideRuntime,
}

impl RecognizeError {
    /// The service answered but rejected the request.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteApplication { .. })
    }

    /// The transport failed, either while opening or mid-session.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ConnectionLost(_))
    }
}

pub type Result<T> = std::result::Result<T, RecognizeError>;
