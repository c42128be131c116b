use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a recognition session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Client-side session identifier
    pub session_id: String,

    /// Session id assigned by the service, once it has answered
    pub sid: Option<String>,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Wall time from connect to terminal state, in seconds
    pub duration_secs: f64,

    /// Audio frames written
    pub frames_sent: usize,

    /// PCM bytes written (before base64)
    pub audio_bytes_sent: usize,

    /// Text messages received from the service
    pub messages_received: usize,

    /// Region replacements applied to the transcript
    pub corrections_applied: usize,

    /// Malformed correction regions that had to be clamped
    pub anomalies: usize,
}

impl SessionStats {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            sid: None,
            started_at: Utc::now(),
            duration_secs: 0.0,
            frames_sent: 0,
            audio_bytes_sent: 0,
            messages_received: 0,
            corrections_applied: 0,
            anomalies: 0,
        }
    }
}
