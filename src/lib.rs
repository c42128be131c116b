pub mod audio;
pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transcript;

pub use audio::{AudioFile, AutoTranscoder, FfmpegTranscoder, Transcoder, WavTranscoder};
pub use auth::build_signed_url;
pub use config::Config;
pub use error::RecognizeError;
pub use protocol::{FrameMessage, FrameStatus, ResponseMessage};
pub use session::{
    recognize_blocking, CancelHandle, Credentials, Recognition, RecognitionSession,
    SessionConfig, SessionState, SessionStats,
};
pub use stream::{plan_frames, FrameSink, FrameStreamer};
pub use transcript::{Correction, TranscriptReconciler};
