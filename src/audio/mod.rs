//! Audio input for recognition
//!
//! The service only accepts 16kHz mono 16-bit PCM. Everything else goes
//! through a [`Transcoder`] first.

pub mod file;
pub mod transcode;

pub use file::AudioFile;
pub use transcode::{AutoTranscoder, FfmpegTranscoder, Transcoder, WavTranscoder};
