use super::transcode::{Transcoder, TARGET_SAMPLE_RATE};
use crate::error::Result as RecognizeResult;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Bytes per second of 16kHz mono 16-bit PCM
const PCM_BYTES_PER_SECOND: f64 = TARGET_SAMPLE_RATE as f64 * 2.0;

pub struct AudioFile {
    pub path: String,
    pub bytes: Vec<u8>,
    /// Already headerless 16kHz mono s16le (`.pcm` / `.raw`)
    pub is_raw_pcm: bool,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read audio file {}", path.display()))?;

        let is_raw_pcm = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pcm") || e.eq_ignore_ascii_case("raw"))
            .unwrap_or(false);

        info!(
            "Audio file loaded: {} bytes{}",
            bytes.len(),
            if is_raw_pcm { " (raw PCM)" } else { "" }
        );

        Ok(Self {
            path: path.display().to_string(),
            bytes,
            is_raw_pcm,
        })
    }

    /// 16kHz mono s16le bytes, transcoding unless the file is raw PCM
    pub async fn to_pcm(&self, transcoder: &dyn Transcoder) -> RecognizeResult<Vec<u8>> {
        let pcm = if self.is_raw_pcm {
            self.bytes.clone()
        } else {
            transcoder.to_pcm(&self.bytes).await?
        };

        info!(
            "PCM ready: {} bytes ({:.1} seconds)",
            pcm.len(),
            pcm_duration_seconds(pcm.len())
        );

        Ok(pcm)
    }
}

pub fn pcm_duration_seconds(len: usize) -> f64 {
    len as f64 / PCM_BYTES_PER_SECOND
}
