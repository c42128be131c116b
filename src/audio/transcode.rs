use crate::error::{RecognizeError, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Sample rate the recognition service expects
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Turns arbitrary audio bytes into 16kHz mono s16le PCM
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn to_pcm(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// WAV decoding in-process
#[derive(Debug, Clone, Copy, Default)]
pub struct WavTranscoder;

impl WavTranscoder {
    pub fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let reader = WavReader::new(Cursor::new(input))
            .map_err(|e| RecognizeError::Transcode(format!("invalid WAV data: {e}")))?;
        let spec = reader.spec();

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| RecognizeError::Transcode(format!("failed to read samples: {e}")))?,
            (SampleFormat::Int, bits) if bits <= 32 => {
                let shift = bits as i32 - 16;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| rescale_int(v, shift)))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| {
                        RecognizeError::Transcode(format!("failed to read samples: {e}"))
                    })?
            }
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| RecognizeError::Transcode(format!("failed to read samples: {e}")))?,
            (format, bits) => {
                return Err(RecognizeError::Transcode(format!(
                    "unsupported WAV sample format {:?}/{} bits",
                    format, bits
                )))
            }
        };

        debug!(
            "Decoded WAV: {}Hz, {} channels, {} bits, {} samples",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            samples.len()
        );

        let mono = downmix_to_mono(&samples, spec.channels);
        let resampled = resample_linear(&mono, spec.sample_rate, TARGET_SAMPLE_RATE);
        Ok(samples_to_le_bytes(&resampled))
    }
}

#[async_trait]
impl Transcoder for WavTranscoder {
    async fn to_pcm(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decode(input)
    }
}

/// Anything ffmpeg can read, through an `ffmpeg` child process
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn to_pcm(&self, input: &[u8]) -> Result<Vec<u8>> {
        info!("Transcoding {} bytes with {}", input.len(), self.binary);

        let mut child = Command::new(&self.binary)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-acodec",
                "pcm_s16le",
                "-ac",
                "1",
                "-ar",
                "16000",
                "-f",
                "s16le",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecognizeError::Transcode(format!("failed to start {}: {e}", self.binary)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecognizeError::Transcode("ffmpeg stdin unavailable".to_string()))?;
        let owned = input.to_vec();
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&owned).await;
            drop(stdin);
            written
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RecognizeError::Transcode(format!("ffmpeg did not finish: {e}")))?;

        if let Ok(Err(e)) = writer.await {
            // ffmpeg may stop reading early on bad input; its exit status says why
            debug!("ffmpeg stdin closed early: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("ffmpeg failed ({}): {}", output.status, stderr.trim());
            return Err(RecognizeError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(RecognizeError::Transcode(
                "ffmpeg produced no audio".to_string(),
            ));
        }

        info!("Transcoded to {} bytes of PCM", output.stdout.len());
        Ok(output.stdout)
    }
}

/// WAV in-process when possible, ffmpeg otherwise
#[derive(Debug, Clone, Default)]
pub struct AutoTranscoder {
    wav: WavTranscoder,
    ffmpeg: FfmpegTranscoder,
}

impl AutoTranscoder {
    pub fn new(ffmpeg: FfmpegTranscoder) -> Self {
        Self {
            wav: WavTranscoder,
            ffmpeg,
        }
    }
}

#[async_trait]
impl Transcoder for AutoTranscoder {
    async fn to_pcm(&self, input: &[u8]) -> Result<Vec<u8>> {
        if is_wav(input) {
            match self.wav.decode(input) {
                Ok(pcm) => return Ok(pcm),
                Err(e) => warn!("{}, falling back to ffmpeg", e),
            }
        }
        self.ffmpeg.to_pcm(input).await
    }
}

pub fn is_wav(input: &[u8]) -> bool {
    input.len() >= 12 && &input[0..4] == b"RIFF" && &input[8..12] == b"WAVE"
}

fn rescale_int(value: i32, shift: i32) -> i16 {
    let scaled = if shift >= 0 {
        value >> shift
    } else {
        value << -shift
    };
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Average interleaved channels into one
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampling of a mono signal
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let out_len = ((samples.len() as u64 * to_rate as u64) / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = pos - idx as f64;
            let value = samples[idx] as f64 + (samples[next] as f64 - samples[idx] as f64) * frac;
            value.round() as i16
        })
        .collect()
}

pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
