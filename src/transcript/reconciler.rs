use crate::protocol::RecognitionResult;
use tracing::{debug, warn};

/// Region starts past this many tokens are not padded out. The service
/// numbers tokens per session, so anything this far ahead is a stray index.
const MAX_REGION_START: usize = 1 << 16;

/// What one recognition result does to the token sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    Append(Vec<String>),
    /// Replace tokens `[start, end)` with `words`. Indices are kept as
    /// received; the reconciler clamps malformed ones.
    ReplaceRegion {
        start: i64,
        end: i64,
        words: Vec<String>,
    },
}

impl Correction {
    /// Derive the directive for a result. Results without a `ws` array
    /// carry no directive. A replace marker without a two-element `rg`
    /// falls back to appending.
    pub fn from_result(result: &RecognitionResult) -> Option<Self> {
        let words = result.words()?;

        if result.is_replace() {
            match result.rg.as_deref() {
                Some(&[start, end]) => {
                    return Some(Self::ReplaceRegion { start, end, words });
                }
                other => {
                    warn!("Replace result without usable rg ({:?}), appending", other);
                }
            }
        }

        Some(Self::Append(words))
    }
}

/// Ordered token sequence for one recognition session
#[derive(Debug, Default)]
pub struct TranscriptReconciler {
    tokens: Vec<String>,
    corrections_applied: usize,
    anomalies: usize,
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a recognition result. Returns whether it changed anything.
    pub fn apply(&mut self, result: &RecognitionResult) -> bool {
        match Correction::from_result(result) {
            Some(correction) => {
                self.apply_correction(correction);
                true
            }
            None => false,
        }
    }

    /// A region starting more than `MAX_REGION_START` tokens past the end is
    /// appended instead of padded out to its start.
    pub fn apply_correction(&mut self, correction: Correction) {
        match correction {
            Correction::Append(words) => {
                self.tokens.extend(words);
            }
            Correction::ReplaceRegion { start, end, words } => {
                self.replace_region(start, end, words);
            }
        }
    }

    fn replace_region(&mut self, start: i64, end: i64, words: Vec<String>) {
        if start < 0 || end < start {
            self.anomalies += 1;
            warn!(
                "Malformed correction region [{}, {}) over {} tokens, clamping",
                start,
                end,
                self.tokens.len()
            );
        }

        let mut start = start.max(0) as usize;
        let end = end.max(0) as usize;

        if start > self.tokens.len() + MAX_REGION_START {
            self.anomalies += 1;
            warn!(
                "Correction region starts at {} with only {} tokens, appending instead",
                start,
                self.tokens.len()
            );
            start = self.tokens.len();
        }

        // Keep earlier positions addressable when the sequence is short
        if self.tokens.len() < start {
            self.tokens.resize(start, String::new());
        }

        let remove_count = end.min(self.tokens.len()).saturating_sub(start);
        let removed: Vec<String> = self
            .tokens
            .splice(start..start + remove_count, words)
            .collect();

        self.corrections_applied += 1;
        debug!(
            "Replaced {:?} at {} (now {} tokens)",
            removed,
            start,
            self.tokens.len()
        );
    }

    /// Tokens joined in order. Words already carry their own spacing and
    /// punctuation, so there is no separator.
    pub fn snapshot(&self) -> String {
        self.tokens.concat()
    }

    /// Final transcript. Consumes the reconciler so nothing can be applied
    /// after the session ends.
    pub fn into_text(self) -> String {
        self.tokens.concat()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn corrections_applied(&self) -> usize {
        self.corrections_applied
    }

    pub fn anomalies(&self) -> usize {
        self.anomalies
    }
}
