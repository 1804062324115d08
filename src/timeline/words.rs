//! Word stream produced by the forced aligner

use super::{Result, TimelineError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A single aligned word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedWord {
    #[serde(rename = "word", alias = "text")]
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Aligner score (0.0 - 1.0)
    #[serde(default, rename = "score", alias = "confidence")]
    pub confidence: f64,
}

impl TimestampedWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence: 1.0,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Reject values that would break timeline arithmetic
    pub(crate) fn check(&self, index: usize) -> Result<()> {
        let malformed = |reason: String| TimelineError::MalformedWord { index, reason };

        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(malformed(format!(
                "non-finite timing [{}, {}]",
                self.start, self.end
            )));
        }
        if self.start < 0.0 {
            return Err(malformed(format!("negative start {}", self.start)));
        }
        if self.end < self.start {
            return Err(malformed(format!(
                "end {} precedes start {}",
                self.end, self.start
            )));
        }
        if self.confidence.is_nan() || self.confidence < 0.0 {
            return Err(malformed(format!("invalid confidence {}", self.confidence)));
        }
        Ok(())
    }
}

/// Aligner record as written to disk; timing may be absent for unalignable tokens
#[derive(Debug, Deserialize)]
struct RawWord {
    #[serde(alias = "text")]
    word: String,
    start: Option<f64>,
    end: Option<f64>,
    #[serde(default, alias = "confidence")]
    score: Option<f64>,
}

/// Parse an aligner JSON array. Entries without timing are dropped.
pub fn parse_words(json: &str) -> Result<Vec<TimestampedWord>> {
    let raw: Vec<RawWord> = serde_json::from_str(json)?;
    let total = raw.len();

    let words: Vec<TimestampedWord> = raw
        .into_iter()
        .filter_map(|w| match (w.start, w.end) {
            (Some(start), Some(end)) => Some(TimestampedWord {
                text: w.word,
                start,
                end,
                confidence: w.score.unwrap_or(0.0),
            }),
            _ => None,
        })
        .collect();

    if words.len() < total {
        debug!(
            dropped = total - words.len(),
            "Dropped words without alignment timing"
        );
    }

    Ok(words)
}

/// Load the word stream from a JSON file
pub async fn load_words(path: &Path) -> Result<Vec<TimestampedWord>> {
    let json = tokio::fs::read_to_string(path).await?;
    parse_words(&json)
}

/// Persist the word stream in aligner format
pub async fn save_words(words: &[TimestampedWord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(words)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
