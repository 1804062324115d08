//! Scene timeline: typed, contiguous segments covering the whole song
//!
//! A [`Timeline`] is produced once by the [`SegmentBuilder`] from the aligner's
//! word stream and is read by everything downstream: the scene renderer, the
//! concatenator and the caption formatter. After it is built only asset
//! references may be attached; timing fields never change.

pub mod builder;
pub mod store;
pub mod words;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use builder::{SegmentBuilder, SegmentThresholds};
pub use words::TimestampedWord;

/// Timeline construction and persistence errors
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("no words to segment and no audio duration to fall back on")]
    EmptyInput,

    #[error("malformed word #{index}: {reason}")]
    MalformedWord { index: usize, reason: String },

    #[error("invalid segmentation thresholds: {0}")]
    InvalidThresholds(String),

    #[error("timeline is not contiguous: {0}")]
    Discontinuous(String),

    #[error("segment index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimelineError>;

/// Scene kind. Adding a kind is a compile-time-checked change for every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Silence or music before the first sung word
    Intro,
    /// A sung line
    Lyrics,
    /// Instrumental gap between lines
    Bridge,
    /// Music after the last sung word
    Outro,
}

impl SegmentKind {
    /// Placeholder text for scenes without words
    #[must_use]
    pub fn label(self) -> Option<&'static str> {
        match self {
            Self::Intro => Some("(Intro Music)"),
            Self::Bridge => Some("(Instrumental)"),
            Self::Outro => Some("(Outro Music)"),
            Self::Lyrics => None,
        }
    }

    #[must_use]
    pub fn is_lyrics(self) -> bool {
        matches!(self, Self::Lyrics)
    }
}

/// One scene of the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<TimestampedWord>,
    #[serde(default)]
    pub text: String,
    /// Visual asset attached by the asset generation step
    #[serde(default, rename = "asset_path", skip_serializing_if = "Option::is_none")]
    pub visual_asset: Option<PathBuf>,
    /// Pre-rendered transparent text overlay at target resolution
    #[serde(default, rename = "text_img", skip_serializing_if = "Option::is_none")]
    pub overlay_asset: Option<PathBuf>,
    /// Fields written by other collaborators (scene descriptions etc.), kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Segment {
    /// A segment with no words, labelled by its kind
    #[must_use]
    pub fn instrumental(kind: SegmentKind, start: f64, end: f64) -> Self {
        Self {
            kind,
            start,
            end,
            words: Vec::new(),
            text: kind.label().unwrap_or_default().to_string(),
            visual_asset: None,
            overlay_asset: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A lyrics segment opened at a single word
    #[must_use]
    pub fn line(word: TimestampedWord) -> Self {
        Self {
            kind: SegmentKind::Lyrics,
            start: word.start,
            end: word.end,
            words: vec![word],
            text: String::new(),
            visual_asset: None,
            overlay_asset: None,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Scene description left by the screenwriting step, falling back to the text
    #[must_use]
    pub fn visual_prompt(&self) -> &str {
        self.extra
            .get("visual_description")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&self.text)
    }

    pub(crate) fn refresh_text(&mut self) {
        self.text = match self.kind.label() {
            Some(label) => label.to_string(),
            None => self
                .words
                .iter()
                .map(|w| w.text.trim())
                .collect::<Vec<_>>()
                .join(" "),
        };
    }
}

/// Ordered, gap-free sequence of segments starting at zero
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    segments: Vec<Segment>,
}

impl Timeline {
    /// Wrap segments after checking that they tile `[0, end]`
    pub fn from_segments(
        segments: Vec<Segment>,
        audio_duration: Option<f64>,
        epsilon: f64,
    ) -> Result<Self> {
        let timeline = Self { segments };
        timeline.check_tiling(audio_duration, epsilon)?;
        Ok(timeline)
    }

    /// Verify contiguity, positive durations and, when known, the total span
    pub fn check_tiling(&self, audio_duration: Option<f64>, epsilon: f64) -> Result<()> {
        let first = self
            .segments
            .first()
            .ok_or_else(|| TimelineError::Discontinuous("timeline has no segments".into()))?;

        if first.start.abs() > epsilon {
            return Err(TimelineError::Discontinuous(format!(
                "first segment starts at {} instead of 0",
                first.start
            )));
        }

        for (i, seg) in self.segments.iter().enumerate() {
            if seg.start.is_nan() || seg.end.is_nan() || seg.end <= seg.start {
                return Err(TimelineError::Discontinuous(format!(
                    "segment {i} has non-positive duration [{}, {}]",
                    seg.start, seg.end
                )));
            }
        }

        for (i, pair) in self.segments.windows(2).enumerate() {
            if (pair[0].end - pair[1].start).abs() > epsilon {
                return Err(TimelineError::Discontinuous(format!(
                    "segment {i} ends at {} but segment {} starts at {}",
                    pair[0].end,
                    i + 1,
                    pair[1].start
                )));
            }
        }

        if let Some(duration) = audio_duration {
            let end = self.total_duration();
            if (end - duration).abs() > epsilon {
                return Err(TimelineError::Discontinuous(format!(
                    "timeline ends at {end} but audio lasts {duration}"
                )));
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End of the last segment
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.end)
    }

    /// Lyrics segments with their timeline index
    pub fn lyrics(&self) -> impl Iterator<Item = (usize, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind.is_lyrics())
    }

    /// Attach a visual asset to a segment. Timing is untouched.
    pub fn attach_visual(&mut self, index: usize, path: impl AsRef<Path>) -> Result<()> {
        let segment = self
            .segments
            .get_mut(index)
            .ok_or(TimelineError::IndexOutOfRange(index))?;
        segment.visual_asset = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    /// Attach a text overlay to a segment. Timing is untouched.
    pub fn attach_overlay(&mut self, index: usize, path: impl AsRef<Path>) -> Result<()> {
        let segment = self
            .segments
            .get_mut(index)
            .ok_or(TimelineError::IndexOutOfRange(index))?;
        segment.overlay_asset = Some(path.as_ref().to_path_buf());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
