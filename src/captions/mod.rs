//! Caption track export
//!
//! Only sung lines become captions. Instrumental scenes and lines whose text
//! is blank are left out without consuming a sequence number.

use crate::timeline::{Segment, Timeline};
use std::fmt::Write as FmtWrite;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("failed to format captions: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptionError>;

/// Caption file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptionFormat {
    /// `SubRip` (.srt)
    #[default]
    Srt,
    /// `WebVTT` (.vtt)
    Vtt,
}

impl CaptionFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }
}

impl std::str::FromStr for CaptionFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" | "webvtt" => Ok(Self::Vtt),
            other => Err(format!("unknown caption format '{other}' (expected srt or vtt)")),
        }
    }
}

/// One caption with millisecond timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEntry {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl CaptionEntry {
    /// Caption for a lyrics segment with visible text
    #[must_use]
    pub fn from_segment(segment: &Segment) -> Option<Self> {
        if !segment.kind.is_lyrics() {
            return None;
        }
        let text = segment.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            start_ms: seconds_to_ms(segment.start),
            end_ms: seconds_to_ms(segment.end),
            text: text.to_string(),
        })
    }

    /// Captions for a whole timeline, in timeline order
    #[must_use]
    pub fn collect(timeline: &Timeline) -> Vec<Self> {
        timeline.iter().filter_map(Self::from_segment).collect()
    }

    fn split(ms: u64) -> (u64, u64, u64, u64) {
        (
            ms / 3_600_000,
            (ms % 3_600_000) / 60_000,
            (ms % 60_000) / 1000,
            ms % 1000,
        )
    }

    /// `HH:MM:SS,mmm`
    fn format_srt_time(ms: u64) -> String {
        let (hours, minutes, seconds, millis) = Self::split(ms);
        format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
    }

    /// `HH:MM:SS.mmm`
    fn format_vtt_time(ms: u64) -> String {
        let (hours, minutes, seconds, millis) = Self::split(ms);
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// Truncate to whole milliseconds. The small bias absorbs binary
/// representation error (1.001 s is stored as 1.000999...).
fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0 + 1e-6).floor() as u64
}

/// Renders caption entries to text
pub trait CaptionGenerator: Send + Sync {
    fn format(&self) -> CaptionFormat;

    fn generate(&self, entries: &[CaptionEntry]) -> Result<String>;

    /// Write captions to a file
    fn write_to_file<'a>(
        &'a self,
        entries: &'a [CaptionEntry],
        path: &'a Path,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let content = self.generate(entries)?;
            fs::write(path, content).await?;
            Ok(())
        })
    }

    /// Write captions to an async writer
    fn write_to<'a, W: AsyncWrite + Unpin + Send + 'a>(
        &'a self,
        entries: &'a [CaptionEntry],
        writer: &'a mut W,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>
    where
        Self: Sized,
    {
        Box::pin(async move {
            let content = self.generate(entries)?;
            writer.write_all(content.as_bytes()).await?;
            writer.flush().await?;
            Ok(())
        })
    }
}

/// SRT caption generator
#[derive(Debug, Clone, Copy, Default)]
pub struct SrtGenerator;

impl CaptionGenerator for SrtGenerator {
    fn format(&self) -> CaptionFormat {
        CaptionFormat::Srt
    }

    fn generate(&self, entries: &[CaptionEntry]) -> Result<String> {
        let mut output = String::new();

        for (i, entry) in entries.iter().enumerate() {
            writeln!(output, "{}", i + 1)?;
            writeln!(
                output,
                "{} --> {}",
                CaptionEntry::format_srt_time(entry.start_ms),
                CaptionEntry::format_srt_time(entry.end_ms)
            )?;
            writeln!(output, "{}", entry.text)?;
            writeln!(output)?;
        }

        Ok(output)
    }
}

/// `WebVTT` caption generator
#[derive(Debug, Clone, Copy, Default)]
pub struct VttGenerator;

impl CaptionGenerator for VttGenerator {
    fn format(&self) -> CaptionFormat {
        CaptionFormat::Vtt
    }

    fn generate(&self, entries: &[CaptionEntry]) -> Result<String> {
        let mut output = String::from("WEBVTT\n\n");

        for (i, entry) in entries.iter().enumerate() {
            writeln!(output, "{}", i + 1)?;
            writeln!(
                output,
                "{} --> {}",
                CaptionEntry::format_vtt_time(entry.start_ms),
                CaptionEntry::format_vtt_time(entry.end_ms)
            )?;
            writeln!(output, "{}", entry.text)?;
            writeln!(output)?;
        }

        Ok(output)
    }
}

/// Formats a timeline's sung lines as a caption track
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineFormatter {
    format: CaptionFormat,
}

impl TimelineFormatter {
    #[must_use]
    pub fn new(format: CaptionFormat) -> Self {
        Self { format }
    }

    #[must_use]
    pub fn caption_format(&self) -> CaptionFormat {
        self.format
    }

    fn generator(&self) -> Box<dyn CaptionGenerator> {
        match self.format {
            CaptionFormat::Srt => Box::new(SrtGenerator),
            CaptionFormat::Vtt => Box::new(VttGenerator),
        }
    }

    pub fn format(&self, timeline: &Timeline) -> Result<String> {
        self.generator().generate(&CaptionEntry::collect(timeline))
    }

    pub async fn write(&self, timeline: &Timeline, path: &Path) -> Result<usize> {
        let entries = CaptionEntry::collect(timeline);
        self.generator().write_to_file(&entries, path).await?;
        Ok(entries.len())
    }
}
