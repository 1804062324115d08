//! Scene rendering and final composition
//!
//! Each timeline segment renders independently into a fixed-duration clip
//! ([`scene`]). A bounded worker pool ([`pool`]) renders the clips in
//! parallel, and the concatenator ([`concat`]) joins them in timeline order and
//! muxes the song's audio on top. [`Composer`] runs the two phases back to back.

pub mod assets;
pub mod cache;
pub mod compose;
pub mod concat;
pub mod ffmpeg;
pub mod pool;
pub mod scene;
pub mod task;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use assets::{AlwaysRender, ArtifactCheck, AssetKind, AssetLayout, FsArtifactCheck, SceneAssets};
pub use cache::{AssetStamp, ClipKey};
pub use compose::{Composer, Composition};
pub use concat::{ConcatManifest, Concatenator, FinalVideo};
pub use ffmpeg::{FfmpegRunner, FfmpegSettings, SystemFfmpeg};
pub use pool::{RenderPool, RenderReport, RenderSettings, SkippedSegment};
pub use scene::SceneRenderer;
pub use task::{
    await_asset, AssetGenerator, AssetRequest, CommandAssetGenerator, GeneratorSettings,
    OperationHandle, OperationStatus, PollPolicy,
};

/// Render and mux errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no visual asset for segment {index} (expected {})", path.display())]
    AssetMissing { index: usize, path: PathBuf },

    #[error("asset generation for segment {index} timed out after {after:?}")]
    AssetTimeout { index: usize, after: Duration },

    #[error("asset generation for segment {index} failed: {reason}")]
    AssetFailed { index: usize, reason: String },

    #[error("segment {index} cannot be rendered: {reason}")]
    InvalidSegment { index: usize, reason: String },

    #[error("encoding segment {index} failed: {diagnostic}")]
    Encode { index: usize, diagnostic: String },

    #[error("mux failed: {0}")]
    Mux(String),

    #[error("render worker failed: {0}")]
    Worker(String),

    #[error("render cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Per-segment failures that skip the segment instead of aborting the run
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AssetMissing { .. } | Self::AssetTimeout { .. } | Self::AssetFailed { .. }
        )
    }

    #[must_use]
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            Self::AssetMissing { index, .. }
            | Self::AssetTimeout { index, .. }
            | Self::AssetFailed { index, .. }
            | Self::InvalidSegment { index, .. }
            | Self::Encode { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Output encoding shared by every clip of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Zoom increment per frame for still images
    pub zoom_step: f64,
    /// Maximum zoom factor for still images
    pub zoom_cap: f64,
    pub video_codec: String,
    pub pixel_format: String,
    /// Extra encoder arguments (e.g. `["-preset", "medium"]`)
    pub encoder_args: Vec<String>,
    pub audio_codec: String,
    /// Audio bitrate (e.g., "192k")
    pub audio_bitrate: Option<String>,
    /// Hardware encoder family (e.g., "videotoolbox", "nvenc")
    pub hwaccel: Option<String>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            zoom_step: 0.0015,
            zoom_cap: 1.5,
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            encoder_args: Vec::new(),
            audio_codec: "aac".to_string(),
            audio_bitrate: None,
            hwaccel: None,
        }
    }
}

impl VideoSettings {
    /// Switch to the hardware encoder for the given accelerator
    #[must_use]
    pub fn with_hwaccel(mut self, accel: &str) -> Self {
        self.hwaccel = Some(accel.to_string());

        self.video_codec = match accel {
            "videotoolbox" => "h264_videotoolbox".to_string(),
            "cuda" | "nvenc" => "h264_nvenc".to_string(),
            "vaapi" => "h264_vaapi".to_string(),
            "qsv" => "h264_qsv".to_string(),
            _ => "libx264".to_string(),
        };

        self
    }

    /// Number of frames that exactly covers `duration` seconds
    #[must_use]
    pub fn frame_count(&self, duration: f64) -> u64 {
        (duration * f64::from(self.fps)).round().max(0.0) as u64
    }

    /// Frames encoded for a clip of `duration` seconds; never zero
    #[must_use]
    pub fn clip_frames(&self, duration: f64) -> u64 {
        self.frame_count(duration).max(1)
    }

    /// Seconds covered by `frames` frames
    #[must_use]
    pub fn frames_duration(&self, frames: u64) -> f64 {
        frames as f64 / f64::from(self.fps)
    }

    /// Length of one frame in seconds
    #[must_use]
    pub fn frame_duration(&self) -> f64 {
        1.0 / f64::from(self.fps)
    }

    #[must_use]
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// A rendered scene, tagged with its timeline index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub index: usize,
    pub path: PathBuf,
    /// Encoded seconds: the segment span quantized to whole frames
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pixel_format: String,
}

impl Clip {
    /// Clip metadata for a segment spanning `span` seconds rendered with `video`
    #[must_use]
    pub fn new(index: usize, path: PathBuf, span: f64, video: &VideoSettings) -> Self {
        Self {
            index,
            path,
            duration: video.frames_duration(video.clip_frames(span)),
            width: video.width,
            height: video.height,
            fps: video.fps,
            codec: video.video_codec.clone(),
            pixel_format: video.pixel_format.clone(),
        }
    }

    /// True if both clips can be joined by stream copy
    #[must_use]
    pub fn same_encoding(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.fps == other.fps
            && self.codec == other.codec
            && self.pixel_format == other.pixel_format
    }
}

/// Sibling path ffmpeg writes to before the result is renamed into place
pub(crate) fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
        None => format!("{stem}.partial"),
    };
    output.with_file_name(name)
}
