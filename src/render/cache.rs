//! Identity of a rendered clip, stored beside it as `clip_NNN.json`
//!
//! A clip on disk is reused only when the key saved after its encode equals
//! the key computed for the current segment span, input assets and encoding.

use super::assets::SceneAssets;
use super::{Result, VideoSettings};
use crate::timeline::Segment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Path, size and modification time of an input asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStamp {
    pub path: PathBuf,
    pub size: Option<u64>,
    /// Nanoseconds since the Unix epoch
    pub modified_ns: Option<u64>,
}

impl AssetStamp {
    /// Stamp `path` from its metadata; unreadable fields stay `None`
    pub async fn read(path: &Path) -> Self {
        let meta = tokio::fs::metadata(path).await.ok();
        let modified_ns = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| u64::try_from(d.as_nanos()).ok());

        Self {
            path: path.to_path_buf(),
            size: meta.as_ref().map(std::fs::Metadata::len),
            modified_ns,
        }
    }
}

/// Everything a clip's pixels depend on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipKey {
    pub start: f64,
    pub end: f64,
    pub frames: u64,
    pub visual: AssetStamp,
    pub overlay: Option<AssetStamp>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pixel_format: String,
    pub encoder_args: Vec<String>,
    pub zoom_step: f64,
    pub zoom_cap: f64,
}

impl ClipKey {
    pub async fn new(segment: &Segment, assets: &SceneAssets, video: &VideoSettings) -> Self {
        let overlay = match &assets.overlay {
            Some(path) => Some(AssetStamp::read(path).await),
            None => None,
        };

        Self {
            start: segment.start,
            end: segment.end,
            frames: video.clip_frames(segment.duration()),
            visual: AssetStamp::read(&assets.visual).await,
            overlay,
            width: video.width,
            height: video.height,
            fps: video.fps,
            codec: video.video_codec.clone(),
            pixel_format: video.pixel_format.clone(),
            encoder_args: video.encoder_args.clone(),
            zoom_step: video.zoom_step,
            zoom_cap: video.zoom_cap,
        }
    }

    /// Saved key at `path`; a missing or unreadable file yields `None`
    pub async fn load(path: &Path) -> Option<Self> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("Ignoring unreadable clip key {}: {e}", path.display());
                None
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// True when the key saved at `path` describes the same clip
    pub async fn matches_saved(&self, path: &Path) -> bool {
        Self::load(path).await.as_ref() == Some(self)
    }
}
