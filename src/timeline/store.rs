//! `segments.json` persistence
//!
//! The file is the hand-off point between pipeline steps: asset generation
//! attaches `asset_path`/`text_img` to the records, and the compose step reads
//! them back.

use super::{Result, Segment, Timeline};
use std::path::Path;
use tracing::debug;

impl Timeline {
    /// Parse a timeline, re-checking contiguity
    pub fn from_json(json: &str, epsilon: f64) -> Result<Self> {
        let segments: Vec<Segment> = serde_json::from_str(json)?;
        Self::from_segments(segments, None, epsilon)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path, epsilon: f64) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let timeline = Self::from_json(&json, epsilon)?;
        debug!(path = %path.display(), segments = timeline.len(), "Loaded timeline");
        Ok(timeline)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json()?).await?;
        debug!(path = %path.display(), segments = self.len(), "Saved timeline");
        Ok(())
    }
}
