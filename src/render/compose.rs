//! Render phase followed by the concat/mux barrier

use super::concat::{expected_duration, Concatenator, FinalVideo, DURATION_EPSILON};
use super::pool::{RenderPool, RenderReport};
use super::{RenderError, Result};
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a full composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub video: FinalVideo,
    pub report: RenderReport,
}

/// Renders a timeline and muxes it with the song
pub struct Composer {
    pool: RenderPool,
    concatenator: Concatenator,
}

impl Composer {
    #[must_use]
    pub fn new(pool: RenderPool, concatenator: Concatenator) -> Self {
        Self { pool, concatenator }
    }

    #[must_use]
    pub fn pool(&self) -> &RenderPool {
        &self.pool
    }

    /// Render every segment, then join the clips in timeline order with `audio`
    pub async fn compose(
        &self,
        timeline: &Timeline,
        audio: &Path,
        audio_duration: Option<f64>,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<Composition> {
        let report = self.pool.render_timeline(timeline, cancel).await?;
        let rendered = report.clip_duration();
        check_conservation(timeline, &report)?;

        let expected = expected_duration(audio_duration, rendered);
        debug!(
            rendered,
            audio = ?audio_duration,
            expected,
            "Clip durations account for the timeline"
        );

        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let manifest = self.pool.layout().manifest();
        let video = self
            .concatenator
            .concatenate(&report.clips, audio, audio_duration, &manifest, output)
            .await?;

        info!(
            clips = video.clip_count,
            skipped = report.skipped.len(),
            duration = video.duration,
            "Composition complete"
        );

        Ok(Composition { video, report })
    }
}

/// Rendered clips plus skipped segments must account for the whole timeline.
///
/// Each clip may differ from its segment by half a frame of rounding.
fn check_conservation(timeline: &Timeline, report: &RenderReport) -> Result<()> {
    let skipped: f64 = report
        .skipped
        .iter()
        .filter_map(|s| timeline.get(s.index))
        .map(crate::timeline::Segment::duration)
        .sum();
    let rendered = report.clip_duration();
    let total = timeline.total_duration();
    let rounding: f64 = report
        .clips
        .iter()
        .map(|c| 0.5 / f64::from(c.fps.max(1)))
        .sum();

    if (rendered + skipped - total).abs() > rounding + DURATION_EPSILON {
        return Err(RenderError::Mux(format!(
            "clips cover {rendered}s and skipped segments {skipped}s of a {total}s timeline"
        )));
    }
    Ok(())
}
