//! Joins rendered clips and muxes the song audio
//!
//! Clips are joined with the concat demuxer and stream copy, so they must
//! share encoding parameters. The output is cut to the shorter of video and
//! audio, and its measured length must match that within one frame.

use super::ffmpeg::FfmpegRunner;
use super::{partial_path, Clip, RenderError, Result, VideoSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered concat-demuxer input list
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatManifest {
    dir: PathBuf,
    clips: Vec<Clip>,
}

impl ConcatManifest {
    /// Order clips by timeline index for a manifest stored in `dir`.
    ///
    /// Completion order does not matter. Fails when there is nothing to join,
    /// an index repeats, or the clips cannot be stream-copied together.
    pub fn from_clips(clips: &[Clip], dir: &Path) -> Result<Self> {
        let mut sorted = clips.to_vec();
        sorted.sort_by_key(|c| c.index);

        let first = sorted
            .first()
            .ok_or_else(|| RenderError::Mux("no clips to concatenate".into()))?;

        for pair in sorted.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(RenderError::Mux(format!(
                    "segment {} has more than one clip",
                    pair[0].index
                )));
            }
        }

        if let Some(odd) = sorted.iter().find(|c| !c.same_encoding(first)) {
            return Err(RenderError::Mux(format!(
                "clip {} is {}x{}@{} {} {} but clip {} is {}x{}@{} {} {}",
                odd.index,
                odd.width,
                odd.height,
                odd.fps,
                odd.codec,
                odd.pixel_format,
                first.index,
                first.width,
                first.height,
                first.fps,
                first.codec,
                first.pixel_format
            )));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            clips: sorted,
        })
    }

    #[must_use]
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Sum of clip durations in seconds
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration).sum()
    }

    /// Manifest text, one `file '...'` line per clip
    #[must_use]
    pub fn render(&self) -> String {
        self.clips
            .iter()
            .map(|clip| format!("file '{}'\n", escape(&self.entry(&clip.path))))
            .collect()
    }

    /// Clips beside the manifest are listed by file name
    fn entry(&self, path: &Path) -> String {
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) if parent == self.dir => name.to_string_lossy().to_string(),
            _ => path.to_string_lossy().to_string(),
        }
    }
}

fn escape(entry: &str) -> String {
    entry.replace('\'', "'\\''")
}

/// Slack for binary representation error in duration sums
pub(crate) const DURATION_EPSILON: f64 = 1e-6;

/// Playable length of a muxed video cut to the shorter stream
#[must_use]
pub fn expected_duration(audio_duration: Option<f64>, clips_total: f64) -> f64 {
    match audio_duration {
        Some(audio) => audio.min(clips_total),
        None => clips_total,
    }
}

/// The muxed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideo {
    pub path: PathBuf,
    /// Seconds, measured from the written file
    pub duration: f64,
    /// Shorter of the audio and the joined clips
    pub expected_duration: f64,
    pub clip_count: usize,
    /// Sum of the joined clip durations
    pub video_duration: f64,
    pub audio_duration: Option<f64>,
}

/// Concatenates clips and muxes audio
pub struct Concatenator {
    runner: Arc<dyn FfmpegRunner>,
    video: VideoSettings,
}

impl Concatenator {
    #[must_use]
    pub fn new(runner: Arc<dyn FfmpegRunner>, video: VideoSettings) -> Self {
        Self { runner, video }
    }

    /// ffmpeg arguments for the mux; the output path is the last argument
    #[must_use]
    pub fn mux_args(&self, manifest: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "warning",
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        args.push(manifest.to_string_lossy().to_string());
        args.extend(["-i".to_string(), audio.to_string_lossy().to_string()]);
        args.extend(
            ["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a"]
                .iter()
                .map(ToString::to_string),
        );
        args.push(self.video.audio_codec.clone());

        if let Some(ref bitrate) = self.video.audio_bitrate {
            args.extend(["-b:a".to_string(), bitrate.clone()]);
        }

        args.extend(
            ["-shortest", "-movflags", "+faststart"]
                .iter()
                .map(ToString::to_string),
        );
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Join `clips` in timeline order and mux them with `audio` into `output`.
    ///
    /// The final file only appears once ffmpeg succeeds, and is removed again
    /// when its measured length is off by more than one frame.
    pub async fn concatenate(
        &self,
        clips: &[Clip],
        audio: &Path,
        audio_duration: Option<f64>,
        manifest_path: &Path,
        output: &Path,
    ) -> Result<FinalVideo> {
        let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let manifest = ConcatManifest::from_clips(clips, manifest_dir)?;

        tokio::fs::create_dir_all(manifest_dir).await?;
        tokio::fs::write(manifest_path, manifest.render()).await?;
        debug!(
            clips = manifest.clips().len(),
            manifest = %manifest_path.display(),
            "Wrote concat manifest"
        );

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(output);
        let args = self.mux_args(manifest_path, audio, &partial);

        if let Err(e) = self.runner.run(&args).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(RenderError::Mux(e.0));
        }
        tokio::fs::rename(&partial, output).await?;

        let video_duration = manifest.total_duration();
        let expected = expected_duration(audio_duration, video_duration);
        let measured = match self.verify_duration(output, expected).await {
            Ok(measured) => measured,
            Err(e) => {
                let _ = tokio::fs::remove_file(output).await;
                return Err(e);
            }
        };

        let final_video = FinalVideo {
            path: output.to_path_buf(),
            duration: measured,
            expected_duration: expected,
            clip_count: manifest.clips().len(),
            video_duration,
            audio_duration,
        };

        info!(
            clips = final_video.clip_count,
            duration = final_video.duration,
            "Muxed {}",
            output.display()
        );

        Ok(final_video)
    }

    /// Measure `output` and compare it with `expected` within one frame
    async fn verify_duration(&self, output: &Path, expected: f64) -> Result<f64> {
        let measured = self
            .runner
            .probe_duration(output)
            .await
            .map_err(|e| RenderError::Mux(format!("cannot measure {}: {}", output.display(), e.0)))?;

        let tolerance = self.video.frame_duration() + DURATION_EPSILON;
        if (measured - expected).abs() > tolerance {
            return Err(RenderError::Mux(format!(
                "{} lasts {measured:.3}s but {expected:.3}s was expected",
                output.display()
            )));
        }

        debug!(measured, expected, "Final duration verified");
        Ok(measured)
    }
}
