//! Renders one segment into a fixed-duration clip
//!
//! Stills get a centered slow zoom, videos are looped and trimmed, and the
//! optional text overlay is composited at the origin. Both paths aspect-fill
//! the target frame and are cut to exactly `round(duration * fps)` frames.
//! ffmpeg writes to a sibling partial file that is renamed onto the clip path
//! only after a successful encode.

use super::assets::{ArtifactCheck, AssetKind, FsArtifactCheck, SceneAssets};
use super::ffmpeg::FfmpegRunner;
use super::{partial_path, Clip, RenderError, Result, VideoSettings};
use crate::timeline::Segment;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Encodes scene clips through an [`FfmpegRunner`]
pub struct SceneRenderer {
    runner: Arc<dyn FfmpegRunner>,
    video: VideoSettings,
    assets: Arc<dyn ArtifactCheck>,
}

impl SceneRenderer {
    #[must_use]
    pub fn new(runner: Arc<dyn FfmpegRunner>, video: VideoSettings) -> Self {
        Self {
            runner,
            video,
            assets: Arc::new(FsArtifactCheck),
        }
    }

    /// Replace the check used to confirm input assets exist
    #[must_use]
    pub fn with_asset_check(mut self, check: Arc<dyn ArtifactCheck>) -> Self {
        self.assets = check;
        self
    }

    #[must_use]
    pub fn video(&self) -> &VideoSettings {
        &self.video
    }

    /// Clip record for an artifact that is already on disk
    #[must_use]
    pub fn existing_clip(&self, index: usize, segment: &Segment, path: &Path) -> Clip {
        Clip::new(index, path.to_path_buf(), segment.duration(), &self.video)
    }

    /// Render `segment` to `output`
    pub async fn render(
        &self,
        index: usize,
        segment: &Segment,
        assets: &SceneAssets,
        output: &Path,
    ) -> Result<Clip> {
        for input in std::iter::once(&assets.visual).chain(assets.overlay.as_ref()) {
            if !self.assets.is_present(input) {
                return Err(RenderError::AssetMissing {
                    index,
                    path: input.clone(),
                });
            }
        }

        let partial = partial_path(output);
        let args = self.build_args(index, segment, assets, &partial)?;

        debug!(
            segment = index,
            kind = ?segment.kind,
            asset = %assets.visual.display(),
            "Rendering clip"
        );

        if let Err(e) = self.runner.run(&args).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(RenderError::Encode {
                index,
                diagnostic: e.0,
            });
        }
        tokio::fs::rename(&partial, output).await?;

        info!(
            segment = index,
            duration = segment.duration(),
            "Rendered {}",
            output.display()
        );

        Ok(Clip::new(
            index,
            output.to_path_buf(),
            segment.duration(),
            &self.video,
        ))
    }

    /// ffmpeg arguments for one clip; the output path is the last argument
    pub fn build_args(
        &self,
        index: usize,
        segment: &Segment,
        assets: &SceneAssets,
        output: &Path,
    ) -> Result<Vec<String>> {
        let duration = segment.duration();
        if duration.is_nan() || duration <= 0.0 || duration.is_infinite() {
            return Err(RenderError::InvalidSegment {
                index,
                reason: format!("non-positive span [{}, {}]", segment.start, segment.end),
            });
        }

        let v = &self.video;
        let frames = v.clip_frames(duration);

        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "warning", "-y"]
            .iter()
            .map(ToString::to_string)
            .collect();

        if assets.kind == AssetKind::Video {
            args.extend(["-stream_loop".to_string(), "-1".to_string()]);
        }
        args.extend(["-i".to_string(), path_arg(&assets.visual)]);

        if let Some(overlay) = &assets.overlay {
            args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                v.fps.to_string(),
                "-i".to_string(),
                path_arg(overlay),
            ]);
        }

        args.push("-filter_complex".to_string());
        args.push(self.filter_graph(assets, duration, frames));

        args.extend(["-map".to_string(), "[outv]".to_string(), "-an".to_string()]);
        args.extend(["-c:v".to_string(), v.video_codec.clone()]);
        args.extend(v.encoder_args.iter().cloned());
        args.extend([
            "-pix_fmt".to_string(),
            v.pixel_format.clone(),
            "-r".to_string(),
            v.fps.to_string(),
            "-frames:v".to_string(),
            frames.to_string(),
            path_arg(output),
        ]);

        Ok(args)
    }

    fn filter_graph(&self, assets: &SceneAssets, duration: f64, frames: u64) -> String {
        let v = &self.video;
        let (w, h, fps) = (v.width, v.height, v.fps);
        let fill = format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1");

        let base = match assets.kind {
            AssetKind::Still => format!(
                "[0:v]{fill},zoompan=z='min(zoom+{step},{cap})':d={frames}:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={w}x{h}:fps={fps}[base]",
                step = v.zoom_step,
                cap = v.zoom_cap,
            ),
            AssetKind::Video => format!(
                "[0:v]{fill},fps={fps},trim=duration={duration:.6},setpts=PTS-STARTPTS[base]"
            ),
        };

        let composed = if assets.overlay.is_some() {
            "[base][1:v]overlay=0:0:format=auto:shortest=1[comp]"
        } else {
            "[base]null[comp]"
        };

        format!(
            "{base};{composed};[comp]fps={fps}:round=up,format={pix}[outv]",
            pix = v.pixel_format
        )
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
