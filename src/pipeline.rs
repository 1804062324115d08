//! Run orchestration: segment -> render -> compose -> captions
//!
//! Every step reads what the previous one persisted in the run directory, so
//! a run can be resumed or re-driven one step at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::captions::{CaptionFormat, TimelineFormatter};
use crate::config::Config;
use crate::render::{
    AssetGenerator, AssetKind, AssetLayout, CommandAssetGenerator, Composer, Concatenator,
    FfmpegRunner, RenderPool, RenderReport, SceneRenderer, SkippedSegment, SystemFfmpeg,
};
use crate::timeline::words::{load_words, save_words};
use crate::timeline::{SegmentBuilder, Timeline};

/// Files of one run under `<output>/<song>/<run-id>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    root: PathBuf,
    song: String,
}

impl RunPaths {
    #[must_use]
    pub fn new(output_dir: &Path, song: &str, run_id: &str) -> Self {
        Self {
            root: output_dir.join(song).join(run_id),
            song: song.to_string(),
        }
    }

    /// Most recent run of `song`; run ids sort chronologically
    #[must_use]
    pub fn latest(output_dir: &Path, song: &str) -> Option<Self> {
        let entries = std::fs::read_dir(output_dir.join(song)).ok()?;
        let run_id = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .max()?;
        Some(Self::new(output_dir, song, &run_id))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn song(&self) -> &str {
        &self.song
    }

    #[must_use]
    pub fn timestamps(&self) -> PathBuf {
        self.root.join("timestamps.json")
    }

    #[must_use]
    pub fn segments(&self) -> PathBuf {
        self.root.join("segments.json")
    }

    #[must_use]
    pub fn run_config(&self) -> PathBuf {
        self.root.join("run_config.toml")
    }

    #[must_use]
    pub fn assets(&self) -> AssetLayout {
        AssetLayout::new(self.root.join("assets"))
    }

    #[must_use]
    pub fn final_video(&self) -> PathBuf {
        self.root.join(format!("{}.mp4", self.song))
    }

    #[must_use]
    pub fn captions(&self, format: CaptionFormat) -> PathBuf {
        self.root.join(format!("{}.{}", self.song, format.extension()))
    }

    pub async fn create(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create run directory {}", self.root.display()))
    }
}

/// Song name used for the run directory, derived from the audio file name
#[must_use]
pub fn song_name(audio: &Path) -> String {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_matches('_');
    if name.is_empty() {
        "song".to_string()
    } else {
        name.to_string()
    }
}

/// Timestamp run id, e.g. `20260118_142501`
#[must_use]
pub fn new_run_id() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Result of a composition run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_dir: PathBuf,
    pub segments: usize,
    pub clips_rendered: usize,
    pub clips_reused: usize,
    pub skipped: Vec<SkippedSegment>,
    pub output_path: PathBuf,
    pub captions_path: PathBuf,
    /// Final video duration in seconds
    pub duration: f64,
    pub processing_time_secs: f64,
}

/// Lyric video pipeline
pub struct Pipeline {
    config: Config,
    runner: Arc<dyn FfmpegRunner>,
    generator: Option<(Arc<dyn AssetGenerator>, AssetKind)>,
}

impl Pipeline {
    /// Pipeline over the system ffmpeg, with the configured asset generator
    #[must_use]
    pub fn new(config: Config) -> Self {
        let runner: Arc<dyn FfmpegRunner> = Arc::new(SystemFfmpeg::new(config.ffmpeg.clone()));
        let generator = config.generator.clone().map(|settings| {
            let kind = settings.output_kind();
            let generator: Arc<dyn AssetGenerator> = Arc::new(CommandAssetGenerator::new(settings));
            (generator, kind)
        });

        Self {
            config,
            runner,
            generator,
        }
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn FfmpegRunner>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn AssetGenerator>, kind: AssetKind) -> Self {
        self.generator = Some((generator, kind));
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if all required tools are available
    pub async fn check_dependencies(&self) -> Vec<(String, bool)> {
        let mut results = vec![
            (
                "ffmpeg".to_string(),
                SystemFfmpeg::tool_available(&self.config.ffmpeg.ffmpeg_path).await,
            ),
            (
                "ffprobe".to_string(),
                SystemFfmpeg::tool_available(&self.config.ffmpeg.ffprobe_path).await,
            ),
        ];

        if let Some(generator) = &self.config.generator {
            results.push((
                generator.program.clone(),
                which::which(&generator.program).is_ok(),
            ));
        }

        results
    }

    /// Audio length in seconds; an unreadable file falls back to padding the timeline
    pub async fn audio_duration(&self, audio: &Path, known: Option<f64>) -> Option<f64> {
        if let Some(duration) = known {
            return Some(duration);
        }

        match self.runner.probe_duration(audio).await {
            Ok(duration) => {
                debug!(duration, audio = %audio.display(), "Read audio duration");
                Some(duration)
            }
            Err(e) => {
                warn!(
                    audio = %audio.display(),
                    padding = self.config.segmentation.fallback_padding,
                    "Could not read audio duration, padding timeline: {e}"
                );
                None
            }
        }
    }

    /// Build and persist the timeline for a run.
    ///
    /// With `words` the word timings are imported into the run first;
    /// otherwise the run's `timestamps.json` is used. An existing
    /// `segments.json` is kept unless rendering is forced.
    pub async fn segment(
        &self,
        paths: &RunPaths,
        words: Option<&Path>,
        audio_duration: Option<f64>,
    ) -> Result<Timeline> {
        let epsilon = self.config.segmentation.tiling_epsilon;
        let segments_path = paths.segments();

        if words.is_none() && segments_path.is_file() && !self.config.render.force {
            info!(path = %segments_path.display(), "Reusing existing timeline");
            return Timeline::load(&segments_path, epsilon)
                .await
                .with_context(|| format!("failed to load {}", segments_path.display()));
        }

        paths.create().await?;

        let source = words.map_or_else(|| paths.timestamps(), Path::to_path_buf);
        let words = load_words(&source)
            .await
            .with_context(|| format!("failed to load word timings from {}", source.display()))?;
        if source != paths.timestamps() {
            save_words(&words, &paths.timestamps()).await?;
        }

        let builder = SegmentBuilder::new(self.config.segmentation.clone())?;
        let timeline = builder.build(&words, audio_duration)?;
        timeline.save(&segments_path).await?;

        tokio::fs::write(paths.run_config(), self.config.to_toml()?)
            .await
            .with_context(|| format!("failed to write {}", paths.run_config().display()))?;

        info!(
            words = words.len(),
            segments = timeline.len(),
            lyrics = timeline.lyrics().count(),
            duration = timeline.total_duration(),
            "Timeline built"
        );

        Ok(timeline)
    }

    async fn load_timeline(&self, paths: &RunPaths) -> Result<Timeline> {
        let path = paths.segments();
        Timeline::load(&path, self.config.segmentation.tiling_epsilon)
            .await
            .with_context(|| format!("failed to load {} (run `segment` first)", path.display()))
    }

    fn render_pool(&self, paths: &RunPaths) -> RenderPool {
        let renderer = SceneRenderer::new(Arc::clone(&self.runner), self.config.video.clone());
        let pool = RenderPool::new(renderer, paths.assets(), &self.config.render);
        match &self.generator {
            Some((generator, kind)) => pool.with_generator(Arc::clone(generator), *kind),
            None => pool,
        }
    }

    /// Render clips only
    pub async fn render(&self, paths: &RunPaths, cancel: &CancellationToken) -> Result<RenderReport> {
        let timeline = self.load_timeline(paths).await?;
        let report = self
            .render_pool(paths)
            .render_timeline(&timeline, cancel)
            .await
            .context("rendering failed")?;
        Ok(report)
    }

    /// Render, concatenate and mux, then write captions beside the video
    pub async fn compose(
        &self,
        paths: &RunPaths,
        audio: &Path,
        audio_duration: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let timeline = self.load_timeline(paths).await?;
        let audio_duration = self.audio_duration(audio, audio_duration).await;

        let composer = Composer::new(
            self.render_pool(paths),
            Concatenator::new(Arc::clone(&self.runner), self.config.video.clone()),
        );

        info!("Composing {} segments...", timeline.len());
        let output_path = paths.final_video();
        let composition = composer
            .compose(&timeline, audio, audio_duration, &output_path, cancel)
            .await
            .context("composition failed")?;

        let captions_path = paths.captions(CaptionFormat::Srt);
        TimelineFormatter::new(CaptionFormat::Srt)
            .write(&timeline, &captions_path)
            .await?;

        let elapsed = start_time.elapsed().as_secs_f64();
        info!("Pipeline completed in {:.2}s", elapsed);

        let report = composition.report;
        Ok(PipelineResult {
            run_dir: paths.root().to_path_buf(),
            segments: timeline.len(),
            clips_rendered: report.clips.len() - report.reused,
            clips_reused: report.reused,
            skipped: report.skipped,
            output_path: composition.video.path,
            captions_path,
            duration: composition.video.duration,
            processing_time_secs: elapsed,
        })
    }

    /// Write the caption track for a run; returns its path and entry count
    pub async fn captions(&self, paths: &RunPaths, format: CaptionFormat) -> Result<(PathBuf, usize)> {
        let timeline = self.load_timeline(paths).await?;
        let path = paths.captions(format);
        let entries = TimelineFormatter::new(format).write(&timeline, &path).await?;
        debug!(entries, path = %path.display(), "Wrote captions");
        Ok((path, entries))
    }

    /// Every step, from word timings to the final video
    pub async fn run(
        &self,
        paths: &RunPaths,
        audio: &Path,
        words: Option<&Path>,
        audio_duration: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        info!("Starting pipeline for {:?}", audio);
        let audio_duration = self.audio_duration(audio, audio_duration).await;
        self.segment(paths, words, audio_duration).await?;
        self.compose(paths, audio, audio_duration, cancel).await
    }
}
