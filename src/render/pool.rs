//! Bounded parallel rendering of a whole timeline
//!
//! Every segment becomes one task on a [`JoinSet`]; a [`Semaphore`] caps how
//! many encode at once. Recoverable failures skip the segment, and the first
//! fatal failure cancels the remaining work. Cancellation drops in-flight
//! encodes, which kills their ffmpeg processes.
//!
//! A clip from an earlier run is reused only when its saved [`ClipKey`]
//! matches the segment span, input assets and encoding of this run.

use super::assets::{AlwaysRender, ArtifactCheck, AssetKind, AssetLayout, FsArtifactCheck, SceneAssets};
use super::cache::ClipKey;
use super::scene::SceneRenderer;
use super::task::{await_asset, AssetGenerator, AssetRequest, PollPolicy};
use super::{Clip, RenderError, Result};
use crate::timeline::{Segment, Timeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Render phase settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Concurrent encodes
    pub workers: usize,
    /// Deadline for one generated asset
    pub asset_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Re-render clips that already exist
    pub force: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            asset_timeout_secs: 600,
            poll_interval_secs: 10,
            force: false,
        }
    }
}

impl RenderSettings {
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(self.asset_timeout_secs),
        }
    }
}

/// A segment left out of the cut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSegment {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a render phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    /// Sorted by timeline index
    pub clips: Vec<Clip>,
    /// Sorted by timeline index
    pub skipped: Vec<SkippedSegment>,
    /// Clips taken from a previous run
    pub reused: usize,
}

impl RenderReport {
    /// Sum of clip durations in seconds
    #[must_use]
    pub fn clip_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration).sum()
    }
}

/// Shared per-task state
#[derive(Clone)]
struct Worker {
    renderer: Arc<SceneRenderer>,
    layout: Arc<AssetLayout>,
    artifacts: Arc<dyn ArtifactCheck>,
    assets: Arc<dyn ArtifactCheck>,
    generator: Option<(Arc<dyn AssetGenerator>, AssetKind)>,
    policy: PollPolicy,
}

impl Worker {
    /// Returns the clip and whether it was reused
    async fn render_segment(
        &self,
        index: usize,
        segment: &Segment,
        cancel: &CancellationToken,
    ) -> Result<(Clip, bool)> {
        let output = self.layout.clip(index);
        let key_path = self.layout.clip_key(index);

        let assets = match self.layout.resolve(index, segment, self.assets.as_ref()) {
            Some(assets) => assets,
            None => self.generate(index, segment, cancel).await?,
        };
        let key = ClipKey::new(segment, &assets, self.renderer.video()).await;

        if self.artifacts.is_present(&output) && key.matches_saved(&key_path).await {
            debug!(segment = index, "Reusing {}", output.display());
            return Ok((self.renderer.existing_clip(index, segment, &output), true));
        }

        let _ = tokio::fs::remove_file(&key_path).await;
        let clip = self.renderer.render(index, segment, &assets, &output).await?;
        key.save(&key_path).await?;
        Ok((clip, false))
    }

    async fn generate(
        &self,
        index: usize,
        segment: &Segment,
        cancel: &CancellationToken,
    ) -> Result<SceneAssets> {
        let Some((generator, kind)) = &self.generator else {
            return Err(RenderError::AssetMissing {
                index,
                path: self.layout.scene_image(index),
            });
        };

        let output = match kind {
            AssetKind::Video => self.layout.scene_video(index),
            AssetKind::Still => self.layout.scene_image(index),
        };
        let request = AssetRequest {
            index,
            prompt: segment.visual_prompt().to_string(),
            duration: segment.duration(),
            output,
        };

        let visual = await_asset(generator.as_ref(), &request, self.policy, cancel).await?;
        let overlay = self
            .layout
            .resolve_overlay(index, segment, self.assets.as_ref());
        Ok(SceneAssets::new(visual, overlay))
    }
}

/// Renders every segment of a timeline with bounded concurrency
pub struct RenderPool {
    worker: Worker,
    workers: usize,
}

impl RenderPool {
    /// Pool over `layout`; matching clips are reused unless `settings.force`
    #[must_use]
    pub fn new(renderer: SceneRenderer, layout: AssetLayout, settings: &RenderSettings) -> Self {
        let artifacts: Arc<dyn ArtifactCheck> = if settings.force {
            Arc::new(AlwaysRender)
        } else {
            Arc::new(FsArtifactCheck)
        };

        Self {
            worker: Worker {
                renderer: Arc::new(renderer),
                layout: Arc::new(layout),
                artifacts,
                assets: Arc::new(FsArtifactCheck),
                generator: None,
                policy: settings.poll_policy(),
            },
            workers: settings.workers.max(1),
        }
    }

    /// Replace the clip reuse policy
    #[must_use]
    pub fn with_artifact_check(mut self, check: Arc<dyn ArtifactCheck>) -> Self {
        self.worker.artifacts = check;
        self
    }

    /// Generate missing visuals with `generator`
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn AssetGenerator>, kind: AssetKind) -> Self {
        self.worker.generator = Some((generator, kind));
        self
    }

    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.worker.policy = policy;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &AssetLayout {
        &self.worker.layout
    }

    #[must_use]
    pub fn renderer(&self) -> &SceneRenderer {
        &self.worker.renderer
    }

    /// Render all segments. Clips come back in timeline order whatever
    /// order they finished in.
    pub async fn render_timeline(
        &self,
        timeline: &Timeline,
        cancel: &CancellationToken,
    ) -> Result<RenderReport> {
        self.worker.layout.ensure_dirs().await?;

        let run = cancel.child_token();
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        info!(
            segments = timeline.len(),
            workers = self.workers,
            "Rendering clips"
        );

        for (index, segment) in timeline.iter().enumerate() {
            let worker = self.worker.clone();
            let permits = Arc::clone(&permits);
            let segment = segment.clone();
            let run = run.clone();

            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => tokio::select! {
                        biased;
                        () = run.cancelled() => Err(RenderError::Cancelled),
                        result = worker.render_segment(index, &segment, &run) => result,
                    },
                    Err(_) => Err(RenderError::Cancelled),
                };
                (index, outcome)
            });
        }

        let mut report = RenderReport::default();

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    run.cancel();
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(RenderError::Worker(e.to_string()));
                }
            };

            match outcome {
                Ok((clip, reused)) => {
                    if reused {
                        report.reused += 1;
                    }
                    report.clips.push(clip);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(segment = index, "Skipping segment: {e}");
                    report.skipped.push(SkippedSegment {
                        index,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(segment = index, "Aborting render: {e}");
                    run.cancel();
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        report.clips.sort_by_key(|c| c.index);
        report.skipped.sort_by_key(|s| s.index);

        info!(
            rendered = report.clips.len() - report.reused,
            reused = report.reused,
            skipped = report.skipped.len(),
            "Render phase complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ffmpeg::fake::RecordingRunner;
    use crate::render::ffmpeg::{FfmpegFailure, FfmpegRunner};
    use crate::render::task::{OperationHandle, OperationStatus};
    use crate::render::{ConcatManifest, VideoSettings};
    use crate::timeline::{SegmentKind, TimestampedWord};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    fn timeline() -> Timeline {
        let mut lyric = Segment::line(TimestampedWord::new("hello", 2.5, 3.5));
        lyric.text = "hello".into();
        Timeline::from_segments(
            vec![
                Segment::instrumental(SegmentKind::Intro, 0.0, 2.5),
                lyric,
                Segment::instrumental(SegmentKind::Bridge, 3.5, 6.0),
                Segment::instrumental(SegmentKind::Outro, 6.0, 9.0),
            ],
            Some(9.0),
            0.0,
        )
        .unwrap()
    }

    fn settings(workers: usize) -> RenderSettings {
        RenderSettings {
            workers,
            ..RenderSettings::default()
        }
    }

    fn pool_with(runner: Arc<dyn FfmpegRunner>, root: &Path, settings: &RenderSettings) -> RenderPool {
        let renderer = SceneRenderer::new(runner, VideoSettings::default());
        RenderPool::new(renderer, AssetLayout::new(root.join("assets")), settings)
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"asset").unwrap();
    }

    fn stock_assets(root: &Path, indices: &[usize]) {
        let layout = AssetLayout::new(root.join("assets"));
        for &i in indices {
            touch(&layout.scene_image(i));
        }
    }

    #[tokio::test]
    async fn test_renders_every_segment_in_order() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        let runner = Arc::new(RecordingRunner::default());
        let pool = pool_with(runner.clone(), dir.path(), &settings(3));

        let report = pool
            .render_timeline(&timeline(), &CancellationToken::new())
            .await
            .unwrap();

        let indices: Vec<_> = report.clips.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(report.skipped.is_empty());
        assert_eq!(runner.calls().len(), 4);
        assert!((report.clip_duration() - 9.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_asset_skips_segment() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 3]);
        let pool = pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2));

        let report = pool
            .render_timeline(&timeline(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.clips.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 2);
        assert!(report.skipped[0].reason.contains("scene_002.png"));
        // The skipped bridge contributes nothing
        assert!((report.clip_duration() - 6.5).abs() < 1e-9);
    }

    async fn render(pool: &RenderPool, timeline: &Timeline) -> RenderReport {
        pool.render_timeline(timeline, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_existing_clips_reused_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        render(&pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2)), &timeline()).await;

        let runner = Arc::new(RecordingRunner::default());
        let report = render(&pool_with(runner.clone(), dir.path(), &settings(2)), &timeline()).await;
        assert_eq!(report.reused, 4);
        assert_eq!(report.clips.len(), 4);
        assert!(runner.calls().is_empty());

        let forced = RenderSettings {
            force: true,
            ..settings(2)
        };
        let runner = Arc::new(RecordingRunner::default());
        let report = render(&pool_with(runner.clone(), dir.path(), &forced), &timeline()).await;
        assert_eq!(report.reused, 0);
        assert_eq!(runner.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_clip_without_key_is_rendered_again() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        let layout = AssetLayout::new(dir.path().join("assets"));
        touch(&layout.clip(1));

        let runner = Arc::new(RecordingRunner::default());
        let report = render(&pool_with(runner.clone(), dir.path(), &settings(2)), &timeline()).await;

        assert_eq!(report.reused, 0);
        assert_eq!(runner.calls().len(), 4);
        assert_eq!(std::fs::read(layout.clip(1)).unwrap(), b"clip");
        assert!(layout.clip_key(1).is_file());
    }

    #[tokio::test]
    async fn test_moved_boundary_renders_affected_segments() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        render(&pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2)), &timeline()).await;

        let mut lyric = Segment::line(TimestampedWord::new("hello", 2.5, 4.0));
        lyric.text = "hello".into();
        let moved = Timeline::from_segments(
            vec![
                Segment::instrumental(SegmentKind::Intro, 0.0, 2.5),
                lyric,
                Segment::instrumental(SegmentKind::Bridge, 4.0, 6.0),
                Segment::instrumental(SegmentKind::Outro, 6.0, 9.0),
            ],
            Some(9.0),
            0.0,
        )
        .unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let report = render(&pool_with(runner.clone(), dir.path(), &settings(2)), &moved).await;

        assert_eq!(report.reused, 2);
        assert_eq!(runner.calls().len(), 2);
        let durations: Vec<_> = report.clips.iter().map(|c| c.duration).collect();
        assert_eq!(durations, vec![2.5, 1.5, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_replaced_asset_renders_again() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        render(&pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2)), &timeline()).await;

        let layout = AssetLayout::new(dir.path().join("assets"));
        std::fs::write(layout.scene_image(2), b"a brand new picture").unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let report = render(&pool_with(runner.clone(), dir.path(), &settings(2)), &timeline()).await;

        assert_eq!(report.reused, 3);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].iter().any(|a| a.ends_with("scene_002.png")));
    }

    #[tokio::test]
    async fn test_encoding_change_renders_everything() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        render(&pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2)), &timeline()).await;

        let runner = Arc::new(RecordingRunner::default());
        let renderer = SceneRenderer::new(
            runner.clone(),
            VideoSettings {
                fps: 24,
                ..VideoSettings::default()
            },
        );
        let pool = RenderPool::new(renderer, AssetLayout::new(dir.path().join("assets")), &settings(2));
        let report = render(&pool, &timeline()).await;

        assert_eq!(report.reused, 0);
        assert_eq!(runner.calls().len(), 4);
        assert!(report.clips.iter().all(|c| c.fps == 24));
    }

    /// Writes part of the clip, then dies on one segment
    struct TruncatingRunner {
        inner: RecordingRunner,
        victim: &'static str,
    }

    #[async_trait]
    impl FfmpegRunner for TruncatingRunner {
        async fn run(&self, args: &[String]) -> std::result::Result<(), FfmpegFailure> {
            if args.iter().any(|a| a.contains(self.victim)) {
                if let Some(output) = args.last() {
                    std::fs::write(output, b"trunc").unwrap();
                }
                return Err(FfmpegFailure("killed".into()));
            }
            self.inner.run(args).await
        }

        async fn probe_duration(&self, path: &Path) -> std::result::Result<f64, FfmpegFailure> {
            self.inner.probe_duration(path).await
        }

        async fn check_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_failed_encode_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        let layout = AssetLayout::new(dir.path().join("assets"));
        let failing = TruncatingRunner {
            inner: RecordingRunner::default(),
            victim: "scene_001",
        };

        let err = pool_with(Arc::new(failing), dir.path(), &settings(1))
            .render_timeline(&timeline(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Encode { index: 1, .. }));
        assert!(!layout.clip(1).exists());
        assert!(!layout.clip_key(1).exists());

        let runner = Arc::new(RecordingRunner::default());
        render(&pool_with(runner.clone(), dir.path(), &settings(1)), &timeline()).await;

        assert!(runner
            .calls()
            .iter()
            .any(|call| call.iter().any(|a| a.ends_with("scene_001.png"))));
        assert_eq!(std::fs::read(layout.clip(1)).unwrap(), b"clip");
    }

    #[tokio::test]
    async fn test_encode_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        let pool = pool_with(
            Arc::new(RecordingRunner::failing_on("scene_001")),
            dir.path(),
            &settings(1),
        );
        let cancel = CancellationToken::new();

        let err = pool.render_timeline(&timeline(), &cancel).await.unwrap_err();

        assert!(matches!(err, RenderError::Encode { index: 1, .. }));
        // Only the pool's own token is cancelled
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        let pool = pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pool.render_timeline(&timeline(), &cancel).await.unwrap_err();
        assert!(matches!(err, RenderError::Cancelled));
    }

    /// Starts writing its output and never finishes on its own
    struct StallingRunner;

    #[async_trait]
    impl FfmpegRunner for StallingRunner {
        async fn run(&self, args: &[String]) -> std::result::Result<(), FfmpegFailure> {
            if let Some(output) = args.last() {
                std::fs::write(output, b"trunc").unwrap();
            }
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn probe_duration(&self, _path: &Path) -> std::result::Result<f64, FfmpegFailure> {
            Err(FfmpegFailure("unused".into()))
        }

        async fn check_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_cancel_during_encode_leaves_no_clips() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 2, 3]);
        let pool = pool_with(Arc::new(StallingRunner), dir.path(), &settings(2));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = pool.render_timeline(&timeline(), &cancel).await.unwrap_err();

        assert!(matches!(err, RenderError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(30));

        let clips_dir = AssetLayout::new(dir.path().join("assets")).clips_dir();
        let finished: Vec<_> = std::fs::read_dir(clips_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| !name.contains(".partial."))
            .collect();
        assert!(finished.is_empty(), "{finished:?}");
    }

    /// Finishes later clips first
    struct ReverseRunner(RecordingRunner);

    #[async_trait]
    impl FfmpegRunner for ReverseRunner {
        async fn run(&self, args: &[String]) -> std::result::Result<(), FfmpegFailure> {
            let output = args.last().cloned().unwrap_or_default();
            let index: u64 = output
                .rsplit("clip_")
                .next()
                .and_then(|s| s.trim_end_matches(".partial.mp4").parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(40 - index * 10)).await;
            self.0.run(args).await
        }

        async fn probe_duration(&self, path: &Path) -> std::result::Result<f64, FfmpegFailure> {
            self.0.probe_duration(path).await
        }

        async fn check_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_manifest_same_for_reverse_completion() {
        let forward_dir = tempfile::tempdir().unwrap();
        stock_assets(forward_dir.path(), &[0, 1, 2, 3]);
        let forward = pool_with(Arc::new(RecordingRunner::default()), forward_dir.path(), &settings(1))
            .render_timeline(&timeline(), &CancellationToken::new())
            .await
            .unwrap();

        let reverse_dir = tempfile::tempdir().unwrap();
        stock_assets(reverse_dir.path(), &[0, 1, 2, 3]);
        let reverse = pool_with(
            Arc::new(ReverseRunner(RecordingRunner::default())),
            reverse_dir.path(),
            &settings(4),
        )
        .render_timeline(&timeline(), &CancellationToken::new())
        .await
        .unwrap();

        let a = ConcatManifest::from_clips(
            &forward.clips,
            &AssetLayout::new(forward_dir.path().join("assets")).clips_dir(),
        )
        .unwrap()
        .render();
        let b = ConcatManifest::from_clips(
            &reverse.clips,
            &AssetLayout::new(reverse_dir.path().join("assets")).clips_dir(),
        )
        .unwrap()
        .render();
        assert_eq!(a, b);
    }

    /// Generator that writes the requested file immediately, or never finishes
    struct InstantGenerator {
        hang: bool,
    }

    #[async_trait]
    impl AssetGenerator for InstantGenerator {
        async fn submit(&self, request: &AssetRequest) -> Result<OperationHandle> {
            if !self.hang {
                touch(&request.output);
            }
            Ok(OperationHandle(request.output.to_string_lossy().to_string()))
        }

        async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus> {
            if self.hang {
                Ok(OperationStatus::Pending)
            } else {
                Ok(OperationStatus::Done(PathBuf::from(&handle.0)))
            }
        }

        async fn cancel(&self, _handle: &OperationHandle) {}
    }

    #[tokio::test]
    async fn test_generator_fills_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 3]);
        let pool = pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2))
            .with_generator(Arc::new(InstantGenerator { hang: false }), AssetKind::Video);

        let report = pool
            .render_timeline(&timeline(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.clips.len(), 4);
        assert!(pool.layout().scene_video(2).is_file());
    }

    #[tokio::test]
    async fn test_generator_timeout_skips_segment() {
        let dir = tempfile::tempdir().unwrap();
        stock_assets(dir.path(), &[0, 1, 3]);
        let pool = pool_with(Arc::new(RecordingRunner::default()), dir.path(), &settings(2))
            .with_generator(Arc::new(InstantGenerator { hang: true }), AssetKind::Still)
            .with_poll_policy(PollPolicy {
                interval: Duration::from_millis(5),
                timeout: Duration::from_millis(30),
            });

        let report = pool
            .render_timeline(&timeline(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.clips.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("timed out"));
    }
}
