//! Per-segment asset addressing and resolution

use crate::timeline::Segment;
use std::path::{Path, PathBuf};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// How a visual asset is animated into a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Still image, animated with a slow zoom
    Still,
    /// Video, looped and trimmed to length
    Video,
}

impl AssetKind {
    /// Classify by file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                VIDEO_EXTENSIONS
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(ext))
            });
        if is_video {
            Self::Video
        } else {
            Self::Still
        }
    }
}

/// Resolved inputs for one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneAssets {
    pub visual: PathBuf,
    pub kind: AssetKind,
    pub overlay: Option<PathBuf>,
}

impl SceneAssets {
    #[must_use]
    pub fn new(visual: PathBuf, overlay: Option<PathBuf>) -> Self {
        let kind = AssetKind::from_path(&visual);
        Self {
            visual,
            kind,
            overlay,
        }
    }
}

/// Artifact-existence policy
pub trait ArtifactCheck: Send + Sync {
    fn is_present(&self, path: &Path) -> bool;
}

/// Looks at the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactCheck;

impl ArtifactCheck for FsArtifactCheck {
    fn is_present(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Treats every artifact as absent, forcing a re-render
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRender;

impl ArtifactCheck for AlwaysRender {
    fn is_present(&self, _path: &Path) -> bool {
        false
    }
}

/// Canonical per-index locations under a run's `assets/` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    #[must_use]
    pub fn text_dir(&self) -> PathBuf {
        self.root.join("text")
    }

    #[must_use]
    pub fn clips_dir(&self) -> PathBuf {
        self.root.join("clips")
    }

    #[must_use]
    pub fn scene_image(&self, index: usize) -> PathBuf {
        self.images_dir().join(format!("scene_{index:03}.png"))
    }

    #[must_use]
    pub fn scene_video(&self, index: usize) -> PathBuf {
        self.images_dir().join(format!("scene_{index:03}.mp4"))
    }

    #[must_use]
    pub fn overlay(&self, index: usize) -> PathBuf {
        self.text_dir().join(format!("text_{index:03}.png"))
    }

    #[must_use]
    pub fn clip(&self, index: usize) -> PathBuf {
        self.clips_dir().join(format!("clip_{index:03}.mp4"))
    }

    /// Identity of the inputs `clip(index)` was encoded from
    #[must_use]
    pub fn clip_key(&self, index: usize) -> PathBuf {
        self.clips_dir().join(format!("clip_{index:03}.json"))
    }

    #[must_use]
    pub fn manifest(&self) -> PathBuf {
        self.clips_dir().join("concat_list.txt")
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.images_dir(), self.text_dir(), self.clips_dir()] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Find the visual and overlay for a segment.
    ///
    /// An explicit `asset_path` wins; otherwise a generated video is
    /// preferred over a still. Relative explicit paths resolve against the
    /// run directory (the parent of the assets root).
    pub fn resolve(
        &self,
        index: usize,
        segment: &Segment,
        check: &dyn ArtifactCheck,
    ) -> Option<SceneAssets> {
        let explicit = segment
            .visual_asset
            .as_deref()
            .map(|p| self.anchor(p))
            .filter(|p| check.is_present(p));

        let visual = explicit.or_else(|| {
            [self.scene_video(index), self.scene_image(index)]
                .into_iter()
                .find(|p| check.is_present(p))
        })?;

        Some(SceneAssets::new(visual, self.resolve_overlay(index, segment, check)))
    }

    /// Explicit `text_img` if present, else the canonical overlay if present
    pub fn resolve_overlay(
        &self,
        index: usize,
        segment: &Segment,
        check: &dyn ArtifactCheck,
    ) -> Option<PathBuf> {
        segment
            .overlay_asset
            .as_deref()
            .map(|p| self.anchor(p))
            .filter(|p| check.is_present(p))
            .or_else(|| Some(self.overlay(index)).filter(|p| check.is_present(p)))
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.root.parent() {
            Some(run_dir) => run_dir.join(path),
            None => path.to_path_buf(),
        }
    }
}
