//! Configuration loaded from `~/.config/rhymesync/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::render::{FfmpegSettings, GeneratorSettings, RenderSettings, VideoSettings};
use crate::timeline::SegmentThresholds;

/// Effective configuration for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectSettings,
    pub segmentation: SegmentThresholds,
    pub video: VideoSettings,
    pub render: RenderSettings,
    pub ffmpeg: FfmpegSettings,
    /// External asset generator; missing visuals are skipped when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorSettings>,
}

/// Where runs are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub output_dir: PathBuf,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; an explicitly named file
    /// must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// segmentation thresholds are invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config
            .segmentation
            .validate()
            .context("invalid [segmentation] settings")?;

        // A configured accelerator selects its encoder
        if let Some(accel) = config.video.hwaccel.clone() {
            config.video = config.video.with_hwaccel(&accel);
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Snapshot stored beside each run.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }
}

/// Return the path to the default config file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rhymesync")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.segmentation, SegmentThresholds::default());
        assert_eq!(config.video.width, 1080);
        assert_eq!(config.video.height, 1920);
        assert_eq!(config.video.fps, 30);
        assert_eq!(config.render.asset_timeout_secs, 600);
        assert!(config.generator.is_none());
    }

    #[test]
    fn parse_partial_sections() {
        let toml_str = r#"
[project]
output_dir = "/tmp/videos"

[segmentation]
line_gap = 0.8
bridge_gap = 3.0

[video]
fps = 24
audio_bitrate = "192k"

[render]
workers = 2
force = true

[generator]
program = "imagegen"
args = ["--prompt", "{prompt}", "--out", "{output}"]
"#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.project.output_dir, PathBuf::from("/tmp/videos"));
        assert!((config.segmentation.line_gap - 0.8).abs() < 1e-12);
        assert!((config.segmentation.bridge_gap - 3.0).abs() < 1e-12);
        assert!((config.segmentation.intro_gap - 2.0).abs() < 1e-12);
        assert_eq!(config.video.fps, 24);
        assert_eq!(config.video.width, 1080);
        assert_eq!(config.video.audio_bitrate.as_deref(), Some("192k"));
        assert_eq!(config.render.workers, 2);
        assert!(config.render.force);

        let generator = config.generator.unwrap();
        assert_eq!(generator.program, "imagegen");
        assert_eq!(generator.args.len(), 4);
        assert!(!generator.video);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut config = Config::default();
        config.video = config.video.with_hwaccel("vaapi");
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn invalid_thresholds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[segmentation]\nmax_line_duration = 0.0\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn hwaccel_selects_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video]\nhwaccel = \"qsv\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.video.video_codec, "h264_qsv");
    }

    #[test]
    fn malformed_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video\nfps = 30").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid TOML"));
    }
}
