//! ffmpeg/ffprobe process layer
//!
//! Everything above this module builds argument vectors; only
//! [`SystemFfmpeg`] spawns processes, so tests swap in a recording runner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Lines of stderr kept for the failure diagnostic
const DIAGNOSTIC_LINES: usize = 8;

/// Failure reported by an external ffmpeg/ffprobe invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FfmpegFailure(pub String);

/// Binary locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: find_binary("ffmpeg"),
            ffprobe_path: find_binary("ffprobe"),
        }
    }
}

fn find_binary(name: &str) -> String {
    which::which(name).map_or_else(|_| name.to_string(), |p| p.to_string_lossy().to_string())
}

/// Runs ffmpeg and ffprobe
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    /// Run ffmpeg with the given arguments to completion
    async fn run(&self, args: &[String]) -> Result<(), FfmpegFailure>;

    /// Container duration in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64, FfmpegFailure>;

    /// Check that the binaries can be executed
    async fn check_available(&self) -> bool;
}

/// Runner backed by the system ffmpeg binaries
#[derive(Debug, Clone, Default)]
pub struct SystemFfmpeg {
    settings: FfmpegSettings,
}

impl SystemFfmpeg {
    #[must_use]
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &FfmpegSettings {
        &self.settings
    }

    /// True if `binary -version` runs successfully
    pub async fn tool_available(binary: &str) -> bool {
        Command::new(binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl FfmpegRunner for SystemFfmpeg {
    async fn run(&self, args: &[String]) -> Result<(), FfmpegFailure> {
        debug!(args = %args.join(" "), "Running ffmpeg");

        // Dropping the future (pool abort) kills the encoder
        let mut child = Command::new(&self.settings.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                FfmpegFailure(format!(
                    "failed to spawn {}: {e}",
                    self.settings.ffmpeg_path
                ))
            })?;

        let mut diagnostic: Vec<String> = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let lower = line.to_ascii_lowercase();
                if lower.contains("error") || lower.contains("warning") {
                    warn!("ffmpeg: {}", line);
                } else {
                    debug!("ffmpeg: {}", line);
                }
                if !line.trim().is_empty() {
                    if diagnostic.len() == DIAGNOSTIC_LINES {
                        diagnostic.remove(0);
                    }
                    diagnostic.push(line);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FfmpegFailure(format!("failed to wait for ffmpeg: {e}")))?;

        if status.success() {
            Ok(())
        } else if diagnostic.is_empty() {
            Err(FfmpegFailure(format!("ffmpeg exited with status: {status}")))
        } else {
            Err(FfmpegFailure(format!(
                "ffmpeg exited with status: {status}\n{}",
                diagnostic.join("\n")
            )))
        }
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, FfmpegFailure> {
        let output = Command::new(&self.settings.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                FfmpegFailure(format!(
                    "failed to spawn {}: {e}",
                    self.settings.ffprobe_path
                ))
            })?;

        if !output.status.success() {
            return Err(FfmpegFailure(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn check_available(&self) -> bool {
        Self::tool_available(&self.settings.ffmpeg_path).await
            && Self::tool_available(&self.settings.ffprobe_path).await
    }
}

/// Parse ffprobe's bare `format=duration` output
pub(crate) fn parse_duration(stdout: &str) -> Result<f64, FfmpegFailure> {
    let value = stdout.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| FfmpegFailure(format!("unusable duration from ffprobe: '{value}'")))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording runner for tests

    use super::{FfmpegFailure, FfmpegRunner};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingRunner {
        pub calls: Mutex<Vec<Vec<String>>>,
        /// Fail any call whose arguments contain this substring
        pub fail_on: Option<String>,
        pub duration: Option<f64>,
    }

    impl RecordingRunner {
        pub(crate) fn failing_on(pattern: &str) -> Self {
            Self {
                fail_on: Some(pattern.to_string()),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FfmpegRunner for RecordingRunner {
        async fn run(&self, args: &[String]) -> Result<(), FfmpegFailure> {
            self.calls.lock().unwrap().push(args.to_vec());
            if let Some(pattern) = &self.fail_on {
                if args.iter().any(|a| a.contains(pattern.as_str())) {
                    return Err(FfmpegFailure(format!("Error: simulated failure on {pattern}")));
                }
            }
            // Output path is always last; leave a file there like ffmpeg would
            if let Some(output) = args.last() {
                tokio::fs::write(output, b"clip").await.map_err(|e| FfmpegFailure(e.to_string()))?;
            }
            Ok(())
        }

        async fn probe_duration(&self, path: &Path) -> Result<f64, FfmpegFailure> {
            self.duration
                .ok_or_else(|| FfmpegFailure(format!("no duration for {}", path.display())))
        }

        async fn check_available(&self) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert!((parse_duration("183.456000\n").unwrap() - 183.456).abs() < 1e-9);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0.0").is_err());
    }

    #[test]
    fn test_settings_fall_back_to_bare_name() {
        let settings = FfmpegSettings::default();
        assert!(settings.ffmpeg_path.contains("ffmpeg"));
        assert!(settings.ffprobe_path.contains("ffprobe"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_failure() {
        let runner = SystemFfmpeg::new(FfmpegSettings {
            ffmpeg_path: "/nonexistent/ffmpeg-missing".into(),
            ffprobe_path: "/nonexistent/ffprobe-missing".into(),
        });
        assert!(!runner.check_available().await);
        let err = runner.run(&["-version".to_string()]).await.unwrap_err();
        assert!(err.0.contains("failed to spawn"));
        assert!(runner.probe_duration(Path::new("song.mp3")).await.is_err());
    }
}
