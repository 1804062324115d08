//! Long-running asset generation as a cancellable, deadline-bound task
//!
//! Generators follow a submit/poll/cancel protocol. [`await_asset`] drives
//! one operation to completion, giving up at the deadline or when the run is
//! cancelled, so a stuck generator costs one segment and never hangs the pool.

use super::assets::AssetKind;
use super::{RenderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What to generate for a segment
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    pub index: usize,
    pub prompt: String,
    /// Seconds of footage the scene needs
    pub duration: f64,
    pub output: PathBuf,
}

/// Opaque id of a submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done(PathBuf),
    Failed(String),
}

/// External asset generator
#[async_trait]
pub trait AssetGenerator: Send + Sync {
    async fn submit(&self, request: &AssetRequest) -> Result<OperationHandle>;

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus>;

    /// Best effort; the operation may already be finished
    async fn cancel(&self, handle: &OperationHandle);
}

/// Polling cadence and deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Submit `request` and poll it until it finishes, times out, or `cancel` fires
pub async fn await_asset(
    generator: &dyn AssetGenerator,
    request: &AssetRequest,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let index = request.index;
    let handle = generator.submit(request).await?;
    let deadline = Instant::now() + policy.timeout;
    debug!(segment = index, handle = %handle.0, "Submitted asset generation");

    loop {
        match generator.poll(&handle).await? {
            OperationStatus::Done(path) => {
                debug!(segment = index, path = %path.display(), "Asset ready");
                return Ok(path);
            }
            OperationStatus::Failed(reason) => {
                return Err(RenderError::AssetFailed { index, reason });
            }
            OperationStatus::Pending => {}
        }

        let now = Instant::now();
        if now >= deadline {
            generator.cancel(&handle).await;
            return Err(RenderError::AssetTimeout {
                index,
                after: policy.timeout,
            });
        }

        let wait = policy.interval.min(deadline - now);
        tokio::select! {
            () = cancel.cancelled() => {
                generator.cancel(&handle).await;
                return Err(RenderError::Cancelled);
            }
            () = tokio::time::sleep(wait) => {}
        }
    }
}

/// External command used to generate scene assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub program: String,
    /// Argument template; `{prompt}`, `{output}`, `{duration}` and `{index}` are substituted
    #[serde(default)]
    pub args: Vec<String>,
    /// Produce videos instead of stills
    #[serde(default)]
    pub video: bool,
}

impl GeneratorSettings {
    #[must_use]
    pub fn output_kind(&self) -> AssetKind {
        if self.video {
            AssetKind::Video
        } else {
            AssetKind::Still
        }
    }

    fn expand(&self, request: &AssetRequest) -> Vec<String> {
        let output = request.output.to_string_lossy();
        let duration = format!("{:.3}", request.duration);
        let index = request.index.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{prompt}", &request.prompt)
                    .replace("{output}", &output)
                    .replace("{duration}", &duration)
                    .replace("{index}", &index)
            })
            .collect()
    }
}

/// Runs one external process per asset; the process exiting is completion
pub struct CommandAssetGenerator {
    settings: GeneratorSettings,
    running: Mutex<HashMap<OperationHandle, (Child, PathBuf)>>,
}

impl CommandAssetGenerator {
    #[must_use]
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }
}

#[async_trait]
impl AssetGenerator for CommandAssetGenerator {
    async fn submit(&self, request: &AssetRequest) -> Result<OperationHandle> {
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let child = Command::new(&self.settings.program)
            .args(self.settings.expand(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::AssetFailed {
                index: request.index,
                reason: format!("failed to spawn {}: {e}", self.settings.program),
            })?;

        let handle = OperationHandle(format!("segment-{:03}", request.index));
        self.running
            .lock()
            .await
            .insert(handle.clone(), (child, request.output.clone()));
        Ok(handle)
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let mut running = self.running.lock().await;
        let Some((child, _)) = running.get_mut(handle) else {
            return Ok(OperationStatus::Failed(format!("unknown operation {}", handle.0)));
        };

        let Some(status) = child.try_wait()? else {
            return Ok(OperationStatus::Pending);
        };

        let (_, output) = running
            .remove(handle)
            .ok_or_else(|| RenderError::Worker(format!("operation {} vanished", handle.0)))?;

        if !status.success() {
            return Ok(OperationStatus::Failed(format!(
                "{} exited with status: {status}",
                self.settings.program
            )));
        }
        if !output.is_file() {
            return Ok(OperationStatus::Failed(format!(
                "{} succeeded but wrote no {}",
                self.settings.program,
                output.display()
            )));
        }
        Ok(OperationStatus::Done(output))
    }

    async fn cancel(&self, handle: &OperationHandle) {
        let entry = self.running.lock().await.remove(handle);
        if let Some((mut child, _)) = entry {
            if let Err(e) = child.kill().await {
                warn!(handle = %handle.0, "Failed to stop asset generator: {e}");
            }
        }
    }
}
