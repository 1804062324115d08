mod captions;
mod check;
mod compose;
mod render;
mod run;
mod segment;

pub use captions::cmd_captions;
pub use check::cmd_check;
pub use compose::cmd_compose;
pub use render::cmd_render;
pub use run::cmd_run;
pub use segment::cmd_segment;

use std::path::Path;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use rhymesync::{new_run_id, song_name, Config, RunPaths};

/// Run directory for a new run: the given id, or a fresh timestamp
fn new_run(config: &Config, audio: &Path, run_id: Option<&str>) -> RunPaths {
    let run_id = run_id.map_or_else(new_run_id, str::to_string);
    RunPaths::new(&config.project.output_dir, &song_name(audio), &run_id)
}

/// Run directory of an earlier run: the given id, or the latest one
fn existing_run(config: &Config, audio: &Path, run_id: Option<&str>) -> Result<RunPaths> {
    let song = song_name(audio);
    let output_dir = &config.project.output_dir;

    let paths = match run_id {
        Some(id) => RunPaths::new(output_dir, &song, id),
        None => match RunPaths::latest(output_dir, &song) {
            Some(paths) => paths,
            None => bail!(
                "no runs for '{song}' under {} (run `rhymesync segment` first)",
                output_dir.display()
            ),
        },
    };

    if !paths.root().is_dir() {
        bail!("run directory {} does not exist", paths.root().display());
    }
    Ok(paths)
}

/// Token cancelled on Ctrl-C, so in-flight encoders get killed
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling render");
            guard.cancel();
        }
    });
    token
}

fn print_skipped(skipped: &[rhymesync::render::SkippedSegment]) {
    for skip in skipped {
        eprintln!("   ⚠️  Segment {} skipped: {}", skip.index, skip.reason);
    }
}
