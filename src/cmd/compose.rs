use std::path::Path;

use anyhow::Result;

use rhymesync::{Config, Pipeline, PipelineResult};

pub async fn cmd_compose(
    config: Config,
    audio: &Path,
    duration: Option<f64>,
    run_id: Option<&str>,
) -> Result<()> {
    let paths = super::existing_run(&config, audio, run_id)?;
    eprintln!("🎬 Composing: {}", audio.display());
    eprintln!("   Run: {}", paths.root().display());

    let pipeline = Pipeline::new(config);
    let result = pipeline
        .compose(&paths, audio, duration, &super::cancel_on_ctrl_c())
        .await?;

    print_result(&result);
    Ok(())
}

pub(super) fn print_result(result: &PipelineResult) {
    eprintln!(
        "\n✅ Video complete in {:.1}s",
        result.processing_time_secs
    );
    eprintln!("   Output: {}", result.output_path.display());
    eprintln!("   Duration: {:.2}s", result.duration);
    eprintln!(
        "   Clips: {} rendered, {} reused, {} skipped of {} segments",
        result.clips_rendered,
        result.clips_reused,
        result.skipped.len(),
        result.segments
    );
    super::print_skipped(&result.skipped);
    eprintln!("   Captions: {}", result.captions_path.display());
}
