use std::path::Path;

use anyhow::Result;

use rhymesync::{Config, Pipeline};

pub async fn cmd_render(config: Config, audio: &Path, run_id: Option<&str>) -> Result<()> {
    let paths = super::existing_run(&config, audio, run_id)?;
    eprintln!("🎞️  Rendering clips: {}", paths.root().display());
    eprintln!(
        "   Workers: {}  Encoder: {}",
        config.render.workers, config.video.video_codec
    );

    let pipeline = Pipeline::new(config);
    let start = std::time::Instant::now();
    let report = pipeline.render(&paths, &super::cancel_on_ctrl_c()).await?;

    eprintln!(
        "\n✅ {} clips in {:.1}s ({} reused, {} skipped)",
        report.clips.len(),
        start.elapsed().as_secs_f64(),
        report.reused,
        report.skipped.len()
    );
    super::print_skipped(&report.skipped);
    eprintln!("   Clips: {}", paths.assets().clips_dir().display());

    Ok(())
}
