use std::path::Path;

use anyhow::Result;

use rhymesync::timeline::Timeline;
use rhymesync::{CaptionFormat, Config, Pipeline, TimelineFormatter};

pub async fn cmd_captions(
    config: Config,
    audio: &Path,
    format: CaptionFormat,
    stdout: bool,
    run_id: Option<&str>,
) -> Result<()> {
    let paths = super::existing_run(&config, audio, run_id)?;

    if stdout {
        let timeline = Timeline::load(&paths.segments(), config.segmentation.tiling_epsilon).await?;
        print!("{}", TimelineFormatter::new(format).format(&timeline)?);
        return Ok(());
    }

    let pipeline = Pipeline::new(config);
    let (path, entries) = pipeline.captions(&paths, format).await?;
    eprintln!("📝 {entries} captions written to {}", path.display());

    Ok(())
}
