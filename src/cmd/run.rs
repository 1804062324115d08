use std::path::Path;

use anyhow::Result;

use rhymesync::{Config, Pipeline};

pub async fn cmd_run(
    config: Config,
    audio: &Path,
    words: &Path,
    duration: Option<f64>,
    run_id: Option<&str>,
) -> Result<()> {
    let paths = super::new_run(&config, audio, run_id);
    eprintln!("🎵 Lyric video: {}", audio.display());
    eprintln!("   Words: {}", words.display());
    eprintln!("   Run: {}", paths.root().display());

    let pipeline = Pipeline::new(config);
    let result = pipeline
        .run(
            &paths,
            audio,
            Some(words),
            duration,
            &super::cancel_on_ctrl_c(),
        )
        .await?;

    super::compose::print_result(&result);
    Ok(())
}
