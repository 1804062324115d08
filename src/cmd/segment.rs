use std::path::Path;

use anyhow::Result;

use rhymesync::{Config, Pipeline, SegmentKind};

pub async fn cmd_segment(
    config: Config,
    audio: &Path,
    words: Option<&Path>,
    duration: Option<f64>,
    run_id: Option<&str>,
) -> Result<()> {
    let paths = super::new_run(&config, audio, run_id);
    let pipeline = Pipeline::new(config);

    eprintln!("🎵 Segmenting: {}", audio.display());
    eprintln!("   Run: {}", paths.root().display());

    let duration = pipeline.audio_duration(audio, duration).await;
    match duration {
        Some(d) => eprintln!("   Duration: {d:.2}s"),
        None => eprintln!("   Duration: unknown (padding past the last word)"),
    }

    let timeline = pipeline.segment(&paths, words, duration).await?;

    for segment in &timeline {
        let marker = match segment.kind {
            SegmentKind::Lyrics => "🎤",
            SegmentKind::Intro | SegmentKind::Bridge | SegmentKind::Outro => "🎼",
        };
        eprintln!(
            "   {marker} {:>7.2} - {:>7.2}  {}",
            segment.start, segment.end, segment.text
        );
    }

    eprintln!(
        "\n✅ {} segments ({} sung lines, {:.2}s)",
        timeline.len(),
        timeline.lyrics().count(),
        timeline.total_duration()
    );
    eprintln!("   Timeline: {}", paths.segments().display());

    Ok(())
}
