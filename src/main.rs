//! `rhymesync` CLI - build lyric videos step by step

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rhymesync::{CaptionFormat, Config};

#[derive(Parser)]
#[command(name = "rhymesync")]
#[command(about = "Compose lyric videos from a song and its word timings")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/rhymesync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that holds all runs
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Debug logging (`RUST_LOG` takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the scene timeline from word timings
    Segment {
        /// Song audio file
        audio: PathBuf,

        /// Aligned words JSON (default: the run's timestamps.json)
        #[arg(short, long)]
        words: Option<PathBuf>,

        /// Audio duration in seconds (skips ffprobe)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Run identifier (default: current timestamp)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Render one clip per segment
    Render {
        /// Song audio file
        audio: PathBuf,

        /// Run identifier (default: latest run)
        #[arg(long)]
        run_id: Option<String>,

        #[command(flatten)]
        render: RenderOpts,
    },

    /// Render clips, join them with the audio and write captions
    Compose {
        /// Song audio file
        audio: PathBuf,

        /// Audio duration in seconds (skips ffprobe)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Run identifier (default: latest run)
        #[arg(long)]
        run_id: Option<String>,

        #[command(flatten)]
        render: RenderOpts,
    },

    /// Export captions for the sung lines
    Captions {
        /// Song audio file
        audio: PathBuf,

        /// Caption format
        #[arg(short, long, value_enum, default_value = "srt")]
        format: CaptionFormatArg,

        /// Print to stdout instead of writing into the run directory
        #[arg(long)]
        stdout: bool,

        /// Run identifier (default: latest run)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Segment, render, compose and caption in one go
    Run {
        /// Song audio file
        audio: PathBuf,

        /// Aligned words JSON
        #[arg(short, long)]
        words: PathBuf,

        /// Audio duration in seconds (skips ffprobe)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Run identifier (default: current timestamp)
        #[arg(long)]
        run_id: Option<String>,

        #[command(flatten)]
        render: RenderOpts,
    },

    /// Check that ffmpeg, ffprobe and the asset generator are available
    Check,
}

/// Render overrides shared by the rendering commands
#[derive(Args, Clone, Debug, Default)]
pub struct RenderOpts {
    /// Parallel render workers
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Re-render clips that already exist
    #[arg(long)]
    pub force: bool,

    /// Hardware encoder (videotoolbox, nvenc, vaapi, qsv)
    #[arg(long)]
    pub hwaccel: Option<String>,
}

impl RenderOpts {
    fn apply(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.render.workers = workers.max(1);
        }
        if self.force {
            config.render.force = true;
        }
        if let Some(accel) = &self.hwaccel {
            config.video = config.video.clone().with_hwaccel(accel);
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CaptionFormatArg {
    Srt,
    Vtt,
}

impl From<CaptionFormatArg> for CaptionFormat {
    fn from(arg: CaptionFormatArg) -> Self {
        match arg {
            CaptionFormatArg::Srt => Self::Srt,
            CaptionFormatArg::Vtt => Self::Vtt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.project.output_dir = dir;
    }

    match cli.command {
        Commands::Segment {
            audio,
            words,
            duration,
            run_id,
        } => {
            cmd::cmd_segment(config, &audio, words.as_deref(), duration, run_id.as_deref()).await?;
        }
        Commands::Render {
            audio,
            run_id,
            render,
        } => {
            render.apply(&mut config);
            cmd::cmd_render(config, &audio, run_id.as_deref()).await?;
        }
        Commands::Compose {
            audio,
            duration,
            run_id,
            render,
        } => {
            render.apply(&mut config);
            cmd::cmd_compose(config, &audio, duration, run_id.as_deref()).await?;
        }
        Commands::Captions {
            audio,
            format,
            stdout,
            run_id,
        } => {
            cmd::cmd_captions(config, &audio, format.into(), stdout, run_id.as_deref()).await?;
        }
        Commands::Run {
            audio,
            words,
            duration,
            run_id,
            render,
        } => {
            render.apply(&mut config);
            cmd::cmd_run(config, &audio, &words, duration, run_id.as_deref()).await?;
        }
        Commands::Check => {
            cmd::cmd_check(config).await?;
        }
    }

    Ok(())
}
