//! `rhymesync` - lyric video composer
//!
//! Turns a song and its word-aligned lyrics into a captioned music video:
//!
//! - **Segmentation**: word timings become a contiguous scene timeline
//!   (intro, sung lines, bridges, outro) that covers the whole song
//! - **Rendering**: each scene becomes a fixed-length clip from a still image
//!   (slow zoom) or a looping video asset, with an optional text overlay
//! - **Composition**: clips are joined in timeline order and muxed with the
//!   original audio
//! - **Captions**: sung lines exported as SRT or `WebVTT`
//!
//! # Example
//!
//! ```rust,no_run
//! use rhymesync::{Config, Pipeline, RunPaths};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(Config::load(None)?);
//!     let paths = RunPaths::new(Path::new("output"), "song", "take1");
//!     let result = pipeline
//!         .run(
//!             &paths,
//!             Path::new("song.mp3"),
//!             Some(Path::new("aligned.json")),
//!             None,
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!     println!("{} ({:.1}s)", result.output_path.display(), result.duration);
//!     Ok(())
//! }
//! ```

pub mod captions;
pub mod config;
pub mod pipeline;
pub mod render;
pub mod timeline;

pub use captions::{CaptionFormat, TimelineFormatter};
pub use config::Config;
pub use pipeline::{new_run_id, song_name, Pipeline, PipelineResult, RunPaths};
pub use render::{Composer, RenderError, RenderPool, SceneRenderer, VideoSettings};
pub use timeline::{Segment, SegmentBuilder, SegmentKind, SegmentThresholds, Timeline, TimelineError, TimestampedWord};

/// Version of rhymesync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
