/*!
 * External media tooling.
 *
 * Duration probing, ffmpeg-based mixing and the replacement muxer. The
 * pipeline only sees the `DurationProbe`, `Mixer` and `Muxer` traits, so any
 * of these can be swapped for a library-based implementation.
 */

use async_trait::async_trait;
use log::debug;
use std::fmt::Debug;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::MuxError;

pub mod ffmpeg;
pub mod probe;

pub use self::ffmpeg::{FfmpegMixer, FfmpegMuxer};
pub use self::probe::{DurationProbe, FfprobeProbe};

/// Combines the original video stream with a new audio track
#[async_trait]
pub trait Muxer: Send + Sync + Debug {
    /// Write `output` with the video of `video` and the audio of `audio`
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError>;
}

/// Check that a muxed artifact exists and is larger than `min_bytes`.
///
/// Some backends report success while leaving an empty or near-empty file.
pub fn verify_artifact(path: &Path, min_bytes: u64) -> Result<u64, MuxError> {
    let metadata = std::fs::metadata(path).map_err(|_| MuxError::Missing(path.display().to_string()))?;
    let size = metadata.len();
    if size <= min_bytes {
        return Err(MuxError::Undersized { size, min: min_bytes });
    }
    Ok(size)
}

/// Why an external tool could not produce output
#[derive(Debug)]
pub enum ToolFailure {
    /// The process could not be started
    Spawn(std::io::Error),
    /// The process did not finish in time and was killed
    TimedOut,
}

/// Run an external tool with a timeout, capturing its output
pub async fn run_tool(program: &str, args: &[String], timeout: Duration) -> Result<Output, ToolFailure> {
    debug!("Running {} {}", program, args.join(" "));

    let future = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    tokio::select! {
        result = future => result.map_err(ToolFailure::Spawn),
        _ = tokio::time::sleep(timeout) => Err(ToolFailure::TimedOut),
    }
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "encoder",
        "handler_name",
        "vendor_id",
        "major_brand",
        "minor_version",
        "compatible_brands",
        "creation_time",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
