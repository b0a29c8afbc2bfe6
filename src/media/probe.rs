use async_trait::async_trait;
use log::warn;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use super::{run_tool, ToolFailure};

/// Reports the duration of a media container
#[async_trait]
pub trait DurationProbe: Send + Sync + Debug {
    /// Duration in seconds, or `None` when it cannot be determined
    async fn probe_duration(&self, path: &Path) -> Option<f64>;
}

/// ffprobe-backed duration probe
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    /// Parse `format=duration` output; `N/A`, non-positive or non-finite values are unknown
    pub fn parse_duration(stdout: &str) -> Option<f64> {
        let value: f64 = stdout.lines().next()?.trim().parse().ok()?;
        (value.is_finite() && value > 0.0).then_some(value)
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().into_owned(),
        ];

        let output = match run_tool(&self.ffprobe_path, &args, self.timeout).await {
            Ok(output) => output,
            Err(ToolFailure::Spawn(e)) => {
                warn!("Failed to execute ffprobe: {}", e);
                return None;
            }
            Err(ToolFailure::TimedOut) => {
                warn!("ffprobe timed out after {} seconds", self.timeout.as_secs());
                return None;
            }
        };

        if !output.status.success() {
            warn!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr).trim());
            return None;
        }

        Self::parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}
