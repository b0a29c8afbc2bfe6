/*!
 * Timeline compositing.
 *
 * The compositor turns a `Timeline` (a fixed total duration plus one clip per
 * cue) into a `MixPlan`: which clips are placed, at which offset, and for how
 * long. A `Mixer` then renders the plan onto a silent base track.
 *
 * Placement rules:
 * - clips with empty samples are silent placeholders and are never placed
 * - clips whose cue starts at or after the total duration are dropped
 * - overlays are never truncated at the total duration; the rendered track
 *   runs to the end of the latest overlay when that is longer than the base
 * - overlapping cues are handled by the configured `OverlapPolicy`
 *
 * Everything here works in seconds. Conversion to sample frames happens in
 * the mixers only.
 */

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{OverlapPolicy, TimelineConfig};
use crate::errors::CompositeError;
use crate::subtitle_processor::Cue;
use crate::voice::VoiceProfile;

pub mod pcm;

pub use self::pcm::PcmMixer;

/// Synthesized speech for one cue
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Encoded audio, empty when synthesis failed or was skipped
    pub samples: Bytes,
    /// Cue the clip was synthesized for
    pub cue: Cue,
    /// Voice the clip was synthesized with
    pub profile: VoiceProfile,
}

impl AudioClip {
    pub fn new(samples: Bytes, cue: Cue, profile: VoiceProfile) -> Self {
        Self { samples, cue, profile }
    }

    /// Placeholder that renders as silence over the cue's time range
    pub fn silent(cue: Cue, profile: VoiceProfile) -> Self {
        Self::new(Bytes::new(), cue, profile)
    }

    pub fn is_silent(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Clips positioned against a fixed total duration
#[derive(Debug, Clone)]
pub struct Timeline {
    total_duration: f64,
    clips: Vec<AudioClip>,
}

impl Timeline {
    pub fn new(total_duration: f64, clips: Vec<AudioClip>) -> Self {
        Self { total_duration, clips }
    }

    /// Duration of the base track in seconds
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn clips(&self) -> &[AudioClip] {
        &self.clips
    }
}

/// Sample layout of the rendered track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for TrackFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

impl TrackFormat {
    /// Convert seconds to a whole number of frames
    pub fn frames_for(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }

    pub fn seconds_for(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// ffmpeg channel layout name
    pub fn channel_layout(&self) -> &'static str {
        if self.channels == 1 { "mono" } else { "stereo" }
    }
}

/// One clip scheduled on the base track
#[derive(Debug, Clone)]
pub struct Placement {
    /// Index of the cue the clip belongs to
    pub cue_index: usize,
    /// Delay from the start of the base track in seconds
    pub offset: f64,
    /// Cut the clip after this many seconds, if set
    pub max_duration: Option<f64>,
    /// Encoded audio
    pub samples: Bytes,
}

/// Rendering instructions for a mixer
#[derive(Debug, Clone)]
pub struct MixPlan {
    /// Length of the silent base track in seconds
    pub total_duration: f64,
    /// Output sample layout
    pub format: TrackFormat,
    /// Overlays ordered by offset
    pub placements: Vec<Placement>,
    /// Clips with empty samples
    pub silent: usize,
    /// Clips starting at or after the total duration
    pub beyond_end: usize,
    /// Clips removed by the overlap policy
    pub overlap_dropped: usize,
}

/// The mixed track written into the job workspace
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTrack {
    pub path: PathBuf,
    /// Actual length in seconds, at least the base duration
    pub duration: f64,
}

/// Renders a `MixPlan` into an audio file
#[async_trait]
pub trait Mixer: Send + Sync + Debug {
    /// Render the plan into `work_dir`.
    ///
    /// Either the whole track is produced or an error is returned; a partial
    /// track must never be reported as success.
    async fn mix(&self, plan: &MixPlan, work_dir: &Path) -> Result<RenderedTrack, CompositeError>;
}

/// Places clips on the timeline and hands the result to a mixer
#[derive(Debug, Clone)]
pub struct Compositor {
    policy: OverlapPolicy,
    format: TrackFormat,
    mixer: Arc<dyn Mixer>,
}

impl Compositor {
    pub fn new(policy: OverlapPolicy, format: TrackFormat, mixer: Arc<dyn Mixer>) -> Self {
        Self { policy, format, mixer }
    }

    pub fn from_config(config: &TimelineConfig, mixer: Arc<dyn Mixer>) -> Self {
        let format = TrackFormat {
            sample_rate: config.sample_rate,
            channels: config.channels,
        };
        Self::new(config.overlap_policy, format, mixer)
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn format(&self) -> TrackFormat {
        self.format
    }

    /// Decide which clips are placed where
    pub fn plan(&self, timeline: &Timeline) -> MixPlan {
        let total = timeline.total_duration();
        let mut silent = 0;
        let mut beyond_end = 0;

        let mut candidates: Vec<&AudioClip> = Vec::with_capacity(timeline.clips().len());
        for clip in timeline.clips() {
            if clip.is_silent() {
                silent += 1;
                continue;
            }
            if clip.cue.start >= total {
                debug!(
                    "Dropping cue {} starting at {:.3}s, track ends at {:.3}s",
                    clip.cue.index, clip.cue.start, total
                );
                beyond_end += 1;
                continue;
            }
            candidates.push(clip);
        }

        // Stable, so equal starts keep their source order
        candidates.sort_by(|a, b| a.cue.start.total_cmp(&b.cue.start));

        let mut overlap_dropped = 0;
        let placements = match self.policy {
            OverlapPolicy::Additive => candidates.iter().map(|clip| Self::place(clip, None)).collect(),
            OverlapPolicy::LastWins => {
                let mut placements = Vec::with_capacity(candidates.len());
                for (i, clip) in candidates.iter().enumerate() {
                    let limit = candidates.get(i + 1).map(|next| next.cue.start - clip.cue.start);
                    match limit {
                        Some(limit) if limit <= 0.0 => {
                            debug!("Cue {} is fully replaced by cue {}", clip.cue.index, candidates[i + 1].cue.index);
                            overlap_dropped += 1;
                        }
                        _ => placements.push(Self::place(clip, limit)),
                    }
                }
                placements
            }
            OverlapPolicy::Reject => {
                let mut placements = Vec::with_capacity(candidates.len());
                let mut last_end = f64::NEG_INFINITY;
                for clip in &candidates {
                    if clip.cue.start < last_end {
                        warn!(
                            "Rejecting cue {} at {:.3}s, overlaps previous cue ending at {:.3}s",
                            clip.cue.index, clip.cue.start, last_end
                        );
                        overlap_dropped += 1;
                        continue;
                    }
                    last_end = clip.cue.end;
                    placements.push(Self::place(clip, None));
                }
                placements
            }
        };

        MixPlan {
            total_duration: total,
            format: self.format,
            placements,
            silent,
            beyond_end,
            overlap_dropped,
        }
    }

    fn place(clip: &AudioClip, max_duration: Option<f64>) -> Placement {
        Placement {
            cue_index: clip.cue.index,
            offset: clip.cue.start,
            max_duration,
            samples: clip.samples.clone(),
        }
    }

    /// Plan and render the timeline into `work_dir`
    pub async fn composite(&self, timeline: Timeline, work_dir: &Path) -> Result<RenderedTrack, CompositeError> {
        let plan = self.plan(&timeline);
        info!(
            "Compositing {} clip(s) onto {:.3}s base ({} silent, {} beyond end, {} dropped by {} policy)",
            plan.placements.len(),
            plan.total_duration,
            plan.silent,
            plan.beyond_end,
            plan.overlap_dropped,
            self.policy
        );
        drop(timeline);

        self.mixer.mix(&plan, work_dir).await
    }
}
