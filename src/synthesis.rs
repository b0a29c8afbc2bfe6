/*!
 * Speech synthesis adapter.
 *
 * Wraps a `SpeechProvider` with the job-level rules: calls are spaced by a
 * shared rate limiter, each call has a timeout, the number of synthesized cues
 * per job is capped, and every failure becomes a silent clip instead of an
 * error.
 */

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use bytes::Bytes;

use crate::app_config::{SynthesisConfig, VoiceConfig};
use crate::errors::ProviderError;
use crate::language_utils;
use crate::providers::{SpeechProvider, SpeechRequest};
use crate::subtitle_processor::Cue;
use crate::timeline::pcm::decode_wav;
use crate::timeline::AudioClip;
use crate::voice::VoiceProfile;

/// Enforces a minimum spacing between calls, across all workers
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next call is allowed and reserve the slot after it
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            tokio::time::sleep_until(slot).await;
        }
        *next_slot = Some(Instant::now() + self.min_interval);
    }
}

/// Accept WAV that decodes fully, or a recognizable MP3, Ogg or FLAC stream
pub fn check_audio(bytes: &[u8]) -> Result<(), String> {
    if bytes.starts_with(b"RIFF") {
        return decode_wav(bytes).map(|_| ());
    }
    let compressed = bytes.starts_with(b"ID3")
        || bytes.starts_with(b"OggS")
        || bytes.starts_with(b"fLaC")
        || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0);
    if compressed {
        Ok(())
    } else {
        let head: String = String::from_utf8_lossy(&bytes[..bytes.len().min(16)])
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        Err(format!("unrecognized audio container ({} bytes, starts with {:?})", bytes.len(), head))
    }
}

/// Outcome of synthesizing every cue of a job
#[derive(Debug, Default)]
pub struct SynthesisReport {
    /// One clip per input cue, in input order
    pub clips: Vec<AudioClip>,
    /// Clips with audio
    pub synthesized: usize,
    /// Cues whose synthesis failed
    pub failed: usize,
    /// Cues past the per-job cap
    pub skipped: usize,
}

/// Turns cue text into audio clips without ever failing
#[derive(Debug, Clone)]
pub struct SynthesisAdapter {
    provider: Arc<dyn SpeechProvider>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    language: String,
    voice: VoiceConfig,
    max_cues: usize,
    concurrent_requests: usize,
}

impl SynthesisAdapter {
    pub fn new(provider: Arc<dyn SpeechProvider>, config: &SynthesisConfig, voice: VoiceConfig) -> Self {
        let language = match language_utils::normalize_to_part1(&config.language) {
            Ok(code) => code,
            Err(e) => {
                warn!("Language code issue: {}", e);
                config.language.clone()
            }
        };

        Self {
            provider,
            limiter: Arc::new(RateLimiter::new(config.rate_limit_delay())),
            timeout: config.timeout(),
            language,
            voice,
            max_cues: config.max_cues,
            concurrent_requests: config.concurrent_requests.max(1),
        }
    }

    pub fn max_cues(&self) -> usize {
        self.max_cues
    }

    /// Build the provider request for a text and profile
    pub fn request_for(&self, text: &str, profile: VoiceProfile) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            profile,
            rate: profile.rate(&self.voice),
            language: self.language.clone(),
        }
    }

    /// One rate-limited, time-bounded provider call
    pub async fn try_synthesize(&self, text: &str, profile: VoiceProfile) -> Result<Bytes, ProviderError> {
        let request = self.request_for(text, profile);
        self.limiter.acquire().await;

        match tokio::time::timeout(self.timeout, self.provider.synthesize(&request)).await {
            Ok(Ok(audio)) if audio.is_empty() => Err(ProviderError::EmptyAudio(text.to_string())),
            Ok(Ok(audio)) => {
                check_audio(&audio).map_err(ProviderError::MalformedAudio)?;
                Ok(audio)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Synthesize a cue; failures yield a silent clip
    pub async fn synthesize(&self, cue: &Cue, profile: VoiceProfile) -> AudioClip {
        match self.try_synthesize(&cue.text, profile).await {
            Ok(audio) => {
                debug!("Cue {} synthesized as {} ({} bytes)", cue.index, profile, audio.len());
                AudioClip::new(audio, cue.clone(), profile)
            }
            Err(e) => {
                warn!("Synthesis failed for cue {} via {}, using silence: {}", cue.index, self.provider.name(), e);
                AudioClip::silent(cue.clone(), profile)
            }
        }
    }

    /// Synthesize every cue, up to the per-job cap.
    ///
    /// `progress` is called with `(completed, total)` after each call, where
    /// `total` counts only the cues that are actually sent to the provider.
    pub async fn synthesize_all(
        &self,
        assignments: Vec<(Cue, VoiceProfile)>,
        progress: impl Fn(usize, usize),
    ) -> SynthesisReport {
        let mut assignments = assignments;
        let over_cap = if assignments.len() > self.max_cues {
            assignments.split_off(self.max_cues)
        } else {
            Vec::new()
        };
        if !over_cap.is_empty() {
            warn!(
                "Synthesizing only the first {} cues, {} cue(s) will stay silent",
                self.max_cues,
                over_cap.len()
            );
        }

        let total = assignments.len();
        let completed = AtomicUsize::new(0);

        let mut results = stream::iter(assignments.into_iter().enumerate())
            .map(|(position, (cue, profile))| {
                let completed = &completed;
                let progress = &progress;
                async move {
                    let clip = self.synthesize(&cue, profile).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(done, total);
                    (position, clip)
                }
            })
            .buffer_unordered(self.concurrent_requests)
            .collect::<Vec<_>>()
            .await;

        // Completion order is irrelevant; restore input order
        results.sort_by_key(|(position, _)| *position);

        let mut report = SynthesisReport::default();
        for (_, clip) in results {
            if clip.is_silent() {
                report.failed += 1;
            } else {
                report.synthesized += 1;
            }
            report.clips.push(clip);
        }

        report.skipped = over_cap.len();
        report
            .clips
            .extend(over_cap.into_iter().map(|(cue, profile)| AudioClip::silent(cue, profile)));

        report
    }
}
