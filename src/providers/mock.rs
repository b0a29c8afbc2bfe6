/*!
 * Mock speech provider for testing.
 *
 * This module provides a scripted provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with a WAV tone
 * - `MockProvider::intermittent(n)` - Fails every nth request
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::empty()` - Answers with no audio
 * - `MockProvider::malformed(n)` - Answers every nth request with an HTML page
 * - `MockProvider::slow(ms)` - Answers after a delay
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{SpeechProvider, SpeechRequest};
use crate::timeline::pcm::{encode_wav, sine_tone};
use crate::timeline::TrackFormat;
use crate::voice::VoiceProfile;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a tone
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Succeeds with zero bytes of audio
    Empty,
    /// Every Nth request succeeds with a body that is not audio
    Malformed { every: usize },
    /// Succeeds after a delay (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider returning generated WAV audio
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Shared across clones so tests can count calls made through an `Arc`
    request_count: Arc<AtomicUsize>,
    tone_seconds: f64,
    format: TrackFormat,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            tone_seconds: 0.5,
            format: TrackFormat { sample_rate: 16_000, channels: 1 },
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn malformed(every: usize) -> Self {
        Self::new(MockBehavior::Malformed { every })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Length of the generated tone in seconds
    pub fn with_tone_seconds(mut self, seconds: f64) -> Self {
        self.tone_seconds = seconds;
        self
    }

    /// Sample layout of the generated tone
    pub fn with_format(mut self, format: TrackFormat) -> Self {
        self.format = format;
        self
    }

    /// Number of synthesize calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Profiles get distinct pitches so mixed output is easy to tell apart
    fn frequency_for(profile: VoiceProfile) -> f32 {
        match profile {
            VoiceProfile::Child => 660.0,
            VoiceProfile::Female => 440.0,
            VoiceProfile::Male => 220.0,
        }
    }

    fn tone(&self, profile: VoiceProfile) -> Result<Bytes, ProviderError> {
        let buffer = sine_tone(Self::frequency_for(profile), self.tone_seconds, self.format, 0.25);
        encode_wav(&buffer)
            .map(Bytes::from)
            .map_err(|e| ProviderError::RequestFailed(format!("mock encoding failed: {}", e)))
    }
}

#[async_trait]
impl SpeechProvider for MockProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            MockBehavior::Working => self.tone(request.profile),
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == 0 {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("simulated failure on request {}", count),
                    })
                } else {
                    self.tone(request.profile)
                }
            }
            MockBehavior::Failing => Err(ProviderError::ConnectionError("simulated connection failure".to_string())),
            MockBehavior::Empty => Ok(Bytes::new()),
            MockBehavior::Malformed { every } => {
                if every > 0 && count % every == 0 {
                    Ok(Bytes::from_static(b"<html><body>captcha</body></html>"))
                } else {
                    self.tone(request.profile)
                }
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                self.tone(request.profile)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
