/*!
 * Speech provider implementations.
 *
 * This module contains client implementations for text-to-speech services:
 * - Google: Google Translate TTS endpoint (MP3 output)
 * - OpenAI: OpenAI-compatible speech endpoint (WAV output)
 * - Mock: scripted provider for tests
 *
 * Providers report failures as `ProviderError`; turning those into silent
 * clips is the synthesis adapter's job, not theirs.
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{SpeechProviderKind, SynthesisConfig};
use crate::errors::ProviderError;
use crate::voice::VoiceProfile;

/// A single synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// Voice profile assigned to the text
    pub profile: VoiceProfile,
    /// Speech-rate multiplier derived from the profile
    pub rate: f32,
    /// ISO 639-1 language code
    pub language: String,
}

/// Common trait for all speech providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the synthesis adapter.
#[async_trait]
pub trait SpeechProvider: Send + Sync + Debug {
    /// Synthesize speech for a request
    ///
    /// # Returns
    /// * `Result<Bytes, ProviderError>` - Encoded audio, or an error
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Build the provider selected in the configuration
pub fn from_config(config: &SynthesisConfig) -> Arc<dyn SpeechProvider> {
    match config.provider {
        SpeechProviderKind::Google => Arc::new(google::GoogleTts::new(config.get_endpoint(), config.timeout())),
        SpeechProviderKind::OpenAI => Arc::new(openai::OpenAISpeech::new(
            config.api_key.clone(),
            config.get_endpoint(),
            config.model.clone(),
            config.voices.clone(),
            config.timeout(),
        )),
    }
}

/// Map a reqwest failure onto a provider error
pub(crate) fn request_error(error: reqwest::Error) -> ProviderError {
    if error.is_connect() || error.is_timeout() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Map a non-success HTTP status onto a provider error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimitExceeded(body)
    } else {
        ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        }
    }
}

pub mod google;
pub mod mock;
pub mod openai;
