use async_trait::async_trait;
use bytes::Bytes;
use log::error;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{request_error, status_error, SpeechProvider, SpeechRequest};
use crate::app_config::VoiceNames;
use crate::errors::ProviderError;
use crate::voice::VoiceProfile;

/// Client for OpenAI-compatible `/audio/speech` endpoints
#[derive(Debug)]
pub struct OpenAISpeech {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, e.g. `https://api.openai.com/v1`
    endpoint: String,
    /// Model name
    model: String,
    /// Voice per profile
    voices: VoiceNames,
}

/// Speech request body
#[derive(Debug, Serialize)]
pub struct OpenAISpeechRequest {
    /// The model to use
    pub model: String,
    /// Text to speak
    pub input: String,
    /// Voice identity
    pub voice: String,
    /// Playback speed, 0.25 to 4.0
    pub speed: f32,
    /// Container of the returned audio
    pub response_format: String,
}

impl OpenAISpeech {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        voices: VoiceNames,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            voices,
        }
    }

    /// Voice name used for a profile
    pub fn voice_for(&self, profile: VoiceProfile) -> &str {
        match profile {
            VoiceProfile::Child => &self.voices.child,
            VoiceProfile::Female => &self.voices.female,
            VoiceProfile::Male => &self.voices.male,
        }
    }

    /// Build the request body for a synthesis request
    pub fn build_request(&self, request: &SpeechRequest) -> OpenAISpeechRequest {
        OpenAISpeechRequest {
            model: self.model.clone(),
            input: request.text.clone(),
            voice: self.voice_for(request.profile).to_string(),
            speed: request.rate.clamp(0.25, 4.0),
            response_format: "wav".to_string(),
        }
    }
}

#[async_trait]
impl SpeechProvider for OpenAISpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, ProviderError> {
        let api_url = format!("{}/audio/speech", self.endpoint.trim_end_matches('/'));
        let body = self.build_request(request);

        let response = self.client.post(&api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenAI speech API error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        let audio = response.bytes().await.map_err(request_error)?;
        if audio.is_empty() {
            return Err(ProviderError::EmptyAudio(request.text.clone()));
        }
        Ok(audio)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
