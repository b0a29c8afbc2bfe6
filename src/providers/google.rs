use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::{debug, error};
use reqwest::Client;
use std::time::Duration;

use super::{request_error, status_error, SpeechProvider, SpeechRequest};
use crate::errors::ProviderError;

/// Longest text the endpoint accepts in one request
pub const MAX_CHARS_PER_REQUEST: usize = 200;

/// Client for the Google Translate TTS endpoint
#[derive(Debug)]
pub struct GoogleTts {
    /// HTTP client for API requests
    client: Client,
    /// Endpoint URL
    endpoint: String,
}

impl GoogleTts {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent("Mozilla/5.0")
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    /// Split text into request-sized pieces on word boundaries
    pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if current_len > 0 && current_len + 1 + word_len > max_chars {
                chunks.push(std::mem::take(&mut current));
            }

            if word_len > max_chars {
                // A single overlong word is split hard
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_chars) {
                    chunks.push(piece.iter().collect());
                }
                continue;
            }

            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    async fn fetch_chunk(&self, chunk: &str, index: usize, total: usize, request: &SpeechRequest) -> Result<Bytes, ProviderError> {
        let speed = format!("{:.2}", request.rate.clamp(0.24, 1.0));
        let index = index.to_string();
        let total = total.to_string();
        let len = chunk.chars().count().to_string();

        let response = self.client.get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", request.language.as_str()),
                ("q", chunk),
                ("ttsspeed", speed.as_str()),
                ("idx", index.as_str()),
                ("total", total.as_str()),
                ("textlen", len.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Google TTS error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        response.bytes().await.map_err(request_error)
    }
}

#[async_trait]
impl SpeechProvider for GoogleTts {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, ProviderError> {
        let chunks = Self::split_text(&request.text, MAX_CHARS_PER_REQUEST);
        if chunks.is_empty() {
            return Err(ProviderError::EmptyAudio(request.text.clone()));
        }

        // MP3 frames can be concatenated as-is
        let mut audio = BytesMut::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let part = self.fetch_chunk(chunk, index, chunks.len(), request).await?;
            debug!("Google TTS chunk {}/{}: {} bytes", index + 1, chunks.len(), part.len());
            audio.extend_from_slice(&part);
        }

        if audio.is_empty() {
            return Err(ProviderError::EmptyAudio(request.text.clone()));
        }

        Ok(audio.freeze())
    }

    fn name(&self) -> &str {
        "google"
    }
}
