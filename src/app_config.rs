use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::time::Duration;

use crate::subtitle_processor::Dialect;
use crate::voice::Script;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Speech synthesis settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Voice assignment settings
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Track compositing settings
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// External media tool settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Subtitle parsing settings
    #[serde(default)]
    pub subtitle: SubtitleConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProviderKind {
    // @provider: Google Translate TTS endpoint
    #[default]
    Google,
    // @provider: OpenAI-compatible /v1/audio/speech
    OpenAI,
}

impl SpeechProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Google => "Google Translate",
            Self::OpenAI => "OpenAI",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Google => "google".to_string(),
            Self::OpenAI => "openai".to_string(),
        }
    }
}

impl std::fmt::Display for SpeechProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for SpeechProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Voice names used by providers that support voice identities
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoiceNames {
    #[serde(default = "default_child_voice")]
    pub child: String,
    #[serde(default = "default_female_voice")]
    pub female: String,
    #[serde(default = "default_male_voice")]
    pub male: String,
}

impl Default for VoiceNames {
    fn default() -> Self {
        Self {
            child: default_child_voice(),
            female: default_female_voice(),
            male: default_male_voice(),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: SpeechProviderKind,

    /// Service URL, empty for the provider default
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// API key, only used by providers that need one
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model name, only used by providers that need one
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Spoken language code (ISO 639-1 or 639-2)
    #[serde(default = "default_language")]
    pub language: String,

    /// Timeout per synthesis call in seconds
    #[serde(default = "default_synthesis_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum delay between consecutive synthesis calls in milliseconds
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Maximum number of cues synthesized per job; later cues stay silent
    #[serde(default = "default_max_cues")]
    pub max_cues: usize,

    /// Maximum number of synthesis calls in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Voice names per profile
    #[serde(default)]
    pub voices: VoiceNames,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProviderKind::default(),
            endpoint: String::new(),
            api_key: String::new(),
            model: default_openai_model(),
            language: default_language(),
            timeout_secs: default_synthesis_timeout_secs(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            max_cues: default_max_cues(),
            concurrent_requests: default_concurrent_requests(),
            voices: VoiceNames::default(),
        }
    }
}

impl SynthesisConfig {
    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }

        match self.provider {
            SpeechProviderKind::Google => default_google_endpoint(),
            SpeechProviderKind::OpenAI => default_openai_endpoint(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

/// Voice classification configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Script whose characters count toward text length
    #[serde(default)]
    pub script: Script,

    /// Lines with fewer script characters than this are voiced as a child
    #[serde(default = "default_short_text_threshold")]
    pub short_text_threshold: usize,

    /// Draw weight for the female profile
    #[serde(default = "default_female_weight")]
    pub female_weight: f64,

    /// Draw weight for the male profile
    #[serde(default = "default_male_weight")]
    pub male_weight: f64,

    /// Draw weight for the child profile
    #[serde(default = "default_child_weight")]
    pub child_weight: f64,

    /// Probability that a question or exclamation is voiced as a child
    #[serde(default = "default_question_child_bias")]
    pub question_child_bias: f64,

    /// Speech-rate multiplier for the child profile
    #[serde(default = "default_child_rate")]
    pub child_rate: f32,

    /// Speech-rate multiplier for the female profile
    #[serde(default = "default_female_rate")]
    pub female_rate: f32,

    /// Speech-rate multiplier for the male profile
    #[serde(default = "default_male_rate")]
    pub male_rate: f32,

    /// Fixed seed for the random draw, mostly for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            script: Script::default(),
            short_text_threshold: default_short_text_threshold(),
            female_weight: default_female_weight(),
            male_weight: default_male_weight(),
            child_weight: default_child_weight(),
            question_child_bias: default_question_child_bias(),
            child_rate: default_child_rate(),
            female_rate: default_female_rate(),
            male_rate: default_male_rate(),
            seed: None,
        }
    }
}

/// How clips with overlapping cues are combined
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Sum every clip at its own offset
    #[default]
    Additive,
    /// Cut each clip off where the next clip starts
    LastWins,
    /// Drop clips whose cue starts before the previous kept cue ends
    Reject,
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Additive => "additive",
            Self::LastWins => "last-wins",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OverlapPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "additive" => Ok(Self::Additive),
            "last-wins" | "last_wins" => Ok(Self::LastWins),
            "reject" => Ok(Self::Reject),
            _ => Err(anyhow!("Invalid overlap policy: {}", s)),
        }
    }
}

/// Mixer implementation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MixerBackend {
    /// ffmpeg filter graph, accepts any encoded clip
    #[default]
    Ffmpeg,
    /// In-process mixing, clips must be WAV
    Pcm,
}

/// Timeline compositing configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimelineConfig {
    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Output channel count (1 or 2)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Overlap handling
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,

    /// Mixer backend
    #[serde(default)]
    pub mixer: MixerBackend,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            overlap_policy: OverlapPolicy::default(),
            mixer: MixerBackend::default(),
        }
    }
}

/// External media tools configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaConfig {
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe executable
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Duration assumed when the probe cannot tell, in seconds
    #[serde(default = "default_fallback_duration_secs")]
    pub fallback_duration_secs: f64,

    /// Outputs at or below this size are treated as failed
    #[serde(default = "default_min_output_bytes")]
    pub min_output_bytes: u64,

    /// Audio codec of the final container
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate of the final container
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Timeout for each ffmpeg/ffprobe invocation in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            fallback_duration_secs: default_fallback_duration_secs(),
            min_output_bytes: default_min_output_bytes(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl MediaConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Configuration for subtitle processing
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SubtitleConfig {
    /// Timed-text dialect
    #[serde(default)]
    pub dialect: Dialect,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_concurrent_requests() -> usize {
    1
}

fn default_synthesis_timeout_secs() -> u64 {
    20
}

fn default_rate_limit_delay_ms() -> u64 {
    300 // 300ms default delay between requests
}

fn default_max_cues() -> usize {
    50
}

fn default_language() -> String {
    "en".to_string()
}

fn default_google_endpoint() -> String {
    "https://translate.google.com/translate_tts".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "tts-1".to_string()
}

fn default_child_voice() -> String {
    "fable".to_string()
}

fn default_female_voice() -> String {
    "nova".to_string()
}

fn default_male_voice() -> String {
    "onyx".to_string()
}

fn default_short_text_threshold() -> usize {
    12
}

fn default_female_weight() -> f64 {
    0.45
}

fn default_male_weight() -> f64 {
    0.45
}

fn default_child_weight() -> f64 {
    0.10
}

fn default_question_child_bias() -> f64 {
    0.3
}

fn default_child_rate() -> f32 {
    0.85
}

fn default_female_rate() -> f32 {
    1.0
}

fn default_male_rate() -> f32 {
    0.95
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u16 {
    2
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_fallback_duration_secs() -> f64 {
    60.0
}

fn default_min_output_bytes() -> u64 {
    1024
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_command_timeout_secs() -> u64 {
    600
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _language_name = crate::language_utils::get_language_name(&self.synthesis.language)?;

        url::Url::parse(&self.synthesis.get_endpoint())
            .map_err(|e| anyhow!("Invalid synthesis endpoint '{}': {}", self.synthesis.get_endpoint(), e))?;

        if self.synthesis.provider == SpeechProviderKind::OpenAI && self.synthesis.api_key.is_empty() {
            return Err(anyhow!("Synthesis API key is required for OpenAI provider"));
        }

        // Google answers with MP3, which only the ffmpeg mixer can decode
        if self.synthesis.provider == SpeechProviderKind::Google && self.timeline.mixer == MixerBackend::Pcm {
            return Err(anyhow!(
                "timeline.mixer = pcm only reads WAV clips, but synthesis.provider = google returns MP3; use timeline.mixer = ffmpeg"
            ));
        }

        if self.synthesis.max_cues == 0 {
            return Err(anyhow!("max_cues must be at least 1"));
        }

        if self.synthesis.concurrent_requests == 0 {
            return Err(anyhow!("concurrent_requests must be at least 1"));
        }

        if self.synthesis.timeout_secs == 0 {
            return Err(anyhow!("Synthesis timeout must be at least 1 second"));
        }

        let weights = [self.voice.female_weight, self.voice.male_weight, self.voice.child_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(anyhow!("Voice weights must be non-negative and not all zero"));
        }

        if !(0.0..=1.0).contains(&self.voice.question_child_bias) {
            return Err(anyhow!("question_child_bias must be between 0 and 1"));
        }

        let rates = [self.voice.child_rate, self.voice.female_rate, self.voice.male_rate];
        if rates.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(anyhow!("Voice rates must be positive"));
        }

        if self.timeline.sample_rate == 0 {
            return Err(anyhow!("Sample rate must be positive"));
        }

        if !(1..=2).contains(&self.timeline.channels) {
            return Err(anyhow!("Only mono or stereo output is supported, got {} channels", self.timeline.channels));
        }

        if !self.media.fallback_duration_secs.is_finite() || self.media.fallback_duration_secs <= 0.0 {
            return Err(anyhow!("Fallback duration must be positive"));
        }

        Ok(())
    }
}
