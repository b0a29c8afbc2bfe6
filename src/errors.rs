/*!
 * Error types for the subdub pipeline.
 *
 * This module contains custom error types for the different stages of a dub job,
 * using the thiserror crate for ergonomic error definitions. Per-cue problems
 * (`ProviderError`) never leave the synthesis adapter; stage-level problems
 * (`CompositeError`, `MuxError`) are wrapped into `DubError` and end the job.
 */

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when talking to a speech provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The provider answered but returned no audio
    #[error("Provider returned no audio for: {0}")]
    EmptyAudio(String),

    /// The provider answered with bytes that are not playable audio
    #[error("Provider returned malformed audio: {0}")]
    MalformedAudio(String),

    /// The call did not complete within the configured timeout
    #[error("Synthesis timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors raised while mixing clips onto the base track
#[derive(Error, Debug)]
pub enum CompositeError {
    /// A clip could not be decoded by the mixer
    #[error("Failed to decode clip for cue {cue_index}: {reason}")]
    Decode {
        /// Index of the cue the clip belongs to
        cue_index: usize,
        /// Decoder message
        reason: String,
    },

    /// The mixed track could not be written
    #[error("Failed to encode mixed track: {0}")]
    Encode(String),

    /// The external mixing command failed
    #[error("ffmpeg mixing failed: {0}")]
    Command(String),

    /// The external mixing command did not finish in time
    #[error("Mixing timed out after {0} seconds")]
    Timeout(u64),

    /// The blocking mixing task was lost
    #[error("Mixing task aborted: {0}")]
    Aborted(String),

    /// Filesystem error inside the job workspace
    #[error("I/O error while mixing: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while producing the final container
#[derive(Error, Debug)]
pub enum MuxError {
    /// The external muxing command failed
    #[error("ffmpeg muxing failed: {0}")]
    Command(String),

    /// The external muxing command did not finish in time
    #[error("Muxing timed out after {0} seconds")]
    Timeout(u64),

    /// Muxing reported success but produced no file
    #[error("Output file was not created: {0}")]
    Missing(String),

    /// Muxing reported success but the file is implausibly small
    #[error("Output file is only {size} bytes (minimum {min})")]
    Undersized {
        /// Size of the artifact in bytes
        size: u64,
        /// Configured minimum size in bytes
        min: u64,
    },

    /// Filesystem error around the output file
    #[error("I/O error while muxing: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classes reported to the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ParseDegraded,
    SynthesisFailed,
    CompositingFailed,
    MuxFailed,
    UpstreamFailed,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ParseDegraded => "parse_degraded",
            Self::SynthesisFailed => "synthesis_failed",
            Self::CompositingFailed => "compositing_failed",
            Self::MuxFailed => "mux_failed",
            Self::UpstreamFailed => "upstream_failed",
        };
        f.write_str(name)
    }
}

/// Job-level error type
#[derive(Error, Debug)]
pub enum DubError {
    /// The subtitle text produced no usable cues
    #[error("Subtitle parsing degraded: {0}")]
    ParseDegraded(String),

    /// A single cue could not be synthesized. The pipeline absorbs these as
    /// silence; the variant exists for adapters that want to surface them.
    #[error("Synthesis failed for cue {cue_index}: {source}")]
    SynthesisFailed {
        /// Index of the affected cue
        cue_index: usize,
        /// Underlying provider error
        #[source]
        source: ProviderError,
    },

    /// Mixing the timeline failed
    #[error("Compositing failed: {0}")]
    CompositingFailed(#[from] CompositeError),

    /// Producing the output container failed
    #[error("Muxing failed: {0}")]
    MuxFailed(#[from] MuxError),

    /// The inputs of the job could not be obtained
    #[error("Upstream input failed: {0}")]
    UpstreamFailed(String),
}

impl DubError {
    /// Failure class for the front-end
    pub fn class(&self) -> FailureClass {
        match self {
            Self::ParseDegraded(_) => FailureClass::ParseDegraded,
            Self::SynthesisFailed { .. } => FailureClass::SynthesisFailed,
            Self::CompositingFailed(_) => FailureClass::CompositingFailed,
            Self::MuxFailed(_) => FailureClass::MuxFailed,
            Self::UpstreamFailed(_) => FailureClass::UpstreamFailed,
        }
    }

    /// Short human-readable reason, free of internal diagnostics
    pub fn user_reason(&self) -> &'static str {
        match self {
            Self::ParseDegraded(_) => "no cues found in the subtitle file",
            Self::SynthesisFailed { .. } => "speech could not be generated for a line",
            Self::CompositingFailed(_) => "the dubbed audio track could not be assembled",
            Self::MuxFailed(_) => "the dubbed video could not be produced",
            Self::UpstreamFailed(_) => "the input files could not be read",
        }
    }

    /// Whether the job must be abandoned
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SynthesisFailed { .. })
    }
}
