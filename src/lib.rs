/*!
 * # SubDub - subtitle-driven voice dubbing
 *
 * A Rust library that turns a subtitle file into a spoken audio track and
 * muxes it into the original video.
 *
 * ## Features
 *
 * - Parse SRT, WebVTT and bare cue-block subtitles
 * - Assign a voice profile (child, female, male) to each line
 * - Synthesize speech using different providers:
 *   - Google Translate TTS
 *   - OpenAI-compatible speech API
 * - Rate-limited, capped synthesis where failed lines become silence
 * - Composite clips at their cue times onto a track as long as the video
 * - Replace the video's audio while copying the video stream
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Cue parsing
 * - `voice`: Voice profile classification
 * - `providers`: Speech provider clients:
 *   - `providers::google`: Google Translate TTS client
 *   - `providers::openai`: OpenAI speech client
 *   - `providers::mock`: Scripted provider for tests
 * - `synthesis`: Rate limiting, timeouts and the per-job cap around a provider
 * - `timeline`: Clip placement and mixing
 * - `media`: Duration probing and ffmpeg mixing/muxing
 * - `pipeline`: The dub job state machine
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod media;
pub mod pipeline;
pub mod providers;
pub mod subtitle_processor;
pub mod synthesis;
pub mod timeline;
pub mod voice;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{CompositeError, DubError, FailureClass, MuxError, ProviderError};
pub use pipeline::{DubOutcome, DubPipeline, DubRequest, JobEvent};
pub use subtitle_processor::{Cue, CueParser, Dialect};
pub use timeline::{AudioClip, Compositor, Timeline};
pub use voice::{VoiceClassifier, VoiceProfile};
