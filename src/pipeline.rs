/*!
 * Dub job pipeline.
 *
 * One `DubJob` per request, driven sequentially through parsing, voice
 * assignment, synthesis, compositing and muxing. Each job owns a temporary
 * workspace that is removed when the job is dropped, whatever stage it
 * reached. Stage changes are published as `JobEvent`s for the front-end.
 */

use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::app_config::{Config, MixerBackend};
use crate::errors::{DubError, FailureClass};
use crate::media::{self, DurationProbe, FfmpegMixer, FfmpegMuxer, FfprobeProbe, Muxer};
use crate::providers::{self, SpeechProvider};
use crate::subtitle_processor::{Cue, CueParser};
use crate::synthesis::SynthesisAdapter;
use crate::timeline::{AudioClip, Compositor, Mixer, PcmMixer, RenderedTrack, Timeline};
use crate::voice::VoiceClassifier;

/// Stage-completion signal for the front-end
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// Subtitle text parsed into `cues` cues
    Parsed { cues: usize },
    /// `current` of `total` synthesis calls finished
    Synthesizing { current: usize, total: usize },
    Compositing,
    Muxing,
    /// Output written
    Done { output: PathBuf },
    /// Job abandoned
    Failed { class: FailureClass, reason: String },
}

/// Stages a job moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Created,
    Parsed,
    Synthesized,
    Composited,
    Muxed,
}

/// Inputs of one dub request
#[derive(Debug, Clone)]
pub struct DubRequest {
    pub video_path: PathBuf,
    pub subtitle_text: String,
    pub output_path: PathBuf,
}

/// Summary of a finished job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DubOutcome {
    pub job_id: Uuid,
    pub output_path: PathBuf,
    /// Duration of the base track in seconds
    pub video_duration: f64,
    /// Length of the composited track in seconds
    pub track_duration: f64,
    pub cues: usize,
    pub synthesized: usize,
    /// Cues rendered as silence because synthesis failed
    pub silent: usize,
    /// Cues past the synthesis cap
    pub skipped: usize,
    /// Cues starting after the end of the video
    pub beyond_end: usize,
    pub artifact_bytes: u64,
}

/// State of one request. Dropping it removes the workspace.
#[derive(Debug)]
pub struct DubJob {
    id: Uuid,
    stage: JobStage,
    workspace: TempDir,
    video_duration: Option<f64>,
    cues: Vec<Cue>,
    track: Option<RenderedTrack>,
    artifact: Option<PathBuf>,
}

impl DubJob {
    /// Create a job with a fresh workspace under the system temp dir
    pub fn create() -> Result<Self, DubError> {
        Self::create_in(&std::env::temp_dir())
    }

    /// Create a job with a fresh workspace under `parent`
    pub fn create_in(parent: &Path) -> Result<Self, DubError> {
        let id = Uuid::new_v4();
        let workspace = tempfile::Builder::new()
            .prefix(&format!("subdub-{}-", id))
            .tempdir_in(parent)
            .map_err(|e| DubError::UpstreamFailed(format!("failed to create job workspace: {}", e)))?;

        Ok(Self {
            id,
            stage: JobStage::Created,
            workspace,
            video_duration: None,
            cues: Vec::new(),
            track: None,
            artifact: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn video_duration(&self) -> Option<f64> {
        self.video_duration
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn track(&self) -> Option<&RenderedTrack> {
        self.track.as_ref()
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    fn advance(&mut self, stage: JobStage) {
        debug_assert!(stage > self.stage, "job stages only move forward");
        self.stage = stage;
    }
}

fn emit(events: Option<&UnboundedSender<JobEvent>>, event: JobEvent) {
    if let Some(sender) = events {
        // A closed receiver only means nobody is listening anymore
        let _ = sender.send(event);
    }
}

/// The full dubbing pipeline
#[derive(Debug)]
pub struct DubPipeline {
    parser: CueParser,
    classifier: VoiceClassifier,
    synthesizer: SynthesisAdapter,
    compositor: Compositor,
    muxer: Arc<dyn Muxer>,
    probe: Arc<dyn DurationProbe>,
    fallback_duration: f64,
    min_output_bytes: u64,
    workspace_root: Option<PathBuf>,
}

impl DubPipeline {
    /// Pipeline using the providers and tools named in the configuration
    pub fn from_config(config: &Config) -> Self {
        let mixer: Arc<dyn Mixer> = match config.timeline.mixer {
            MixerBackend::Ffmpeg => Arc::new(FfmpegMixer::from_config(&config.media)),
            MixerBackend::Pcm => Arc::new(PcmMixer::new()),
        };
        let probe = Arc::new(FfprobeProbe::new(config.media.ffprobe_path.clone(), config.media.command_timeout()));

        Self::new(
            config,
            providers::from_config(&config.synthesis),
            mixer,
            Arc::new(FfmpegMuxer::from_config(&config.media)),
            probe,
        )
    }

    /// Pipeline with explicit collaborators
    pub fn new(
        config: &Config,
        provider: Arc<dyn SpeechProvider>,
        mixer: Arc<dyn Mixer>,
        muxer: Arc<dyn Muxer>,
        probe: Arc<dyn DurationProbe>,
    ) -> Self {
        Self {
            parser: CueParser::new(config.subtitle.dialect),
            classifier: VoiceClassifier::new(config.voice.clone()),
            synthesizer: SynthesisAdapter::new(provider, &config.synthesis, config.voice.clone()),
            compositor: Compositor::from_config(&config.timeline, mixer),
            muxer,
            probe,
            fallback_duration: config.media.fallback_duration_secs,
            min_output_bytes: config.media.min_output_bytes,
            workspace_root: None,
        }
    }

    /// Put job workspaces under `root` instead of the system temp dir
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Replace the classifier, e.g. with a seeded one
    pub fn with_classifier(mut self, classifier: VoiceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run one job to completion.
    ///
    /// Emits `Done` or `Failed` last. The job workspace is gone by the time
    /// this returns.
    pub async fn run(
        &self,
        request: &DubRequest,
        events: Option<&UnboundedSender<JobEvent>>,
    ) -> Result<DubOutcome, DubError> {
        let job = match &self.workspace_root {
            Some(root) => DubJob::create_in(root),
            None => DubJob::create(),
        };
        let result = match job {
            Ok(mut job) => {
                let result = self.execute(&mut job, request, events).await;
                info!("Job {} finished at stage {:?}", job.id(), job.stage());
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => emit(events, JobEvent::Done { output: outcome.output_path.clone() }),
            Err(e) => {
                error!("Dub job failed: {}", e);
                emit(events, JobEvent::Failed {
                    class: e.class(),
                    reason: e.user_reason().to_string(),
                });
            }
        }

        result
    }

    async fn execute(
        &self,
        job: &mut DubJob,
        request: &DubRequest,
        events: Option<&UnboundedSender<JobEvent>>,
    ) -> Result<DubOutcome, DubError> {
        let video = &request.video_path;
        if !video.is_file() {
            return Err(DubError::UpstreamFailed(format!("video file not found: {}", video.display())));
        }

        let duration = match self.probe.probe_duration(video).await {
            Some(duration) => duration,
            None => {
                warn!(
                    "Could not determine duration of {}, assuming {:.1}s",
                    video.display(),
                    self.fallback_duration
                );
                self.fallback_duration
            }
        };
        job.video_duration = Some(duration);

        let cues = self.parser.parse(&request.subtitle_text);
        emit(events, JobEvent::Parsed { cues: cues.len() });
        if cues.is_empty() {
            return Err(DubError::ParseDegraded("subtitle text contains no usable cues".to_string()));
        }
        info!("Job {}: {} cue(s) against {:.3}s of video", job.id(), cues.len(), duration);
        job.cues = cues;
        job.advance(JobStage::Parsed);

        // Cues past the end of the video would be dropped anyway; don't pay for them
        let (in_range, beyond_end): (Vec<Cue>, Vec<Cue>) =
            job.cues.iter().cloned().partition(|cue| cue.start < duration);
        let assignments = in_range
            .into_iter()
            .map(|cue| {
                let profile = self.classifier.classify(&cue.text);
                (cue, profile)
            })
            .collect();

        let report = self
            .synthesizer
            .synthesize_all(assignments, |current, total| {
                emit(events, JobEvent::Synthesizing { current, total })
            })
            .await;
        info!(
            "Synthesis: {} clip(s), {} silent, {} over the cap",
            report.synthesized, report.failed, report.skipped
        );
        job.advance(JobStage::Synthesized);

        let beyond_end_count = beyond_end.len();
        let mut clips = report.clips;
        clips.extend(beyond_end.into_iter().map(|cue| {
            let profile = self.classifier.classify(&cue.text);
            AudioClip::silent(cue, profile)
        }));

        emit(events, JobEvent::Compositing);
        let timeline = Timeline::new(duration, clips);
        let track = self.compositor.composite(timeline, job.workspace()).await?;
        job.track = Some(track.clone());
        job.advance(JobStage::Composited);

        emit(events, JobEvent::Muxing);
        let output = &request.output_path;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(crate::errors::MuxError::from)?;
        }
        let verified = match self.muxer.mux(video, &track.path, output).await {
            Ok(()) => media::verify_artifact(output, self.min_output_bytes),
            Err(e) => Err(e),
        };
        let artifact_bytes = match verified {
            Ok(size) => size,
            Err(e) => {
                // A partial file would make the next run skip this video
                if output.exists() {
                    let _ = std::fs::remove_file(output);
                }
                return Err(e.into());
            }
        };
        job.artifact = Some(output.clone());
        job.advance(JobStage::Muxed);

        Ok(DubOutcome {
            job_id: job.id(),
            output_path: output.clone(),
            video_duration: duration,
            track_duration: track.duration,
            cues: job.cues.len(),
            synthesized: report.synthesized,
            silent: report.failed,
            skipped: report.skipped,
            beyond_end: beyond_end_count,
            artifact_bytes,
        })
    }
}
