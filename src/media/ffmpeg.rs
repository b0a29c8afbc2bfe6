use async_trait::async_trait;
use log::{debug, error};
use std::path::Path;
use std::time::Duration;

use super::{filter_ffmpeg_stderr, run_tool, Muxer, ToolFailure};
use crate::app_config::MediaConfig;
use crate::errors::{CompositeError, MuxError};
use crate::timeline::pcm::TRACK_FILE_NAME;
use crate::timeline::{MixPlan, Mixer, RenderedTrack};

/// Mixer backed by an ffmpeg filter graph.
///
/// A silent `anullsrc` input provides the base track; each placement is
/// delayed with `adelay` (in samples) and everything is summed by `amix`
/// with normalisation disabled, so the result is a plain sum.
#[derive(Debug, Clone)]
pub struct FfmpegMixer {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegMixer {
    pub fn new(ffmpeg_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.command_timeout())
    }

    /// Filter graph for the plan, `None` when there is nothing to overlay.
    ///
    /// Input 0 is the silent base, input `k + 1` is placement `k`.
    pub fn filter_graph(plan: &MixPlan) -> Option<String> {
        if plan.placements.is_empty() {
            return None;
        }

        let format = plan.format;
        let layout = format.channel_layout();
        let mut chains = Vec::with_capacity(plan.placements.len() + 1);
        let mut labels = String::from("[0:a]");

        for (k, placement) in plan.placements.iter().enumerate() {
            let trim = placement
                .max_duration
                .map(|limit| format!(",atrim=end_sample={}", format.frames_for(limit)))
                .unwrap_or_default();
            chains.push(format!(
                "[{input}:a]aresample={rate},aformat=sample_fmts=fltp:channel_layouts={layout}{trim},adelay={delay}S:all=1[c{k}]",
                input = k + 1,
                rate = format.sample_rate,
                delay = format.frames_for(placement.offset),
            ));
            labels.push_str(&format!("[c{k}]"));
        }

        chains.push(format!(
            "{labels}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[out]",
            plan.placements.len() + 1
        ));

        Some(chains.join(";"))
    }

    /// Full argument list; clip files must already exist at `clip_paths`
    pub fn build_args(plan: &MixPlan, clip_paths: &[String], output: &Path) -> Vec<String> {
        let format = plan.format;
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-f".into(),
            "lavfi".into(),
            "-t".into(),
            format!("{:.6}", plan.total_duration),
            "-i".into(),
            format!("anullsrc=r={}:cl={}", format.sample_rate, format.channel_layout()),
        ];

        for path in clip_paths {
            args.push("-i".into());
            args.push(path.clone());
        }

        match Self::filter_graph(plan) {
            Some(graph) => {
                args.push("-filter_complex".into());
                args.push(graph);
                args.push("-map".into());
                args.push("[out]".into());
            }
            None => {
                args.push("-map".into());
                args.push("0:a".into());
            }
        }

        args.extend([
            "-ar".to_string(),
            format.sample_rate.to_string(),
            "-ac".to_string(),
            format.channels.to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            output.to_string_lossy().into_owned(),
        ]);
        args
    }
}

#[async_trait]
impl Mixer for FfmpegMixer {
    async fn mix(&self, plan: &MixPlan, work_dir: &Path) -> Result<RenderedTrack, CompositeError> {
        let mut clip_paths = Vec::with_capacity(plan.placements.len());
        for (k, placement) in plan.placements.iter().enumerate() {
            let path = work_dir.join(format!("clip_{:03}_{}.audio", k, placement.cue_index));
            tokio::fs::write(&path, &placement.samples).await?;
            clip_paths.push(path.to_string_lossy().into_owned());
        }

        let output = work_dir.join(TRACK_FILE_NAME);
        let args = Self::build_args(plan, &clip_paths, &output);

        let result = run_tool(&self.ffmpeg_path, &args, self.timeout).await.map_err(|failure| match failure {
            ToolFailure::Spawn(e) => CompositeError::Command(format!("failed to execute ffmpeg: {}", e)),
            ToolFailure::TimedOut => CompositeError::Timeout(self.timeout.as_secs()),
        })?;

        if !result.status.success() {
            let filtered = filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr));
            error!("Audio mixing failed: {}", filtered);
            return Err(CompositeError::Command(filtered));
        }

        let reader = hound::WavReader::open(&output).map_err(|e| CompositeError::Encode(e.to_string()))?;
        let duration = reader.duration() as f64 / reader.spec().sample_rate as f64;
        debug!("Mixed track is {:.3}s long", duration);

        Ok(RenderedTrack { path: output, duration })
    }
}

/// Muxer that copies the video stream and encodes the new audio with ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    ffmpeg_path: String,
    audio_codec: String,
    audio_bitrate: String,
    timeout: Duration,
}

impl FfmpegMuxer {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        audio_codec: impl Into<String>,
        audio_bitrate: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            audio_codec: audio_codec.into(),
            audio_bitrate: audio_bitrate.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.audio_codec.clone(),
            config.audio_bitrate.clone(),
            config.command_timeout(),
        )
    }

    pub fn build_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-i".into(),
            video.to_string_lossy().into_owned(),
            "-i".into(),
            audio.to_string_lossy().into_owned(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            self.audio_codec.clone(),
            "-b:a".into(),
            self.audio_bitrate.clone(),
            "-shortest".into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        let args = self.build_args(video, audio, output);

        let result = run_tool(&self.ffmpeg_path, &args, self.timeout).await.map_err(|failure| match failure {
            ToolFailure::Spawn(e) => MuxError::Command(format!("failed to execute ffmpeg: {}", e)),
            ToolFailure::TimedOut => MuxError::Timeout(self.timeout.as_secs()),
        })?;

        if !result.status.success() {
            let filtered = filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr));
            error!("Muxing failed: {}", filtered);
            return Err(MuxError::Command(filtered));
        }

        Ok(())
    }
}
