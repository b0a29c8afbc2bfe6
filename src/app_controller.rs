use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::app_config::Config;
use crate::file_utils::{FileManager, FileType};
use crate::pipeline::{DubOutcome, DubPipeline, DubRequest, JobEvent};

// @module: Application controller for dub jobs

/// Result of processing a whole folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for dubbing videos
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Pipeline shared by every job of this run
    pipeline: DubPipeline,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let pipeline = DubPipeline::from_config(&config);
        Ok(Self { config, pipeline })
    }

    /// Create a controller around a prepared pipeline
    pub fn with_pipeline(config: Config, pipeline: DubPipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dub a single video with the given subtitle file.
    ///
    /// Returns `None` when the output already exists and `force_overwrite` is off.
    pub async fn run(
        &self,
        video: PathBuf,
        subtitle: PathBuf,
        output: Option<PathBuf>,
        force_overwrite: bool,
    ) -> Result<Option<DubOutcome>> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&video, &subtitle, output, &multi_progress, force_overwrite)
            .await
    }

    async fn run_with_progress(
        &self,
        video: &Path,
        subtitle: &Path,
        output: Option<PathBuf>,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<Option<DubOutcome>> {
        let start_time = std::time::Instant::now();

        if !FileManager::file_exists(video) {
            return Err(anyhow::anyhow!("Video file does not exist: {:?}", video));
        }
        if FileManager::detect_file_type(subtitle)? != FileType::Subtitle {
            warn!("{:?} does not look like a subtitle file, parsing it anyway", subtitle);
        }

        let output_path = output.unwrap_or_else(|| FileManager::generate_output_path(video, None));
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, dubbed output already exists (use -f to force overwrite)");
            return Ok(None);
        }
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            FileManager::ensure_dir(parent)?;
        }

        let subtitle_text = FileManager::read_to_string(subtitle)?;
        let request = DubRequest {
            video_path: video.to_path_buf(),
            subtitle_text,
            output_path,
        };

        info!(
            "🎙  SubDub: {} ({}) - {}",
            self.config.synthesis.provider.display_name(),
            self.config.synthesis.language,
            video.display()
        );

        let progress_bar = multi_progress.add(ProgressBar::new(0));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Parsing");

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let pb = progress_bar.clone();
        let renderer = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                Self::render_event(&pb, &event);
            }
        });

        let result = self.pipeline.run(&request, Some(&sender)).await;
        drop(sender);
        if let Err(e) = renderer.await {
            warn!("Progress renderer stopped: {}", e);
        }
        progress_bar.finish_and_clear();

        let outcome = result.with_context(|| format!("Failed to dub {:?}", video))?;
        info!(
            "Dubbed {} in {}: {} voiced, {} silent, {} skipped, {} past the end",
            outcome.output_path.display(),
            Self::format_duration(start_time.elapsed()),
            outcome.synthesized,
            outcome.silent,
            outcome.skipped,
            outcome.beyond_end
        );

        Ok(Some(outcome))
    }

    fn render_event(progress_bar: &ProgressBar, event: &JobEvent) {
        match event {
            JobEvent::Parsed { cues } => progress_bar.set_message(format!("{} cues", cues)),
            JobEvent::Synthesizing { current, total } => {
                progress_bar.set_length(*total as u64);
                progress_bar.set_position(*current as u64);
                progress_bar.set_message("Synthesizing");
            }
            JobEvent::Compositing => progress_bar.set_message("Compositing"),
            JobEvent::Muxing => progress_bar.set_message("Muxing"),
            JobEvent::Done { .. } => progress_bar.set_message("Done"),
            JobEvent::Failed { class, reason } => progress_bar.set_message(format!("Failed ({}): {}", class, reason)),
        }
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Dub every video in a directory that has a subtitle file with the same stem.
    /// Videos whose output already exists are skipped unless `force_overwrite` is set.
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<FolderSummary> {
        let start_time = std::time::Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow::anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let video_files = FileManager::find_videos(&input_dir)?;
        if video_files.is_empty() {
            return Err(anyhow::anyhow!("No video files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(video_files.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style.progress_chars("█▓▒░"));
        folder_pb.set_message("Processing files");

        let mut summary = FolderSummary::default();

        for video in &video_files {
            let file_name = video
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let Some(subtitle) = FileManager::find_subtitle_for_video(video) else {
                warn!("Skipping {}, no subtitle file with the same name", file_name);
                summary.skipped += 1;
                folder_pb.inc(1);
                continue;
            };

            match self
                .run_with_progress(video, &subtitle, None, &multi_progress, force_overwrite)
                .await
            {
                Ok(Some(_)) => summary.processed += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }

            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        info!(
            "Folder processing completed in {}: {} processed, {} skipped, {} errors",
            Self::format_duration(start_time.elapsed()),
            summary.processed,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }
}
