/*!
 * End-to-end dub job tests over the mock provider, the PCM mixer and fake media tools
 */

use tokio::sync::mpsc;

use subdub::errors::{DubError, FailureClass, MuxError};
use subdub::pipeline::{DubJob, DubRequest, JobEvent, JobStage};
use subdub::providers::mock::MockProvider;

use crate::common::{
    self, create_temp_dir, create_test_video, read_wav, test_config, test_pipeline, FakeMuxMode, TEST_FORMAT,
    TWO_CUE_SRT,
};

fn request(dir: &std::path::Path, subtitle_text: &str) -> DubRequest {
    DubRequest {
        video_path: create_test_video(dir, "input.mp4").unwrap(),
        subtitle_text: subtitle_text.to_string(),
        output_path: dir.join("out").join("input.dubbed.mp4"),
    }
}

fn drain(mut receiver: mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn is_silent_track(path: &std::path::Path, seconds: f64) -> bool {
    let track = read_wav(path);
    track.format == TEST_FORMAT
        && track.frames() == TEST_FORMAT.frames_for(seconds)
        && track.samples.iter().all(|s| *s == 0.0)
}

#[tokio::test]
async fn test_run_withTwoCues_shouldProduceVoicedTrackAndEvents() {
    common::init_logging();
    let dir = create_temp_dir().unwrap();
    let pipeline = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::CopyAudio, Some(6.0));
    let request = request(dir.path(), TWO_CUE_SRT);
    let (sender, receiver) = mpsc::unbounded_channel();

    let outcome = pipeline.run(&request, Some(&sender)).await.unwrap();

    assert_eq!(outcome.cues, 2);
    assert_eq!(outcome.synthesized, 2);
    assert_eq!(outcome.silent, 0);
    assert_eq!(outcome.video_duration, 6.0);
    assert_eq!(outcome.track_duration, 6.0);
    assert_eq!(outcome.output_path, request.output_path);
    assert!(outcome.artifact_bytes > 1024);

    let track = read_wav(&request.output_path);
    assert_eq!(track.frames(), 48_000);
    assert!(track.samples[..8_000].iter().any(|s| *s != 0.0));
    assert!(track.samples[16_000..24_000].iter().any(|s| *s != 0.0));
    assert!(track.samples[40_000..].iter().all(|s| *s == 0.0));

    drop(sender);
    assert_eq!(
        drain(receiver),
        vec![
            JobEvent::Parsed { cues: 2 },
            JobEvent::Synthesizing { current: 1, total: 2 },
            JobEvent::Synthesizing { current: 2, total: 2 },
            JobEvent::Compositing,
            JobEvent::Muxing,
            JobEvent::Done { output: request.output_path.clone() },
        ]
    );
}

#[tokio::test]
async fn test_run_withCueBeyondVideoEnd_shouldDropItAndKeepSilentBase() {
    let dir = create_temp_dir().unwrap();
    let provider = MockProvider::working();
    let pipeline = test_pipeline(&test_config(), provider.clone(), FakeMuxMode::CopyAudio, Some(10.0));
    let request = request(dir.path(), "1\n00:01:40,000 --> 00:01:42,000\nFar too late for this video\n");

    let outcome = pipeline.run(&request, None).await.unwrap();

    assert_eq!(outcome.beyond_end, 1);
    assert_eq!(outcome.synthesized, 0);
    assert_eq!(provider.request_count(), 0);
    assert!(is_silent_track(&request.output_path, 10.0));
}

#[tokio::test]
async fn test_run_withEveryCallFailing_shouldSucceedWithSilentTrack() {
    let dir = create_temp_dir().unwrap();
    let provider = MockProvider::failing();
    let pipeline = test_pipeline(&test_config(), provider.clone(), FakeMuxMode::CopyAudio, Some(8.0));
    let request = request(dir.path(), TWO_CUE_SRT);

    let outcome = pipeline.run(&request, None).await.unwrap();

    assert_eq!(provider.request_count(), 2);
    assert_eq!(outcome.synthesized, 0);
    assert_eq!(outcome.silent, 2);
    assert_eq!(outcome.track_duration, 8.0);
    assert!(is_silent_track(&request.output_path, 8.0));
}

#[tokio::test]
async fn test_run_withUndersizedArtifact_shouldFailAsMuxFailedAndRemoveIt() {
    let dir = create_temp_dir().unwrap();
    let pipeline = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::Tiny, Some(4.0));
    let request = request(dir.path(), TWO_CUE_SRT);
    let (sender, receiver) = mpsc::unbounded_channel();

    let error = pipeline.run(&request, Some(&sender)).await.unwrap_err();

    assert!(matches!(error, DubError::MuxFailed(MuxError::Undersized { size: 4, min: 1024 })));
    assert!(!request.output_path.exists());

    drop(sender);
    let events = drain(receiver);
    assert_eq!(
        events.last(),
        Some(&JobEvent::Failed {
            class: FailureClass::MuxFailed,
            reason: "the dubbed video could not be produced".to_string(),
        })
    );
}

#[tokio::test]
async fn test_run_withMuxerFailingAfterPartialWrite_shouldRemoveOutput() {
    let dir = create_temp_dir().unwrap();
    let pipeline = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::PartialThenFail, Some(4.0));
    let request = request(dir.path(), TWO_CUE_SRT);

    let error = pipeline.run(&request, None).await.unwrap_err();

    assert!(matches!(error, DubError::MuxFailed(MuxError::Command(_))));
    assert!(!request.output_path.exists());
}

#[tokio::test]
async fn test_run_withMalformedReplyForOneCue_shouldSucceedWithThatCueSilent() {
    let dir = create_temp_dir().unwrap();
    let provider = MockProvider::malformed(2);
    let pipeline = test_pipeline(&test_config(), provider.clone(), FakeMuxMode::CopyAudio, Some(6.0));
    let request = request(dir.path(), TWO_CUE_SRT);

    let outcome = pipeline.run(&request, None).await.unwrap();

    assert_eq!(provider.request_count(), 2);
    assert_eq!(outcome.synthesized, 1);
    assert_eq!(outcome.silent, 1);

    let track = read_wav(&request.output_path);
    assert_eq!(track.frames(), 48_000);
    assert!(track.samples[..4_000].iter().any(|s| *s != 0.0));
    assert!(track.samples[16_000..].iter().all(|s| *s == 0.0));
}

#[tokio::test]
async fn test_run_withMuxerWritingNothing_shouldFailAsMuxFailed() {
    let dir = create_temp_dir().unwrap();
    let pipeline = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::Nothing, Some(4.0));

    let error = pipeline.run(&request(dir.path(), TWO_CUE_SRT), None).await.unwrap_err();

    assert!(matches!(error, DubError::MuxFailed(MuxError::Missing(_))));
}

#[tokio::test]
async fn test_run_withNoUsableCues_shouldFailAsParseDegraded() {
    let dir = create_temp_dir().unwrap();
    let provider = MockProvider::working();
    let pipeline = test_pipeline(&test_config(), provider.clone(), FakeMuxMode::CopyAudio, Some(4.0));
    let (sender, receiver) = mpsc::unbounded_channel();

    let error = pipeline
        .run(&request(dir.path(), "this is not a subtitle file"), Some(&sender))
        .await
        .unwrap_err();

    assert_eq!(error.class(), FailureClass::ParseDegraded);
    assert_eq!(provider.request_count(), 0);

    drop(sender);
    let events = drain(receiver);
    assert_eq!(events.first(), Some(&JobEvent::Parsed { cues: 0 }));
    assert!(matches!(events.last(), Some(JobEvent::Failed { class: FailureClass::ParseDegraded, .. })));
}

#[tokio::test]
async fn test_run_withMissingVideo_shouldFailAsUpstreamFailed() {
    let dir = create_temp_dir().unwrap();
    let pipeline = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::CopyAudio, Some(4.0));
    let request = DubRequest {
        video_path: dir.path().join("nope.mp4"),
        subtitle_text: TWO_CUE_SRT.to_string(),
        output_path: dir.path().join("nope.dubbed.mp4"),
    };

    let error = pipeline.run(&request, None).await.unwrap_err();

    assert_eq!(error.class(), FailureClass::UpstreamFailed);
}

#[tokio::test]
async fn test_run_withUnknownDuration_shouldUseFallback() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config();
    config.media.fallback_duration_secs = 5.0;
    let pipeline = test_pipeline(&config, MockProvider::failing(), FakeMuxMode::CopyAudio, None);
    let request = request(dir.path(), TWO_CUE_SRT);

    let outcome = pipeline.run(&request, None).await.unwrap();

    assert_eq!(outcome.video_duration, 5.0);
    assert!(is_silent_track(&request.output_path, 5.0));
}

#[tokio::test]
async fn test_run_withCueCap_shouldLeaveLaterCuesSilent() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config();
    config.synthesis.max_cues = 1;
    let provider = MockProvider::working();
    let pipeline = test_pipeline(&config, provider.clone(), FakeMuxMode::CopyAudio, Some(6.0));

    let outcome = pipeline.run(&request(dir.path(), TWO_CUE_SRT), None).await.unwrap();

    assert_eq!(provider.request_count(), 1);
    assert_eq!(outcome.synthesized, 1);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn test_run_withAnyOutcome_shouldRemoveJobWorkspace() {
    let dir = create_temp_dir().unwrap();
    let workspaces = create_temp_dir().unwrap();

    let ok = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::CopyAudio, Some(4.0))
        .with_workspace_root(workspaces.path());
    ok.run(&request(dir.path(), TWO_CUE_SRT), None).await.unwrap();
    assert_eq!(std::fs::read_dir(workspaces.path()).unwrap().count(), 0);

    let failing = test_pipeline(&test_config(), MockProvider::working(), FakeMuxMode::Tiny, Some(4.0))
        .with_workspace_root(workspaces.path());
    failing.run(&request(dir.path(), TWO_CUE_SRT), None).await.unwrap_err();
    assert_eq!(std::fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[test]
fn test_dub_job_withFreshWorkspace_shouldStartCreatedAndCleanUpOnDrop() {
    let root = create_temp_dir().unwrap();
    let job = DubJob::create_in(root.path()).unwrap();
    let workspace = job.workspace().to_path_buf();

    assert_eq!(job.stage(), JobStage::Created);
    assert!(workspace.is_dir());
    assert!(workspace
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(&format!("subdub-{}-", job.id())));

    drop(job);
    assert!(!workspace.exists());
}

#[test]
fn test_dub_job_create_withDefaultRoot_shouldUseSystemTempDir() {
    let job = DubJob::create().unwrap();

    assert_eq!(job.workspace().parent(), Some(std::env::temp_dir().as_path()));
    assert_eq!(job.stage(), JobStage::Created);
}
