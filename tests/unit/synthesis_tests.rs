/*!
 * Tests for the synthesis adapter
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use subdub::app_config::{SynthesisConfig, VoiceConfig};
use subdub::errors::ProviderError;
use subdub::providers::mock::MockProvider;
use subdub::subtitle_processor::Cue;
use subdub::synthesis::{check_audio, SynthesisAdapter};
use subdub::voice::VoiceProfile;

use crate::common::tone_wav;

fn fast_config() -> SynthesisConfig {
    SynthesisConfig {
        rate_limit_delay_ms: 0,
        timeout_secs: 1,
        ..SynthesisConfig::default()
    }
}

fn adapter(provider: &MockProvider, config: &SynthesisConfig) -> SynthesisAdapter {
    SynthesisAdapter::new(Arc::new(provider.clone()), config, VoiceConfig::default())
}

fn assignments(count: usize) -> Vec<(Cue, VoiceProfile)> {
    (1..=count)
        .map(|i| {
            let start = i as f64;
            (Cue::new(i, start, start + 0.5, format!("Line number {}", i)), VoiceProfile::Female)
        })
        .collect()
}

#[tokio::test]
async fn test_synthesize_all_withMoreCuesThanCap_shouldCallProviderOnlyUpToCap() {
    let provider = MockProvider::working().with_tone_seconds(0.05);
    let adapter = adapter(&provider, &fast_config());
    assert_eq!(adapter.max_cues(), 50);

    let report = adapter.synthesize_all(assignments(60), |_, _| {}).await;

    assert_eq!(provider.request_count(), 50);
    assert_eq!(report.clips.len(), 60);
    assert_eq!(report.synthesized, 50);
    assert_eq!(report.skipped, 10);
    assert!(report.clips[50..].iter().all(|clip| clip.is_silent()));
    assert_eq!(report.clips[59].cue.index, 60);
}

#[tokio::test]
async fn test_synthesize_all_withIntermittentFailures_shouldFillGapsWithSilence() {
    let provider = MockProvider::intermittent(2).with_tone_seconds(0.05);
    let adapter = adapter(&provider, &fast_config());

    let report = adapter.synthesize_all(assignments(4), |_, _| {}).await;

    assert_eq!(report.synthesized, 2);
    assert_eq!(report.failed, 2);
    let silent: Vec<bool> = report.clips.iter().map(|clip| clip.is_silent()).collect();
    assert_eq!(silent, vec![false, true, false, true]);
}

#[tokio::test]
async fn test_synthesize_withEmptyAudio_shouldReturnSilentClip() {
    let provider = MockProvider::empty();
    let adapter = adapter(&provider, &fast_config());
    let cue = Cue::new(1, 0.0, 1.0, "Nothing comes back");

    let clip = adapter.synthesize(&cue, VoiceProfile::Male).await;

    assert!(clip.is_silent());
    assert_eq!(clip.cue, cue);
    assert_eq!(clip.profile, VoiceProfile::Male);

    let error = adapter.try_synthesize(&cue.text, VoiceProfile::Male).await.unwrap_err();
    assert!(matches!(error, ProviderError::EmptyAudio(_)));
}

#[tokio::test]
async fn test_synthesize_withHtmlInsteadOfAudio_shouldReturnSilentClip() {
    let provider = MockProvider::malformed(1);
    let adapter = adapter(&provider, &fast_config());
    let cue = Cue::new(1, 0.0, 1.0, "Served a captcha page");

    let error = adapter.try_synthesize(&cue.text, VoiceProfile::Female).await.unwrap_err();
    assert!(matches!(error, ProviderError::MalformedAudio(_)));

    let clip = adapter.synthesize(&cue, VoiceProfile::Female).await;
    assert!(clip.is_silent());
}

#[test]
fn test_check_audio_withKnownContainers_shouldAcceptOnlyPlayableAudio() {
    assert!(check_audio(&tone_wav(0.1)).is_ok());
    assert!(check_audio(b"ID3\x04\x00rest of an mp3").is_ok());
    assert!(check_audio(&[0xFF, 0xF3, 0x44, 0xC4]).is_ok());
    assert!(check_audio(b"OggS\x00\x02").is_ok());

    let truncated = tone_wav(0.1);
    assert!(check_audio(&truncated[..60]).is_err());
    assert!(check_audio(b"<html>captcha</html>").is_err());
    assert!(check_audio(b"{\"error\": \"quota\"}").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_synthesize_withSlowProvider_shouldTimeOutToSilence() {
    let provider = MockProvider::slow(5_000);
    let adapter = adapter(&provider, &fast_config());

    let error = adapter.try_synthesize("Too slow to wait for", VoiceProfile::Female).await.unwrap_err();
    assert!(matches!(error, ProviderError::Timeout(1)));

    let clip = adapter
        .synthesize(&Cue::new(1, 0.0, 1.0, "Too slow to wait for"), VoiceProfile::Female)
        .await;
    assert!(clip.is_silent());
}

#[tokio::test(start_paused = true)]
async fn test_synthesize_all_withConcurrency_shouldPreserveInputOrder() {
    let provider = MockProvider::slow(200).with_tone_seconds(0.05);
    let config = SynthesisConfig {
        concurrent_requests: 4,
        ..fast_config()
    };
    let adapter = adapter(&provider, &config);

    let report = adapter.synthesize_all(assignments(10), |_, _| {}).await;

    let indices: Vec<usize> = report.clips.iter().map(|clip| clip.cue.index).collect();
    assert_eq!(indices, (1..=10).collect::<Vec<_>>());
    assert_eq!(report.synthesized, 10);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_withDelay_shouldSpaceProviderCalls() {
    let provider = MockProvider::working().with_tone_seconds(0.05);
    let config = SynthesisConfig {
        rate_limit_delay_ms: 300,
        concurrent_requests: 3,
        ..fast_config()
    };
    let adapter = adapter(&provider, &config);
    let start = tokio::time::Instant::now();

    adapter.synthesize_all(assignments(4), |_, _| {}).await;

    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_synthesize_all_withProgressCallback_shouldReportEveryCall() {
    let provider = MockProvider::working().with_tone_seconds(0.05);
    let config = SynthesisConfig {
        max_cues: 3,
        ..fast_config()
    };
    let adapter = adapter(&provider, &config);
    let seen = Mutex::new(Vec::new());

    adapter
        .synthesize_all(assignments(5), |current, total| seen.lock().push((current, total)))
        .await;

    assert_eq!(*seen.lock(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn test_request_for_withProfile_shouldCarryRateAndLanguage() {
    let provider = MockProvider::working();
    let config = SynthesisConfig {
        language: "fre".to_string(),
        ..fast_config()
    };
    let adapter = adapter(&provider, &config);

    let request = adapter.request_for("Bonjour", VoiceProfile::Child);

    assert_eq!(request.language, "fr");
    assert_eq!(request.rate, VoiceConfig::default().child_rate);
    assert_eq!(request.profile, VoiceProfile::Child);
}

#[test]
fn test_try_synthesize_withFailingProvider_shouldReturnProviderError() {
    let provider = MockProvider::failing();
    let adapter = adapter(&provider, &fast_config());

    let result = tokio_test::block_on(adapter.try_synthesize("Nobody answers", VoiceProfile::Male));

    assert!(result.is_err());
    assert_eq!(provider.request_count(), 1);
}
