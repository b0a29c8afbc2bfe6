/*!
 * Tests for application configuration
 */

use std::str::FromStr;
use subdub::app_config::{Config, MixerBackend, OverlapPolicy, SpeechProviderKind};
use subdub::subtitle_processor::Dialect;
use subdub::voice::Script;

#[test]
fn test_default_config_withNoChanges_shouldValidate() {
    let config = Config::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.synthesis.provider, SpeechProviderKind::Google);
    assert_eq!(config.synthesis.max_cues, 50);
    assert_eq!(config.synthesis.rate_limit_delay_ms, 300);
    assert_eq!(config.timeline.overlap_policy, OverlapPolicy::Additive);
    assert_eq!(config.media.fallback_duration_secs, 60.0);
    assert_eq!(config.media.min_output_bytes, 1024);
}

#[test]
fn test_deserialize_withPartialJson_shouldFillDefaults() {
    let json = r#"{
        "synthesis": { "provider": "openai", "api_key": "sk-test", "language": "fa", "max_cues": 10 },
        "voice": { "script": "arabic", "seed": 9 },
        "timeline": { "overlap_policy": "last-wins", "mixer": "pcm" },
        "subtitle": { "dialect": "bare" }
    }"#;

    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.synthesis.language, "fa");
    assert_eq!(config.synthesis.max_cues, 10);
    assert_eq!(config.synthesis.timeout_secs, 20);
    assert_eq!(config.voice.script, Script::Arabic);
    assert_eq!(config.voice.seed, Some(9));
    assert_eq!(config.voice.short_text_threshold, 12);
    assert_eq!(config.timeline.overlap_policy, OverlapPolicy::LastWins);
    assert_eq!(config.timeline.mixer, MixerBackend::Pcm);
    assert_eq!(config.timeline.sample_rate, 44_100);
    assert_eq!(config.subtitle.dialect, Dialect::Bare);
    assert!(config.validate().is_ok());
}

#[test]
fn test_serialize_withDefaults_shouldRoundTripThroughJson() {
    let json = serde_json::to_string_pretty(&Config::default()).unwrap();
    let config: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(config.voice, Config::default().voice);
    assert!(json.contains("\"overlap_policy\": \"additive\""));
}

#[test]
fn test_validate_withGoogleAndPcmMixer_shouldFailNamingBothSettings() {
    let mut config = Config::default();
    config.timeline.mixer = MixerBackend::Pcm;

    let error = config.validate().unwrap_err().to_string();
    assert!(error.contains("timeline.mixer"));
    assert!(error.contains("synthesis.provider"));

    config.timeline.mixer = MixerBackend::Ffmpeg;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withOpenAiAndNoKey_shouldFail() {
    let mut config = Config::default();
    config.synthesis.provider = SpeechProviderKind::OpenAI;
    assert!(config.validate().is_err());

    config.synthesis.api_key = "sk-test".to_string();
    assert!(config.validate().is_ok());
    assert_eq!(config.synthesis.get_endpoint(), "https://api.openai.com/v1");
}

#[test]
fn test_validate_withInvalidValues_shouldFail() {
    let cases: Vec<fn(&mut Config)> = vec![
        |c| c.synthesis.language = "xx-invalid".to_string(),
        |c| c.synthesis.endpoint = "not a url".to_string(),
        |c| c.synthesis.max_cues = 0,
        |c| c.synthesis.concurrent_requests = 0,
        |c| c.synthesis.timeout_secs = 0,
        |c| {
            c.voice.female_weight = 0.0;
            c.voice.male_weight = 0.0;
            c.voice.child_weight = 0.0;
        },
        |c| c.voice.question_child_bias = 1.5,
        |c| c.voice.male_rate = 0.0,
        |c| c.timeline.sample_rate = 0,
        |c| c.timeline.channels = 6,
        |c| c.media.fallback_duration_secs = 0.0,
    ];

    for (i, mutate) in cases.into_iter().enumerate() {
        let mut config = Config::default();
        mutate(&mut config);
        assert!(config.validate().is_err(), "case {} should be rejected", i);
    }
}

#[test]
fn test_overlap_policy_fromStr_withKnownNames_shouldParse() {
    assert_eq!(OverlapPolicy::from_str("additive").unwrap(), OverlapPolicy::Additive);
    assert_eq!(OverlapPolicy::from_str("Last-Wins").unwrap(), OverlapPolicy::LastWins);
    assert_eq!(OverlapPolicy::from_str("reject").unwrap(), OverlapPolicy::Reject);
    assert!(OverlapPolicy::from_str("loudest").is_err());
    assert_eq!(OverlapPolicy::LastWins.to_string(), "last-wins");
}

#[test]
fn test_provider_fromStr_withKnownNames_shouldParse() {
    assert_eq!(SpeechProviderKind::from_str("google").unwrap(), SpeechProviderKind::Google);
    assert_eq!(SpeechProviderKind::from_str("OpenAI").unwrap(), SpeechProviderKind::OpenAI);
    assert!(SpeechProviderKind::from_str("polly").is_err());
}
