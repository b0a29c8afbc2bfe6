/*!
 * Tests for cue parsing
 */

use std::fmt::Write;
use subdub::subtitle_processor::{parse_time, Cue, CueParser, Dialect, CUE_TIME_SEPARATOR};

use crate::common::TWO_CUE_SRT;

fn parse(content: &str) -> Vec<Cue> {
    CueParser::default().parse(content)
}

#[test]
fn test_parse_withTwoIndexedCues_shouldMatchExpectedCues() {
    let cues = parse(TWO_CUE_SRT);

    assert_eq!(
        cues,
        vec![Cue::new(1, 0.0, 2.0, "Hello"), Cue::new(2, 2.0, 4.0, "World")]
    );
}

#[test]
fn test_parse_withWellFormedInput_shouldEmitOneCuePerSeparatorLine() {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nOne\n\n\
                   2\n00:00:03,000 --> 00:00:04,500\nTwo\nlines\n\n\
                   3\n00:01:00,250 --> 00:01:02,000\nThree\n";
    let separators = content.lines().filter(|l| l.contains(CUE_TIME_SEPARATOR)).count();

    let cues = parse(content);

    assert_eq!(cues.len(), separators);
    assert_eq!(cues[1].text, "Two\nlines");
    assert_eq!(cues[2].start, 60.25);
}

#[test]
fn test_parse_withBareDialect_shouldJoinLinesWithSpaces() {
    let content = "00:00:01.000 --> 00:00:02.000\nline one\nline two\n\n00:00:03.000 --> 00:00:04.000\nnext\n";
    assert_eq!(Dialect::detect(content), Dialect::Bare);

    let cues = parse(content);

    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].text, "line one line two");
    assert_eq!(cues[1].start, 3.0);
}

#[test]
fn test_parse_withForcedDialect_shouldOverrideDetection() {
    let cues = CueParser::new(Dialect::Bare).parse("1\n00:00:00,000 --> 00:00:01,000\nA\nB\n");
    assert_eq!(cues[0].text, "A B");

    let cues = CueParser::new(Dialect::Indexed).parse("00:00:00.000 --> 00:00:01.000\nA\nB\n");
    assert_eq!(cues[0].text, "A\nB");
}

#[test]
fn test_parse_withWebVttCueSettings_shouldIgnoreSettings() {
    let content = "WEBVTT\n\n00:01.000 --> 00:02.500 align:start position:10%\nHi there\n";

    let cues = parse(content);

    assert_eq!(cues, vec![Cue::new(1, 1.0, 2.5, "Hi there")]);
}

#[test]
fn test_parse_withCrlfAndBom_shouldParseNormally() {
    let content = "\u{feff}1\r\n00:00:00,500 --> 00:00:01,000\r\nHey\r\n\r\n";

    let cues = parse(content);

    assert_eq!(cues, vec![Cue::new(1, 0.5, 1.0, "Hey")]);
}

#[test]
fn test_parse_withMalformedStart_shouldDegradeToZero() {
    let cues = parse("1\nabc --> 00:00:02,000\nText\n");

    assert_eq!(cues, vec![Cue::new(1, 0.0, 2.0, "Text")]);
}

#[test]
fn test_parse_withInvalidRangesAndEmptyText_shouldDropThoseCues() {
    let content = "1\n00:00:05,000 --> 00:00:02,000\nBackwards\n\n\
                   2\n00:00:06,000 --> 00:00:07,000\n\n\
                   3\n00:00:08,000 --> 00:00:09,000\nKept\n";

    let cues = parse(content);

    assert_eq!(cues, vec![Cue::new(1, 8.0, 9.0, "Kept")]);
}

#[test]
fn test_parse_withOutOfOrderAndOverlappingCues_shouldKeepSourceOrder() {
    let content = "1\n00:00:05,000 --> 00:00:08,000\nLate\n\n\
                   2\n00:00:01,000 --> 00:00:06,000\nEarly\n";

    let cues = parse(content);

    assert_eq!(cues[0].text, "Late");
    assert_eq!(cues[1].text, "Early");
    assert!(cues[0].overlaps(&cues[1]));
}

#[test]
fn test_parse_withGarbage_shouldReturnNoCues() {
    assert!(parse("").is_empty());
    assert!(parse("just some prose\nwithout any timing\n").is_empty());
}

#[test]
fn test_parse_time_withVariousFormats_shouldReturnSeconds() {
    assert!((parse_time("01:23:45,678") - 5025.678).abs() < 1e-9);
    assert_eq!(parse_time("00:00:01.5"), 1.5);
    assert_eq!(parse_time("02:03.250"), 123.25);
    assert_eq!(parse_time("00:61:00,000"), 0.0);
    assert_eq!(parse_time("nonsense"), 0.0);
}

#[test]
fn test_cue_display_withValidCue_shouldFormatAsSrt() {
    let cue = Cue::new(3, 61.234, 65.432, "Hello\nWorld");
    let mut output = String::new();
    write!(output, "{}", cue).unwrap();

    assert_eq!(output, "3\n00:01:01,234 --> 00:01:05,432\nHello\nWorld\n\n");
    assert!((cue.duration() - 4.198).abs() < 1e-9);
}
