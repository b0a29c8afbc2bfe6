use std::fmt;
use log::{warn, debug};
use serde::{Deserialize, Serialize};

// @module: Timed-text cue parsing

// @const: Token separating start and end timestamps
pub const CUE_TIME_SEPARATOR: &str = "-->";

// @struct: Single timed cue
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    // @field: 1-based ordinal, informational only
    pub index: usize,

    // @field: Start time in seconds
    pub start: f64,

    // @field: End time in seconds
    pub end: f64,

    // @field: Cue text, lines joined per dialect
    pub text: String,
}

impl Cue {
    pub fn new(index: usize, start: f64, end: f64, text: impl Into<String>) -> Self {
        Cue {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    /// Length of the cue in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether two cues share any time
    pub fn overlaps(&self, other: &Cue) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
    pub fn format_timestamp(seconds: f64) -> String {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1_000;
        let millis = total_ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", Self::format_timestamp(self.start), Self::format_timestamp(self.end))?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Timed-text dialect understood by the parser
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Pick `Indexed` or `Bare` by looking at the content
    #[default]
    Auto,
    /// Classic SRT: sequence numbers, multi-line text joined with newlines
    Indexed,
    /// Bare timestamp lines followed by text joined with spaces
    Bare,
}

impl Dialect {
    /// Resolve `Auto` against concrete content.
    ///
    /// Content is indexed when an integer line directly precedes a separator line.
    pub fn detect(content: &str) -> Dialect {
        let mut previous_was_index = false;
        for line in content.lines() {
            let trimmed = clean_line(line);
            if previous_was_index && trimmed.contains(CUE_TIME_SEPARATOR) {
                return Dialect::Indexed;
            }
            previous_was_index = is_index_line(trimmed);
        }
        Dialect::Bare
    }

    fn line_joiner(self) -> &'static str {
        match self {
            Dialect::Bare => " ",
            _ => "\n",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Auto => "auto",
            Dialect::Indexed => "indexed",
            Dialect::Bare => "bare",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Dialect::Auto),
            "indexed" | "srt" => Ok(Dialect::Indexed),
            "bare" => Ok(Dialect::Bare),
            _ => Err(anyhow::anyhow!("Invalid subtitle dialect: {}", s)),
        }
    }
}

// @struct: Cue under construction
struct OpenCue {
    start: f64,
    end: f64,
    lines: Vec<String>,
}

/// Line-oriented cue parser.
///
/// Parsing never fails: malformed lines are skipped or degrade to a `0.0`
/// timestamp, so bad input yields fewer cues rather than an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct CueParser {
    dialect: Dialect,
}

impl CueParser {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse timed-text content into cues in source order
    pub fn parse(&self, content: &str) -> Vec<Cue> {
        let dialect = match self.dialect {
            Dialect::Auto => Dialect::detect(content),
            concrete => concrete,
        };
        let joiner = dialect.line_joiner();

        let mut cues = Vec::new();
        let mut open: Option<OpenCue> = None;

        for (line_number, line) in content.lines().enumerate() {
            let trimmed = clean_line(line);

            if trimmed.is_empty() {
                if let Some(cue) = open.take() {
                    Self::emit(cue, joiner, &mut cues);
                }
                continue;
            }

            if trimmed.contains(CUE_TIME_SEPARATOR) {
                if let Some(cue) = open.take() {
                    Self::emit(cue, joiner, &mut cues);
                }
                let (start, end) = Self::parse_time_range(trimmed, line_number + 1);
                open = Some(OpenCue { start, end, lines: Vec::new() });
                continue;
            }

            match open.as_mut() {
                Some(cue) => cue.lines.push(trimmed.to_string()),
                None if is_index_line(trimmed) => {}
                None => debug!("Ignoring line {} outside of a cue: {}", line_number + 1, trimmed),
            }
        }

        if let Some(cue) = open.take() {
            Self::emit(cue, joiner, &mut cues);
        }

        cues
    }

    fn emit(cue: OpenCue, joiner: &str, cues: &mut Vec<Cue>) {
        let text = cue.lines.join(joiner);
        if text.trim().is_empty() {
            warn!("Skipping cue at {} with no text", Cue::format_timestamp(cue.start));
            return;
        }
        if cue.end <= cue.start {
            warn!(
                "Skipping cue with invalid time range: end {:.3}s <= start {:.3}s",
                cue.end, cue.start
            );
            return;
        }
        let index = cues.len() + 1;
        cues.push(Cue::new(index, cue.start, cue.end, text));
    }

    fn parse_time_range(line: &str, line_number: usize) -> (f64, f64) {
        let mut parts = line.splitn(2, CUE_TIME_SEPARATOR);
        let start_raw = parts.next().unwrap_or_default().trim();
        // WebVTT allows cue settings after the end timestamp
        let end_raw = parts
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default();

        if start_raw.is_empty() || end_raw.is_empty() {
            warn!("Incomplete time range at line {}: {}", line_number, line);
        }

        (parse_time(start_raw), parse_time(end_raw))
    }
}

/// Parse `HH:MM:SS[.,]mmm` (or `MM:SS[.,]mmm`) into seconds.
///
/// Returns `0.0` for anything malformed.
pub fn parse_time(timestamp: &str) -> f64 {
    match try_parse_time(timestamp) {
        Some(seconds) => seconds,
        None => {
            warn!("Invalid timestamp format: '{}', using 0.0", timestamp);
            0.0
        }
    }
}

fn try_parse_time(timestamp: &str) -> Option<f64> {
    let parts: Vec<&str> = timestamp.trim().split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *s),
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };

    if minutes >= 60 || seconds.is_empty() || !seconds.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let seconds: f64 = seconds.replace(',', ".").parse().ok()?;
    if seconds >= 60.0 {
        return None;
    }

    Some((hours * 3600 + minutes * 60) as f64 + seconds)
}

// Byte-order marks survive `trim`, strip them too
fn clean_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

fn is_index_line(line: &str) -> bool {
    !line.is_empty() && line.parse::<u64>().is_ok()
}
