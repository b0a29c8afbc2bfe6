use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

/// Extensions treated as subtitle files, in lookup order
pub const SUBTITLE_EXTENSIONS: [&str; 3] = ["srt", "vtt", "txt"];

/// Common video container extensions handled by ffmpeg
pub const VIDEO_EXTENSIONS: [&str; 14] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
];

/// Marker infix of generated files
pub const OUTPUT_MARKER: &str = "dubbed";

// A timestamp pair as found on cue lines, with either decimal separator
static CUE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(\d{1,2}:)?\d{2}:\d{2}[.,]\d{1,3}\s*-->\s*(\d{1,2}:)?\d{2}:\d{2}[.,]\d{1,3}")
        .expect("cue line regex is valid")
});

/// Kinds of input files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle file (SRT, WebVTT or bare cue text)
    Subtitle,
    /// Video file supported by ffmpeg
    Video,
    /// Unknown file type
    Unknown,
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: `<stem>.dubbed.<ext>` next to the video, or in `output_dir`
    pub fn generate_output_path<P: AsRef<Path>>(video: P, output_dir: Option<&Path>) -> PathBuf {
        let video = video.as_ref();
        let stem = video.file_stem().unwrap_or_default().to_string_lossy();
        let extension = video
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_string());

        let file_name = format!("{}.{}.{}", stem, OUTPUT_MARKER, extension);
        match output_dir {
            Some(dir) => dir.join(file_name),
            None => video.with_file_name(file_name),
        }
    }

    /// Whether a path looks like one of our own outputs
    pub fn is_generated_output<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().ends_with(&format!(".{}", OUTPUT_MARKER)))
            .unwrap_or(false)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Subtitle file with the same stem as the video, if any
    pub fn find_subtitle_for_video<P: AsRef<Path>>(video: P) -> Option<PathBuf> {
        let video = video.as_ref();
        SUBTITLE_EXTENSIONS
            .iter()
            .map(|ext| video.with_extension(ext))
            .find(|candidate| candidate.is_file())
    }

    /// Video files under `dir`, sorted, excluding previously generated outputs
    pub fn find_videos<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && Self::has_extension(path, &VIDEO_EXTENSIONS) && !Self::is_generated_output(path) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    fn has_extension(path: &Path, extensions: &[&str]) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                extensions.iter().any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }

    /// Detect whether a file is a subtitle file or a video.
    ///
    /// Extensions decide first; otherwise a text file containing a cue line
    /// counts as a subtitle.
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {:?}", path));
        }

        if Self::has_extension(path, &["srt", "vtt"]) {
            return Ok(FileType::Subtitle);
        }
        if Self::has_extension(path, &VIDEO_EXTENSIONS) {
            return Ok(FileType::Video);
        }

        // Binary content fails UTF-8 decoding and stays unknown
        if let Ok(content) = fs::read_to_string(path) {
            if CUE_LINE_RE.is_match(&content) {
                return Ok(FileType::Subtitle);
            }
        }

        Ok(FileType::Unknown)
    }
}
