// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use subdub::app_config::{self, Config, OverlapPolicy, SpeechProviderKind};
use subdub::app_controller::Controller;

/// CLI Wrapper for SpeechProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSpeechProvider {
    Google,
    #[value(name = "openai")]
    OpenAI,
}

impl From<CliSpeechProvider> for SpeechProviderKind {
    fn from(cli_provider: CliSpeechProvider) -> Self {
        match cli_provider {
            CliSpeechProvider::Google => SpeechProviderKind::Google,
            CliSpeechProvider::OpenAI => SpeechProviderKind::OpenAI,
        }
    }
}

/// CLI Wrapper for OverlapPolicy to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOverlapPolicy {
    Additive,
    LastWins,
    Reject,
}

impl From<CliOverlapPolicy> for OverlapPolicy {
    fn from(cli_policy: CliOverlapPolicy) -> Self {
        match cli_policy {
            CliOverlapPolicy::Additive => OverlapPolicy::Additive,
            CliOverlapPolicy::LastWins => OverlapPolicy::LastWins,
            CliOverlapPolicy::Reject => OverlapPolicy::Reject,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Options shared by every command that runs dub jobs
#[derive(Args, Debug, Clone)]
struct JobOptions {
    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Speech provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliSpeechProvider>,

    /// Language code of the subtitles (e.g., 'en', 'ar', 'fr')
    #[arg(long)]
    language: Option<String>,

    /// How overlapping cues are mixed
    #[arg(long, value_enum)]
    overlap_policy: Option<CliOverlapPolicy>,

    /// Maximum number of cues sent to the provider per video
    #[arg(long)]
    max_cues: Option<usize>,

    /// Seed for reproducible voice assignment
    #[arg(long)]
    seed: Option<u64>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dub a single video from a subtitle file
    Dub {
        /// Input video file
        #[arg(value_name = "VIDEO")]
        video: PathBuf,

        /// Subtitle file (SRT, WebVTT or bare cue blocks)
        #[arg(value_name = "SUBTITLE")]
        subtitle: PathBuf,

        /// Output file, defaults to <stem>.dubbed.<ext> beside the video
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: JobOptions,
    },

    /// Dub every video in a directory that has a subtitle file with the same name
    Folder {
        /// Directory to scan recursively
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        options: JobOptions,
    },

    /// Generate shell completions for subdub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// SubDub - subtitle-driven voice dubbing
///
/// Reads a subtitle file, speaks every line with a synthetic voice and
/// replaces the audio track of the video with the result.
#[derive(Parser, Debug)]
#[command(name = "subdub")]
#[command(version = "0.1.0")]
#[command(about = "Subtitle-driven voice dubbing tool")]
#[command(long_about = "SubDub speaks the lines of a subtitle file and muxes the result into the video.

EXAMPLES:
    subdub dub movie.mp4 movie.srt                  # Dub using default config
    subdub dub -f movie.mp4 movie.srt               # Overwrite an existing output
    subdub dub -p openai movie.mp4 movie.vtt        # Use the OpenAI speech API
    subdub dub --seed 7 movie.mp4 movie.srt         # Reproducible voice assignment
    subdub folder /movies/                          # Dub every video with a matching subtitle
    subdub completions bash > subdub.bash           # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    google - Google Translate TTS (no key required)
    openai - OpenAI-compatible speech API (requires API key)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(LevelFilter::Trace)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => " ",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subdub", &mut std::io::stdout());
            Ok(())
        }
        Commands::Dub {
            video,
            subtitle,
            output,
            options,
        } => {
            let controller = Controller::with_config(load_config(&options)?)?;
            controller
                .run(video, subtitle, output, options.force_overwrite)
                .await?;
            Ok(())
        }
        Commands::Folder { dir, options } => {
            let controller = Controller::with_config(load_config(&options)?)?;
            let summary = controller.run_folder(dir, options.force_overwrite).await?;
            if summary.failed > 0 {
                return Err(anyhow::anyhow!("{} video(s) could not be dubbed", summary.failed));
            }
            Ok(())
        }
    }
}

/// Load or create the config file, apply CLI overrides and validate
fn load_config(options: &JobOptions) -> Result<Config> {
    // A CLI log level applies before the config is even read
    if let Some(level) = &options.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(provider) = &options.provider {
        config.synthesis.provider = provider.clone().into();
    }
    if let Some(language) = &options.language {
        config.synthesis.language = language.clone();
    }
    if let Some(policy) = &options.overlap_policy {
        config.timeline.overlap_policy = policy.clone().into();
    }
    if let Some(max_cues) = options.max_cues {
        config.synthesis.max_cues = max_cues;
    }
    if let Some(seed) = options.seed {
        config.voice.seed = Some(seed);
    }
    if let Some(level) = &options.log_level {
        config.log_level = level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    Ok(config)
}
