//! Meeting Analyzer CLI - turns a recorded meeting into SRS documents.
//!
//! Usage:
//!   meeting-analyzer --video meeting.mp4 --project "Customer Portal"
//!   meeting-analyzer --video meeting.mp4 --profile pc --max-analyze 20
//!   meeting-analyzer --list-profiles

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use clap::Parser;

use mtg_core::config::{resolve_settings, ConfigManager, Overrides, Profile, Settings};
use mtg_core::frames::FfmpegDecoder;
use mtg_core::logging::{init_tracing, LogLevel};
use mtg_core::orchestrator::{Orchestrator, RunContext, RunStatus, Services};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "meeting-analyzer")]
#[command(version)]
#[command(about = "Analyze a meeting recording and generate a requirements document")]
#[command(long_about = "Extracts key frames and the transcript of a meeting video, \
    analyzes them with a local model server (LM Studio or any OpenAI-compatible \
    endpoint) and writes an SRS document.\n\n\
    EXAMPLES:\n    \
    meeting-analyzer --video meeting.mp4\n    \
    meeting-analyzer --video meeting.mp4 --project \"Customer Portal\" --profile pc\n    \
    meeting-analyzer --video meeting.mp4 --no-key-frames --interval 30")]
struct Args {
    /// Path to the meeting video
    #[arg(long, required_unless_present = "list_profiles")]
    video: Option<PathBuf>,

    /// Project name used in document titles and file names
    #[arg(long, default_value = "Meeting Project")]
    project: String,

    /// Output directory (default: from config, else "output")
    #[arg(long)]
    output: Option<String>,

    /// Hardware profile (laptop, pc)
    #[arg(long)]
    profile: Option<Profile>,

    /// TOML config file (created with defaults if missing)
    #[arg(long)]
    config: Option<PathBuf>,

    /// LM Studio base URL
    #[arg(long, env = "LM_STUDIO_URL")]
    lm_studio_url: Option<String>,

    /// Model for transcript analysis and requirements
    #[arg(long, env = "LM_STUDIO_MODEL")]
    text_model: Option<String>,

    /// Model for frame descriptions
    #[arg(long, env = "LM_STUDIO_VISION_MODEL")]
    vision_model: Option<String>,

    /// Whisper model name sent to the transcription service
    #[arg(long, env = "WHISPER_MODEL")]
    whisper_model: Option<String>,

    /// Transcription service base URL
    #[arg(long, env = "TRANSCRIPTION_URL")]
    transcription_url: Option<String>,

    /// Seconds between frames in interval mode
    #[arg(long)]
    interval: Option<f64>,

    /// Use evenly spaced frames instead of scene-change detection
    #[arg(long)]
    no_key_frames: bool,

    /// Maximum number of key frames to extract
    #[arg(long)]
    max_frames: Option<u32>,

    /// Maximum number of frames sent to the vision model
    #[arg(long)]
    max_analyze: Option<u32>,

    /// Scene-change threshold (0-255)
    #[arg(long)]
    threshold: Option<f64>,

    /// List hardware profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            output_folder: self.output.clone(),
            lm_studio_url: self.lm_studio_url.clone(),
            text_model: self.text_model.clone(),
            vision_model: self.vision_model.clone(),
            whisper_model: self.whisper_model.clone(),
            transcription_url: self.transcription_url.clone(),
            interval_secs: self.interval,
            interval_mode: self.no_key_frames,
            max_key_frames: self.max_frames,
            max_frames_to_analyze: self.max_analyze,
            threshold: self.threshold,
        }
    }
}

fn print_profiles() {
    println!("Available profiles:");
    for profile in Profile::ALL {
        println!("  {:<8} {}", profile.name(), profile.description());
        println!("           whisper: {}", profile.whisper_model());
        println!("           vision:  {}", profile.vision_model());
        println!("           text:    {}", profile.text_model());
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let base = match &args.config {
        Some(path) => {
            let mut manager = ConfigManager::new(path);
            manager
                .load_or_create()
                .with_context(|| format!("loading config {}", path.display()))?;
            manager.into_settings()
        }
        None => Settings::default(),
    };
    resolve_settings(base, args.profile, &args.overrides()).context("resolving settings")
}

fn run(args: Args) -> Result<bool> {
    let Some(video) = args.video.clone() else {
        bail!("--video is required");
    };
    if !video.is_file() {
        bail!("video file not found: {}", video.display());
    }

    let settings = load_settings(&args)?;
    init_tracing(if args.verbose {
        LogLevel::Debug
    } else {
        settings.logging.level
    });

    println!("Meeting Analyzer v{}", mtg_core::version());
    println!("  Video:   {}", video.display());
    println!("  Project: {}", args.project);
    println!("  Output:  {}", settings.paths.output_folder);
    if let Some(profile) = args.profile {
        println!("  Profile: {} ({})", profile, profile.description());
    }
    println!(
        "  Models:  text {}, vision {}, whisper {}",
        settings.inference.text_model, settings.inference.vision_model, settings.transcription.model
    );
    if settings.inference.vision_on_cpu {
        println!("  Note:    vision model runs on CPU; frame analysis will be slow");
    }
    println!();

    if !FfmpegDecoder::new(&settings.paths.ffmpeg, &settings.paths.ffprobe).is_available() {
        eprintln!(
            "Warning: '{}' is not runnable; frame extraction and transcription will fail",
            settings.paths.ffmpeg
        );
    }

    let services = Services::from_settings(&settings)?;
    let ctx = RunContext::new(settings, &args.project, &video, services)?;
    if let Some(path) = ctx.logger.log_path() {
        println!("Run log: {}", path.display());
    }

    let mut orchestrator = Orchestrator::new();
    let console = orchestrator
        .subscribe_callback(|event| println!("{}", event.display_line()))
        .context("starting progress listener")?;

    let outcome = orchestrator.run(&ctx);
    console.join();

    println!();
    print!("{}", outcome.summary.render());
    if !outcome.summary.files.is_empty() {
        println!();
        println!("Generated files:");
        for file in &outcome.summary.files {
            println!("  {}", file.display());
        }
    }
    if let Some(path) = &outcome.results_path {
        println!("Results: {}", path.display());
    }

    Ok(outcome.state.status == RunStatus::Completed)
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.list_profiles {
        print_profiles();
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
