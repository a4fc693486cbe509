use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use story_mixer_core::{
    AppConfig, CueExtractor, ElevenLabsEffects, GeminiNarrator, MixReport, Mixer, StoryGenerator,
    TimingEstimator,
};
use tracing_subscriber::EnvFilter;

fn main() -> story_mixer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.output_dir)?;

    match cli.command {
        Commands::Parse { story } => run_parse(&config, &story),
        Commands::Generate(args) => run_generate(&config, &args),
        Commands::Mix { timeline, output } => {
            run_mix(&config, timeline.as_deref(), output.as_deref()).map(|_| ())
        }
        Commands::Run(args) => {
            run_generate(&config, &args)?;
            run_mix(&config, None, None).map(|_| ())
        }
    }
}

fn load_config(
    path: Option<&Path>,
    output_dir: Option<PathBuf>,
) -> story_mixer_core::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.mixer.output_dir = dir;
    }
    config.validate()?;
    Ok(config)
}

fn run_parse(config: &AppConfig, story: &Path) -> story_mixer_core::Result<()> {
    let text = std::fs::read_to_string(story)?;
    let mut extracted = CueExtractor::new()?.extract(&text);
    TimingEstimator::new(config.timing.clone()).estimate(&extracted.clean_text, &mut extracted.cues);

    println!("{}", serde_json::to_string_pretty(&extracted)?);
    Ok(())
}

fn run_generate(config: &AppConfig, args: &GenerateArgs) -> story_mixer_core::Result<()> {
    tracing::info!(story = ?args.story, output_dir = ?config.mixer.output_dir, "generating story assets");
    let text = std::fs::read_to_string(&args.story)?;

    let mut config = config.clone();
    if let Some(voice) = &args.voice {
        config.generation.voice = voice.clone();
    }
    let narrator = GeminiNarrator::new(&args.gemini_key, &config.generation)?;
    let effects = ElevenLabsEffects::new(&args.elevenlabs_key, &config.generation)?;
    let generator = StoryGenerator::new(&config, narrator, effects)?;

    let gain_db = args.gain_db.unwrap_or(config.generation.default_gain_db);
    let report = generator.process_with_gain(&text, gain_db)?;

    println!("Timeline saved to {}", report.timeline_path.display());
    for description in &report.failed {
        println!("  no sound effect for '{description}'");
    }
    Ok(())
}

fn run_mix(
    config: &AppConfig,
    timeline: Option<&str>,
    output: Option<&str>,
) -> story_mixer_core::Result<MixReport> {
    let mixer = Mixer::new(config.mixer.clone());
    let timeline = timeline.unwrap_or(&config.mixer.timeline_file);
    let output = output.unwrap_or(&config.mixer.output_file);

    let report = mixer.mix_file(timeline, output)?;

    for warning in &report.warnings {
        println!(
            "  Warning: skipped '{}' ({}): {}",
            warning.description,
            warning.path.display(),
            warning.reason
        );
    }
    for cue in &report.applied {
        println!("  -> mixed '{}' at {}s", cue.description, cue.at_seconds);
    }
    if let Some(path) = &report.output_path {
        println!(
            "Mixed {}/{} cues, {:.2}s. Saved to: {}",
            report.cues_mixed(),
            report.cues_total,
            report.duration_seconds,
            path.display()
        );
    }
    Ok(report)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Narrated stories with timed sound effects", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding narration, effects, timeline and the final mix.
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the de-annotated text and timed cues of a story as JSON.
    Parse {
        /// Annotated story text file.
        story: PathBuf,
    },
    /// Generate narration and sound effects and write the mixer timeline.
    Generate(GenerateArgs),
    /// Mix a timeline into the final audio file.
    Mix {
        /// Timeline file name inside the output directory.
        #[arg(short, long)]
        timeline: Option<String>,
        /// Output WAV file name inside the output directory.
        #[arg(long)]
        output: Option<String>,
    },
    /// Generate, then mix.
    Run(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Annotated story text file.
    story: PathBuf,
    /// Gain in dB written for every sound effect.
    #[arg(long, allow_hyphen_values = true)]
    gain_db: Option<f64>,
    /// Prebuilt narration voice.
    #[arg(long)]
    voice: Option<String>,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_key: String,
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    elevenlabs_key: String,
}
