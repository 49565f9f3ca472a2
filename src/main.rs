use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use sarflow::{
    init_logging, CoherencePipeline, GptEngine, IntensityOutputs, IntensityPipeline,
    PipelineConfig, PipelineResult, ProjectPaths, RunLogger,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_PRE_EVENT: &str =
    "Inputs/pre_event/S1A_IW_SLC__1SDV_20240720T004052_20240720T004119_054837_06AD9C_26F2pre-event.zip";
const DEFAULT_POST_EVENT: &str =
    "Inputs/post_event/S1A_IW_SLC__1SDV_20240801T004052_20240801T004119_055012_06B3B7_C85Dpost-event.zip";
const DEFAULT_OUTPUT_DIR: &str = "Output";

#[derive(Debug, Parser)]
#[command(name = "sarflow", version, about = "Sentinel-1 intensity and coherence map processor")]
struct Cli {
    /// Logging level
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Test configuration
    Test,

    /// Run the complete pipeline: both intensity maps, then the coherence map
    ProcessAll {
        /// Pre-event SLC ZIP file (coherence master)
        #[arg(long, default_value = DEFAULT_PRE_EVENT)]
        pre_event: PathBuf,

        /// Post-event SLC ZIP file (coherence slave)
        #[arg(long, default_value = DEFAULT_POST_EVENT)]
        post_event: PathBuf,

        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Process the two intensity maps concurrently
        #[arg(long)]
        parallel: bool,
    },

    /// Generate intensity maps
    Intensity {
        /// Sentinel-1 SLC ZIP file
        slc_file: PathBuf,

        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },

    /// Generate coherence map
    Coherence {
        /// Master SLC ZIP file
        master_file: PathBuf,

        /// Slave SLC ZIP file
        slave_file: PathBuf,

        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level.into()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Processing failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    log::info!("SAR processor initialized successfully");

    match command {
        Command::Test => {
            let paths = ProjectPaths::from_base(std::env::current_dir()?);
            paths.ensure().context("Failed to create project directories")?;

            println!("Configuration test successful!");
            println!("Base directory: {}", paths.base_dir.display());
            println!("Inputs directory: {}", paths.inputs_dir.display());
            println!("Outputs directory: {}", paths.outputs_dir.display());
            println!("Logs directory: {}", paths.logs_dir.display());
            println!();
            print!("{}", config.to_toml()?);
        }

        Command::ProcessAll {
            pre_event,
            post_event,
            output_dir,
            parallel,
        } => {
            log::info!("Starting complete SAR processing pipeline...");
            let engine = engine(&config)?;

            let pre_context = || format!("Pre-event intensity failed: {}", pre_event.display());
            let post_context = || format!("Post-event intensity failed: {}", post_event.display());

            let (pre, post) = if parallel {
                let (pre, post) = rayon::join(
                    || intensity(&engine, &config, &pre_event, &output_dir),
                    || intensity(&engine, &config, &post_event, &output_dir),
                );
                (pre.with_context(pre_context)?, post.with_context(post_context)?)
            } else {
                let pre = intensity(&engine, &config, &pre_event, &output_dir).with_context(pre_context)?;
                let post = intensity(&engine, &config, &post_event, &output_dir).with_context(post_context)?;
                (pre, post)
            };
            log::info!("Pre-event intensity maps: {}, {}", file_name(&pre.vv), file_name(&pre.vh));
            log::info!("Post-event intensity maps: {}, {}", file_name(&post.vv), file_name(&post.vh));

            let coherence = coherence(&engine, &config, &pre_event, &post_event, &output_dir)
                .context("Coherence processing failed")?;
            log::info!("Coherence map: {}", file_name(&coherence));
            log::info!("Complete SAR processing pipeline finished!");
        }

        Command::Intensity { slc_file, output_dir } => {
            log::info!("Processing intensity maps for: {}", file_name(&slc_file));
            let engine = engine(&config)?;
            let outputs = intensity(&engine, &config, &slc_file, &output_dir)
                .with_context(|| format!("Intensity processing failed: {}", slc_file.display()))?;
            log::info!("Intensity maps created: {}, {}", file_name(&outputs.vv), file_name(&outputs.vh));
        }

        Command::Coherence {
            master_file,
            slave_file,
            output_dir,
        } => {
            log::info!(
                "Processing coherence map: {} + {}",
                file_name(&master_file),
                file_name(&slave_file)
            );
            let engine = engine(&config)?;
            let path = coherence(&engine, &config, &master_file, &slave_file, &output_dir)
                .context("Coherence processing failed")?;
            log::info!("Coherence map created: {}", file_name(&path));
        }
    }

    Ok(())
}

fn engine(config: &PipelineConfig) -> Result<GptEngine> {
    GptEngine::new(config.gpt.clone(), RunLogger::new("sarflow::gpt"))
        .context("Failed to set up the gpt engine")
}

fn intensity(
    engine: &GptEngine,
    config: &PipelineConfig,
    input: &Path,
    output_dir: &Path,
) -> PipelineResult<IntensityOutputs> {
    IntensityPipeline::new(engine, config, RunLogger::new("sarflow::intensity")).generate(input, output_dir)
}

fn coherence(
    engine: &GptEngine,
    config: &PipelineConfig,
    master: &Path,
    slave: &Path,
    output_dir: &Path,
) -> PipelineResult<PathBuf> {
    CoherencePipeline::new(engine, config, RunLogger::new("sarflow::coherence"))
        .generate(master, slave, output_dir)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
