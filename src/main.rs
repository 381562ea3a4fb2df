//! Letterbox CLI - Batch Image Normalizer
//!
//! Fits every image in a folder onto a 500x500 black PNG canvas.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use letterbox::processing::{
    supported_input_formats, BACKGROUND, CANVAS_HEIGHT, CANVAS_WIDTH, FIT_BOX_HEIGHT,
    FIT_BOX_WIDTH,
};
use letterbox::{
    init_with_config, scan_ordered, spawn_batch, BatchEvent, BatchReport, BatchState,
    CandidateOrder, CollisionPolicy, Config, ConversionRequest, ConversionResult,
    LetterboxError,
};

/// Exit code for a batch stopped with Ctrl-C
const EXIT_CANCELLED: i32 = 130;

/// Letterbox - Batch Image Normalizer
#[derive(Parser)]
#[command(
    name = "letterbox",
    version,
    about = "Fit every image in a folder onto a 500x500 black PNG canvas",
    long_about = "Letterbox scans a folder for PNG, JPEG, BMP, GIF and TIFF images, shrinks each \
                  one to fit within 500x500 without enlarging it, centers it on an opaque black \
                  500x500 canvas and saves the result as <name>.png in the destination folder. \
                  Files that cannot be read are reported and skipped."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Folder to read images from
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Folder to write PNGs to (default: <Pictures>/converted)
    #[arg(short, long, value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Configuration file path (.toml or .yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Process files in filename order instead of listing order
    #[arg(long)]
    sort: bool,

    /// What to do when two inputs map to the same output name
    #[arg(long, value_enum, value_name = "POLICY")]
    on_collision: Option<CliCollisionPolicy>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// List the images a batch would convert
    Scan {
        /// Folder to scan
        dir: PathBuf,
        /// Sort by filename
        #[arg(long)]
        sort: bool,
    },
    /// Validate configuration file
    Config {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path
        #[arg(short, long, default_value = "letterbox.toml")]
        output: PathBuf,
        /// Use YAML format instead of TOML
        #[arg(long)]
        yaml: bool,
    },
    /// Show system information and capabilities
    Info,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliCollisionPolicy {
    LastWins,
    Error,
    Rename,
}

impl From<CliCollisionPolicy> for CollisionPolicy {
    fn from(policy: CliCollisionPolicy) -> Self {
        match policy {
            CliCollisionPolicy::LastWins => CollisionPolicy::LastWins,
            CliCollisionPolicy::Error => CollisionPolicy::Error,
            CliCollisionPolicy::Rename => CollisionPolicy::Rename,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            let message = match e.downcast_ref::<LetterboxError>() {
                Some(err) => err.user_message(),
                None => format!("{:#}", e),
            };
            eprintln!("{}: {}", style("Error").red().bold(), message);
            process::exit(1);
        }
    }
}

async fn run_cli(cli: Cli) -> anyhow::Result<i32> {
    let config = build_config(&cli)?;
    init_with_config(&config)?;

    if let Some(command) = &cli.command {
        handle_subcommand(command).await?;
        return Ok(0);
    }

    let Some(source) = cli.source.clone() else {
        bail!("--source is required (run with --help for usage information)");
    };
    let destination = config.conversion.destination_or_default();
    let request = ConversionRequest::new(source, destination);

    let report = run_batch(&cli, request, &config).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(exit_code(&report))
}

/// Process exit code for a batch that ran; failed files do not count
fn exit_code(report: &BatchReport) -> i32 {
    match report.state {
        BatchState::Cancelled => EXIT_CANCELLED,
        _ => 0,
    }
}

/// Config file (or defaults) overlaid with command-line flags
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if cli.quiet {
        config.logging.level = "error".to_string();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    } else if cli.config.is_none() {
        config.logging.level = "warn".to_string();
    }

    if let Some(dest) = &cli.dest {
        config.conversion.destination = Some(dest.clone());
    }
    if cli.sort {
        config.conversion.order = CandidateOrder::Lexicographic;
    }
    if let Some(policy) = cli.on_collision {
        config.conversion.collisions = policy.into();
    }

    config.validate()?;
    Ok(config)
}

/// Run one batch on a worker task, rendering its events until it ends
async fn run_batch(
    cli: &Cli,
    request: ConversionRequest,
    config: &Config,
) -> anyhow::Result<BatchReport> {
    info!("Source: {:?}", request.source_directory);
    info!("Destination: {:?}", request.destination_directory);

    let progress = if !cli.json && !cli.quiet {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut handle = spawn_batch(request, config.conversion.clone());
    let cancel = handle.cancel_token();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(event) => render_event(progress.as_ref(), &event, cli.quiet),
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if signal.is_ok() {
                    cancel.cancel();
                    if let Some(pb) = &progress {
                        pb.set_message("Cancelling after the current image...");
                    }
                }
            }
        }
    }

    // A fatal error ends the batch without a Finished event
    if let Some(pb) = &progress {
        if !pb.is_finished() {
            pb.finish_and_clear();
        }
    }

    Ok(handle.wait().await?)
}

fn render_event(progress: Option<&ProgressBar>, event: &BatchEvent, quiet: bool) {
    match event {
        BatchEvent::Started { total } => {
            if let Some(pb) = progress {
                pb.set_length(*total as u64);
            }
        }
        BatchEvent::Progress(update) => {
            debug!("{} ({:.0}%)", update.message, update.percent);
            if let Some(pb) = progress {
                pb.set_message(update.message.clone());
            }
        }
        BatchEvent::FileFinished(result) => {
            if let ConversionResult::Failure { filename, reason, .. } = result {
                let line = format!("{} {}: {}", style("✗").red(), filename, reason);
                match progress {
                    Some(pb) => pb.println(line),
                    None if !quiet => eprintln!("{}", line),
                    None => {}
                }
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
        BatchEvent::Stats(stats) => {
            debug!("{}", stats.status_text());
        }
        BatchEvent::Finished(report) => {
            if let Some(pb) = progress {
                pb.finish_with_message(report.stats.status_text());
            }
        }
    }
}

/// Handle subcommands
async fn handle_subcommand(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Scan { dir, sort } => {
            list_candidates(dir, *sort).await?;
        }
        Commands::Config { file } => {
            validate_config_file(file)?;
        }
        Commands::ExampleConfig { output, yaml } => {
            generate_example_config(output, *yaml)?;
        }
        Commands::Info => {
            show_system_info();
        }
    }
    Ok(())
}

async fn list_candidates(dir: &Path, sort: bool) -> anyhow::Result<()> {
    let order = if sort {
        CandidateOrder::Lexicographic
    } else {
        CandidateOrder::Listing
    };
    let candidates = scan_ordered(dir, order).await?;

    for candidate in &candidates {
        println!("{}", candidate.filename);
    }
    println!(
        "{} candidate images in {}",
        style(candidates.len()).bold(),
        dir.display()
    );

    Ok(())
}

/// Validate configuration file
fn validate_config_file(file_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(file_path)?;
    config.validate()?;

    println!("{}: Configuration file is valid", style("Success").green().bold());
    println!("Destination: {}", config.conversion.destination_or_default().display());
    println!("Order: {:?}", config.conversion.order);
    println!("Collisions: {:?}", config.conversion.collisions);

    Ok(())
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path, use_yaml: bool) -> anyhow::Result<()> {
    let path = if use_yaml && !matches!(
        output_path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    ) {
        output_path.with_extension("yaml")
    } else {
        output_path.to_path_buf()
    };

    Config::default().to_file(&path)?;

    let format = if use_yaml { "YAML" } else { "TOML" };
    println!(
        "{}: Generated example {} configuration: {}",
        style("Success").green().bold(),
        format,
        path.display()
    );

    Ok(())
}

/// Show system information
fn show_system_info() {
    use sysinfo::{CpuExt, System, SystemExt};

    println!("{}", style("Letterbox System Information").bold());
    println!();
    println!("{}: {}", style("Version").bold(), letterbox::VERSION);
    println!();

    let mut system = System::new_all();
    system.refresh_all();

    println!("{}", style("System:").bold());
    if let Some(name) = system.name() {
        println!("  OS: {}", name);
    }
    if let Some(version) = system.os_version() {
        println!("  Version: {}", version);
    }
    println!("  CPUs: {}", system.cpus().len());
    if let Some(cpu) = system.cpus().first() {
        println!("  CPU: {}", cpu.brand());
    }
    println!(
        "  Memory: {:.2} GB total, {:.2} GB available",
        system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
        system.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0
    );
    println!();

    println!("{}", style("Conversion:").bold());
    println!("  Input: {}", supported_input_formats().join(", "));
    println!("  Output: png");
    println!("  Canvas: {}x{}, background {:?}", CANVAS_WIDTH, CANVAS_HEIGHT, BACKGROUND.0);
    println!("  Fit-box: {}x{} (never enlarged)", FIT_BOX_WIDTH, FIT_BOX_HEIGHT);
    println!(
        "  Default destination: {}",
        letterbox::config::default_destination().display()
    );
}

/// Print processing summary
fn print_summary(report: &BatchReport) {
    println!();
    match report.state {
        BatchState::Cancelled => println!("{}", style("Batch cancelled").yellow().bold()),
        _ => println!("{}", style("Processing Summary:").bold()),
    }
    println!(
        "  {} succeeded / {} failed",
        style(report.stats.succeeded).green(),
        style(report.stats.failed).red()
    );
    println!("  {}: {:.2}s", style("Duration").blue(), report.elapsed.as_secs_f64());

    if report.stats.processed > 0 {
        println!(
            "  {}: {:.1} files/sec",
            style("Speed").cyan(),
            report.files_per_second()
        );
    }
}
