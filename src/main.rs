// ABOUTME: Main entry point for the markdownreveal program.
// ABOUTME: Provides the CLI interface and executes commands from the library.

use clap::{Args, Parser, Subcommand};
use markdownreveal::{pipeline, scheduler, utils, GenerateOptions, WatchConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the slides, serve them and regenerate on every change
    Show(ShowArgs),

    /// Generate the slides once
    Build(BuildArgs),

    /// Remove the local cache directory
    Clean(CleanArgs),
}

#[derive(Args)]
struct ShowArgs {
    /// Markdown file to present (default: first *.md in the current directory)
    file: Option<PathBuf>,

    /// Address for the live server
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port for the live server
    #[arg(short, long, default_value_t = 8123)]
    port: u16,

    /// Skip the warm-up slide
    #[arg(long)]
    no_warmup: bool,

    /// Quiet period in milliseconds before regenerating
    #[arg(long, default_value_t = scheduler::DEFAULT_PERIOD.as_millis() as u64)]
    period_ms: u64,

    /// Local configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct BuildArgs {
    /// Markdown file to convert (default: first *.md in the current directory)
    file: Option<PathBuf>,

    /// Skip the warm-up slide
    #[arg(long)]
    no_warmup: bool,

    /// Local configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct CleanArgs {
    /// Local configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn markdown_file(file: Option<PathBuf>) -> markdownreveal::Result<PathBuf> {
    match file {
        Some(file) => Ok(file),
        None => utils::find_default_markdown(Path::new(".")),
    }
}

fn run(cli: Cli) -> markdownreveal::Result<()> {
    match cli.command {
        Commands::Show(args) => {
            if args.period_ms == 0 {
                return Err(anyhow::anyhow!("Quiet period must be at least 1 ms").into());
            }
            let config = WatchConfig {
                markdown_path: markdown_file(args.file)?,
                config_path: args.config,
                period: Duration::from_millis(args.period_ms),
                host: args.host,
                port: args.port,
                no_warmup: args.no_warmup,
                ..WatchConfig::default()
            };
            markdownreveal::show(config)
        }
        Commands::Build(args) => {
            let markdown_path = markdown_file(args.file)?;
            let options = GenerateOptions {
                no_warmup: args.no_warmup,
            };
            let index = pipeline::generate(&markdown_path, args.config.as_deref(), options)?;
            println!("Slides generated: {:?}", index);
            Ok(())
        }
        Commands::Clean(args) => {
            let loader = pipeline::config_loader(None, args.config.as_deref())?;
            let config = loader.load()?;
            pipeline::clean(&config)?;
            println!("Removed {:?}", config.local_path);
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
