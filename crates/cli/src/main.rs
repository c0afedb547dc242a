//! Taskbridge CLI - Main Entry Point

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskbridge_cli::commands::{resolve, run, serve, task};
use taskbridge_cli::output::OutputFormat;

/// Taskbridge - environment resolver, suite launcher and task boundary
#[derive(Parser)]
#[command(name = "taskbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Suite root containing cypress/config and cypress/fixtures
    #[arg(long, env = "TASKBRIDGE_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    /// Output format
    #[arg(long, default_value = "pretty", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser suite for one feature and tag
    Run(run::RunArgs),

    /// Serve the task boundary over HTTP
    Serve(serve::ServeArgs),

    /// Show the resolved configuration for an environment
    Resolve(resolve::ResolveArgs),

    /// Invoke a single task
    Task(task::TaskArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run::execute(args).await?,
        Commands::Serve(args) => serve::execute(args, &cli.root).await?,
        Commands::Resolve(args) => resolve::execute(args, &cli.root, cli.format).await?,
        Commands::Task(args) => task::execute(args, &cli.root, cli.format).await?,
    }

    Ok(())
}
