use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tts_job_configuration::{load_config, setup_logging};
use tts_job_setup::{build_and_run, Application};

/// Text-to-speech job processor.
#[derive(Debug, Parser)]
#[command(name = "tts-job-service")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve jobs over HTTP (default).
    Serve,
    /// Process exactly one job envelope and print the JSON response.
    RunJob {
        /// Envelope file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config().context("failed to load configuration")?;
    setup_logging(&config.logging).context("failed to initialise logging")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => build_and_run(config).await,
        Command::RunJob { input } => {
            let raw = read_input(&input)?;
            let app = Application::new(config).await?;
            let response = app.run_single_job(&raw).await;
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read job from stdin")?;
        return Ok(raw);
    }

    let path = PathBuf::from(input);
    std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read job from {}", path.display()))
}
