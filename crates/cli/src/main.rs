mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use invex_extract::{annotate_png, ExtractionMode, GeminiBackend, InvoicePipeline, TextExtractor};

use config::Config;

#[derive(Parser)]
#[command(name = "invex")]
#[command(about = "Extract structured invoice fields from scanned images")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./invex.toml when present)
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract invoice fields and bounding boxes from an image
    Extract {
        image: PathBuf,
        /// hosted (ten fields) or dataset (six fields)
        #[arg(long)]
        mode: Option<ExtractionMode>,
        /// Never call the hosted model
        #[arg(long)]
        offline: bool,
        /// Write a copy of the image with the boxes drawn on it
        #[arg(long, value_name = "PNG")]
        annotate: Option<PathBuf>,
    },
    /// Run the regex field heuristics over a plain-text invoice
    ParseText { file: PathBuf },
    /// Check that the hosted-model API key is available
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Variables already set in the environment take precedence over .env.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract { image, mode, offline, annotate } => {
            run_extract(&config, image, mode, offline, annotate).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ParseText { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            print_json(&TextExtractor::extract(&text))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => Ok(check_config(&config)),
    }
}

async fn run_extract(
    config: &Config,
    image: PathBuf,
    mode: Option<ExtractionMode>,
    offline: bool,
    annotate: Option<PathBuf>,
) -> Result<()> {
    let backend = match (offline, config.api_key()) {
        (true, _) => None,
        (false, Some(key)) => Some(GeminiBackend::new(
            key,
            &config.hosted.model,
            &config.hosted.base_url,
            Duration::from_secs(config.hosted.timeout_secs),
        )?),
        (false, None) => {
            warn!(
                env = %config.hosted.api_key_env,
                "No API key configured, using synthetic extraction"
            );
            None
        }
    };

    let pipeline = InvoicePipeline::new(backend)
        .with_mode(mode.unwrap_or(config.extraction.mode))
        .with_profiles(config.extraction.profiles.clone());

    let extraction = pipeline
        .process_file(&image)
        .await
        .with_context(|| format!("Failed to process {}", image.display()))?;

    if let Some(out) = annotate {
        if extraction.boxes.is_empty() {
            warn!(path = %out.display(), "Nothing to annotate, image was not decodable");
        } else {
            let data = tokio::fs::read(&image).await?;
            let png = annotate_png(&data, &extraction.boxes)?;
            tokio::fs::write(&out, png)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(path = %out.display(), boxes = extraction.boxes.len(), "Annotated image written");
        }
    }

    print_json(&extraction)
}

fn check_config(config: &Config) -> ExitCode {
    let env = &config.hosted.api_key_env;
    match config.api_key() {
        Some(_) => {
            println!("{env} is set; hosted model {} will be used.", config.hosted.model);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("{env} is not set.");
            eprintln!("Add it to your environment or to a .env file: {env}=your_api_key");
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
