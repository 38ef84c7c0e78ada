use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use yt_transcript_rust::{Config, StrategyName, Transcript, TranscriptError, TranscriptExtractor};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn cli() -> Command {
    Command::new("yt-transcript")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Resilient transcript extraction for online videos")
        .arg(
            Arg::new("video")
                .value_name("VIDEO")
                .help("Watch URL, short link, embed URL or bare 11-character video ID")
                .required(true),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .value_parser(["text", "json", "plain"])
                .default_value("text"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (default: search standard locations)"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .value_name("KEY")
                .help("API key for the remote extraction service"),
        )
        .arg(
            Arg::new("strategy")
                .short('s')
                .long("strategy")
                .value_name("NAME")
                .help("Only run these strategies (direct, remote, browser); priority order is fixed")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("artifacts-dir")
                .long("artifacts-dir")
                .value_name("DIR")
                .help("Save browser screenshots and HTML snapshots here on failure"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

async fn run() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    // logs go to stderr so stdout stays machine-readable
    let default_filter = if verbose {
        "yt_transcript_rust=debug,yt_transcript=debug,warn"
    } else {
        "yt_transcript_rust=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(key) = matches.get_one::<String>("api-key") {
        config.remote.api_key = Some(key.clone());
    }
    if let Some(dir) = matches.get_one::<String>("artifacts-dir") {
        config.browser.artifacts_dir = Some(PathBuf::from(dir));
    }
    if let Some(names) = matches.get_many::<String>("strategy") {
        config.strategies = names
            .map(|n| n.parse::<StrategyName>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(anyhow::Error::msg)?;
    }

    config.validate()?;
    debug!("{}", config.summary());

    let extractor = TranscriptExtractor::from_config(&config);
    info!("🚀 Extracting transcript with strategies: {}", extractor.strategy_names().join(", "));

    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let video = matches
        .get_one::<String>("video")
        .ok_or_else(|| anyhow::anyhow!("missing VIDEO argument"))?;

    match extractor.extract(video).await {
        Ok(transcript) => {
            print_transcript(&transcript, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ TranscriptError::InvalidIdentifier(_)) => {
            error!("{}", e);
            eprintln!("{}", e);
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            eprintln!("{}", e);
            if verbose {
                eprintln!("{}", e.diagnostics());
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_transcript(transcript: &Transcript, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(transcript)?),
        "plain" => println!("{}", transcript.full_text()),
        _ => {
            for segment in &transcript.segments {
                println!("{}", segment);
            }
        }
    }
    info!(
        "✅ {} segments via {}",
        transcript.segments.len(),
        transcript.strategy
    );
    Ok(())
}
