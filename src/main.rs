//! mulmo - narrated media bundle pipeline
//!
//! Segments a video (or takes an extracted beat list), localizes every beat
//! into the requested languages, assembles a `mulmo_view.json` bundle and
//! uploads it to remote storage.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mulmo_bundle::cli::{parse_langs, Args, Commands};
use mulmo_bundle::config::Config;
use mulmo_bundle::error::BundleError;
use mulmo_bundle::media::MediaProcessorFactory;
use mulmo_bundle::retry::RetryPolicy;
use mulmo_bundle::upload::{UploadApiFactory, UploadManager};
use mulmo_bundle::workflow::{plan_video, Workflow};

const DEFAULT_CONFIG_FILE: &str = "mulmo.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Plan { input, min, max } => {
            if let Some(min) = min {
                config.segment.min_duration = min;
            }
            if let Some(max) = max {
                config.segment.max_duration = max;
            }
            config.validate()?;

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability()?;
            let segments = plan_video(media.as_ref(), &input, &config.segment).await?;

            println!("{:<6} {:>10} {:>10} {:>10}", "Index", "Start", "End", "Duration");
            println!("{}", "-".repeat(40));
            for segment in &segments {
                println!(
                    "{:<6} {:>10.2} {:>10.2} {:>10.2}",
                    segment.index, segment.start_time, segment.end_time, segment.duration
                );
            }
        }
        Commands::Movie { input, output_dir, source_lang, langs } => {
            let workflow = Workflow::new(config)?;
            let bundle = workflow
                .process_movie(&input, &output_dir, &source_lang, &parse_langs(&langs))
                .await?;
            println!("Wrote {} beats ({:.1}s) to {}", bundle.total_segments, bundle.total_duration, output_dir.display());
        }
        Commands::Beats { input, output_dir, langs } => {
            let workflow = Workflow::new(config)?;
            let bundle = workflow.process_beats(&input, &output_dir, &parse_langs(&langs)).await?;
            println!("Wrote {} beats ({:.1}s) to {}", bundle.total_segments, bundle.total_duration, output_dir.display());
        }
        Commands::Localize { bundle, langs } => {
            let workflow = Workflow::new(config)?;
            let manifest = workflow.localize_bundle(&bundle, &parse_langs(&langs)).await?;
            println!("Bundle {} now has {:?}", bundle.display(), manifest.languages());
        }
        Commands::Upload { bundle, concurrency } => {
            let api = UploadApiFactory::create_api(&config.upload)?;
            let manager = UploadManager::new(
                api,
                RetryPolicy::from_config(&config.retry),
                concurrency.unwrap_or(config.upload.concurrency),
            )
            .with_progress(true);

            let outcome = manager.upload_bundle(&bundle).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if !outcome.success {
                return Err(BundleError::Upload(format!(
                    "{} of {} files failed",
                    outcome.fail_count,
                    outcome.files.len()
                ))
                .into());
            }
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".mulmo").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "mulmo.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("mulmo.log").display());

    Ok(())
}
