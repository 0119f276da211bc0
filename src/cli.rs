use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the silence-aware segment plan for a video
    Plan {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum segment length in seconds (overrides config)
        #[arg(long)]
        min: Option<f64>,

        /// Target segment length in seconds (overrides config)
        #[arg(long)]
        max: Option<f64>,
    },

    /// Build a localized bundle from a video
    Movie {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Bundle output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Language spoken in the video
        #[arg(short, long, default_value = "en")]
        source_lang: String,

        /// Target languages (comma-separated)
        #[arg(short, long, default_value = "ja")]
        langs: String,
    },

    /// Build a localized bundle from an extracted beat list (JSON)
    Beats {
        /// Beat list file
        #[arg(short, long)]
        input: PathBuf,

        /// Bundle output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Target languages (comma-separated)
        #[arg(short, long, default_value = "ja")]
        langs: String,
    },

    /// Add languages to an existing bundle
    Localize {
        /// Bundle directory containing mulmo_view.json
        #[arg(short, long)]
        bundle: PathBuf,

        /// Target languages (comma-separated)
        #[arg(short, long)]
        langs: String,
    },

    /// Upload a finished bundle to remote storage
    Upload {
        /// Bundle directory containing mulmo_view.json
        #[arg(short, long)]
        bundle: PathBuf,

        /// Concurrent uploads (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output configuration file
        #[arg(short, long, default_value = "mulmo.toml")]
        output: PathBuf,
    },
}

/// Split a comma-separated language list
pub fn parse_langs(langs: &str) -> Vec<String> {
    langs
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
