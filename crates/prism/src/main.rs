//! Prism CLI - storefront image ingestion.
//!
//! Prism turns product photos into AVIF, WebP and progressive JPEG
//! derivatives, uploads them to the configured asset host, and records a
//! blur placeholder for every resulting URL.
//!
//! # Usage
//!
//! ```bash
//! # Transcode and upload a batch
//! prism upload tee-front.png tee-back.jpg --folder products
//!
//! # Look up the placeholder for a URL
//! prism blur get https://res.cloudinary.com/demo/image/upload/products/tee-front.jpeg
//!
//! # View configuration
//! prism config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Prism - transcode, upload and index storefront images.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcode images, upload every derivative and index blur placeholders
    Upload(cli::upload::UploadArgs),

    /// Inspect and maintain the blur placeholder index
    Blur(cli::blur::BlurArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match prism_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            prism_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Upload(args) => cli::upload::execute(args, config).await,
        Commands::Blur(args) => cli::blur::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
