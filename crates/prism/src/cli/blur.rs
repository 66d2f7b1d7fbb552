//! The `prism blur` command for blur placeholder index maintenance.

use clap::{Args, Subcommand};
use prism_core::{BlurIndex, Config, OutputFormat, OutputWriter};

/// Arguments for the `blur` command.
#[derive(Args, Debug)]
pub struct BlurArgs {
    #[command(subcommand)]
    pub command: BlurCommand,
}

/// Subcommands for the blur placeholder index.
#[derive(Subcommand, Debug)]
pub enum BlurCommand {
    /// Print the placeholder stored for a URL
    Get {
        /// Image URL or path
        url: String,
    },

    /// Print the index key a URL normalizes to
    Key {
        /// Image URL or path
        url: String,
    },

    /// Remove the placeholder stored for a URL
    Remove {
        /// Image URL or path
        url: String,
    },

    /// Remove every placeholder
    Clear,

    /// List all entries
    List {
        /// One JSON object per line instead of a single object
        #[arg(long)]
        jsonl: bool,
    },
}

/// Execute the blur command.
pub async fn execute(args: BlurArgs, config: &Config) -> anyhow::Result<()> {
    let index = BlurIndex::from_config(config);
    tracing::debug!("Using blur index at {:?}", index.path());

    match args.command {
        BlurCommand::Get { url } => match index.get(&url).await {
            Some(data_url) => println!("{data_url}"),
            None => anyhow::bail!("No placeholder for key {:?}", index.key_for(&url)),
        },

        BlurCommand::Key { url } => println!("{}", index.key_for(&url)),

        BlurCommand::Remove { url } => {
            let key = index.key_for(&url);
            if !index.remove(&url).await {
                anyhow::bail!("No placeholder removed for key {key:?}");
            }
            println!("Removed {key}");
        }

        BlurCommand::Clear => {
            let count = index.len().await;
            if !index.clear().await {
                anyhow::bail!("Failed to clear {}", index.path().display());
            }
            println!("Cleared {count} placeholder(s) from {}", index.path().display());
        }

        BlurCommand::List { jsonl } => {
            let entries = index.entries().await?;
            let format = if jsonl {
                OutputFormat::JsonLines
            } else {
                OutputFormat::Json
            };
            let stdout = std::io::stdout();
            let mut writer = OutputWriter::new(stdout.lock(), format, true);
            writer.write_entries(&entries)?;
            writer.flush()?;
            tracing::info!("{} placeholder(s)", entries.len());
        }
    }

    Ok(())
}
