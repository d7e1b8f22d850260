//! `Veilstore` CLI tool for key generation and settings-transition previews.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use veilstore::scenario::classify;
use veilstore::settings::Settings;
use veilstore_aead::AeadProvider;

#[derive(Parser)]
#[command(name = "veilstore")]
#[command(about = "Veilstore encryption layer CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new ChaCha20-Poly1305 key file
    Keygen {
        /// Output key file
        #[arg(short, long, default_value = "./veilstore.key")]
        output: PathBuf,
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },
    /// Show how each table transitions between two encryption settings
    Classify {
        /// Tables declared on the store
        #[arg(long = "table", required = true)]
        tables: Vec<String>,
        /// Tables configured for encryption now
        #[arg(long)]
        desired: Vec<String>,
        /// Tables recorded as encrypted by the previous run
        #[arg(long, conflicts_with = "settings")]
        previous: Vec<String>,
        /// JSON settings record (`{"tables": [...]}`) to read the previous tables from
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { output, force } => {
            if output.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", output.display());
            }
            AeadProvider::generate()
                .write_key_file(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), "key generated");
            println!("Generated key in: {}", output.display());
        }
        Commands::Classify { tables, desired, previous, settings } => {
            let previous = match settings {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let settings: Settings = serde_json::from_str(&text)
                        .with_context(|| format!("parsing {}", path.display()))?;
                    settings.tables
                }
                None => previous,
            };

            for table in &tables {
                let scenario = classify(table, &desired, &previous);
                let action = if scenario.requires_hooks() { "hooks" } else { "no hooks" };
                println!("{table}: {scenario} ({action}) - {}", scenario.description());
            }
        }
    }
    Ok(())
}
