//! Configuration CLI
//!
//! Shows the effective configuration, writes a default file and checks
//! existing files.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vocab_publish::PublishConfig;

#[derive(Parser)]
#[command(name = "vocab-config")]
#[command(about = "Inspect and initialize vocab-publish configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Show {
        /// Extra configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a configuration file with default values
    Init {
        #[arg(short, long, default_value = "vocab.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load a configuration file and check its values
    Validate { file: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config } => {
            let config = PublishConfig::load_from(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
            println!("# store file: {}", config.store_path().display());
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", output.display());
            }
            PublishConfig::default()
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("✅ Wrote default configuration to {}", output.display());
        }

        Commands::Validate { file } => {
            let config = PublishConfig::load_from(Some(&file))
                .with_context(|| format!("loading {}", file))?;
            println!("✅ {} is valid", file);
            println!("  Monotonic versions: {}", config.publishing.enforce_monotonic);
            println!("  Initial version:    {}", config.publishing.initial_version);
            println!(
                "  History page size:  {} (max {})",
                config.history.default_limit, config.history.max_limit
            );
        }
    }

    Ok(())
}
