//! CLI binary for pricewise.
//!
//! Results are written to stdout as JSON. All tracing output goes to
//! stderr so stdout can be piped.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pricewise::{PricewiseConfig, build_service};
use pricewise_search::SearchOptions;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Pricewise: compare grocery prices across platforms.
#[derive(Parser)]
#[command(name = "pricewise", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search every provider and print the ranked comparison.
    Search {
        /// Free-text query, e.g. "2 kg atta".
        #[arg(required = true)]
        query: Vec<String>,

        /// Only call these providers (repeatable).
        #[arg(short, long = "provider")]
        providers: Vec<String>,

        /// Category hint, e.g. "dairy".
        #[arg(long)]
        category: Option<String>,

        /// Quantity hint, e.g. "500ml".
        #[arg(long)]
        quantity: Option<String>,

        /// Maximum ranked products to print.
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },

    /// Print the health of every provider.
    Status,

    /// Run a diagnostic query through every provider.
    TestAll,

    /// Write the effective configuration to the config path.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pricewise=info,pricewise_search=info")),
        )
        .init();

    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(PricewiseConfig::default_config_path);
    let mut config = PricewiseConfig::load_or_default(&path)?;

    if let Command::InitConfig = cli.command {
        config.save_to_file(&path)?;
        eprintln!("wrote {}", path.display());
        return Ok(());
    }

    config.apply_env_overrides();
    let service = build_service(&config)?;

    match cli.command {
        Command::Search {
            query,
            providers,
            category,
            quantity,
            max_results,
        } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupted, abandoning outstanding providers");
                    on_interrupt.cancel();
                }
            });

            let options = SearchOptions {
                providers,
                category,
                quantity,
                max_results,
                cancel: Some(cancel),
            };
            let result = service.search(&query.join(" "), &options).await;
            print_json(&result)
        }
        Command::Status => print_json(&service.status()),
        Command::TestAll => print_json(&service.test_all().await),
        Command::InitConfig => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
