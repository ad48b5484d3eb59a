//! factsmith CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use factsmith::{
    commands::{cmd_init, cmd_query, cmd_run, cmd_status, print_query_results, print_status},
    config::Config,
    error::Result,
    index::SegmentStore,
    orchestrate::{print_summary, RunMode, RunOptions},
    progress::LogWriterFactory,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "factsmith")]
#[command(version, about = "Evidence-grounded company factsheets from a CSV of websites", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create working directories
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Run the full pipeline: acquire, index, and generate factsheets
    Run {
        /// CSV file with 'url' and 'industry' columns
        input: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,

        /// Overwrite existing factsheet files
        #[arg(long)]
        overwrite: bool,
    },

    /// Acquire, chunk, and index only (no generation)
    Ingest {
        /// CSV file with 'url' and 'industry' columns
        input: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Debug retrieval against one company's index partition
    Query {
        /// Company URL (identifies the partition)
        url: String,

        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "6")]
        limit: usize,

        /// Maximum cosine distance (lower = closer)
        #[arg(long, default_value = "0.25")]
        max_distance: f32,
    },

    /// Show checkpoint and collection status
    Status,

    /// Manage the vector database collection
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags shared by the batch subcommands
#[derive(clap::Args)]
struct BatchArgs {
    /// Maximum concurrent ingestion workers
    #[arg(short = 'j', long)]
    max_concurrent: Option<usize>,

    /// Checkpoint file path
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Re-acquire content even when a cached extraction exists
    #[arg(long)]
    force_refetch: bool,
}

/// Database management actions
#[derive(Subcommand)]
enum DbAction {
    /// Initialize/create the collection
    Init,

    /// Show collection status
    Status,

    /// Reset the collection (delete all vectors and recreate)
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "factsmith", &mut std::io::stdout());
        return Ok(());
    }

    if let Commands::Init { force } = cli.command {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(Config::default_config_path);
        cmd_init(&config_path, force).await?;
        println!("✓ factsmith initialized");
        println!("  Config: {}", config_path.display());
        println!("\nNext steps:");
        println!("  1. Edit the config file to customize settings");
        println!("  2. Start Qdrant: docker run -p 6334:6334 qdrant/qdrant");
        println!("  3. Run a batch: factsmith run companies.csv");
        return Ok(());
    }

    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Run {
            input,
            batch,
            overwrite,
        } => {
            let options = run_options(&config, RunMode::Full, batch, overwrite);
            let summary = cmd_run(&config, &input, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }

        Commands::Ingest { input, batch } => {
            let options = run_options(&config, RunMode::IngestOnly, batch, false);
            let summary = cmd_run(&config, &input, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }

        Commands::Query {
            url,
            query,
            limit,
            max_distance,
        } => {
            let result = cmd_query(&config, &url, &query, limit, max_distance).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_query_results(&result);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Db { action } => {
            handle_db_action(&config, action, cli.json).await?;
        }
    }

    Ok(())
}

fn run_options(
    config: &Config,
    mode: RunMode,
    batch: BatchArgs,
    overwrite: bool,
) -> RunOptions {
    RunOptions {
        mode,
        max_concurrent: batch
            .max_concurrent
            .unwrap_or_else(factsmith::config::default_max_concurrent),
        force_refetch: batch.force_refetch,
        overwrite,
        checkpoint_file: batch
            .checkpoint
            .unwrap_or_else(|| config.paths.checkpoint_file.clone()),
    }
}

async fn handle_db_action(config: &Config, action: DbAction, json: bool) -> Result<()> {
    let store = SegmentStore::new(&config.index, config.provider.embedding_dimension).await?;

    match action {
        DbAction::Init => {
            store.ensure_collection().await?;
            if json {
                println!(r#"{{"status": "ok", "message": "Collection initialized"}}"#);
            } else {
                println!("✓ Collection initialized");
            }
        }
        DbAction::Status => match store.collection_info().await? {
            Some(info) => {
                if json {
                    println!(
                        r#"{{"exists": true, "points_count": {}, "indexed_vectors_count": {}, "status": "{}"}}"#,
                        info.points_count, info.indexed_vectors_count, info.status
                    );
                } else {
                    println!("Collection status:");
                    println!("  Status: {}", info.status);
                    println!("  Points: {}", info.points_count);
                    println!("  Indexed vectors: {}", info.indexed_vectors_count);
                }
            }
            None => {
                if json {
                    println!(r#"{{"exists": false}}"#);
                } else {
                    println!("Collection does not exist. Run 'factsmith db init' to create it.");
                }
            }
        },
        DbAction::Reset { yes } => {
            if !yes {
                eprintln!("This will delete ALL indexed data!");
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            store.reset_collection().await?;
            if json {
                println!(r#"{{"status": "ok", "message": "Collection reset"}}"#);
            } else {
                println!("✓ Collection reset (all data deleted and collection recreated)");
            }
        }
    }

    Ok(())
}
