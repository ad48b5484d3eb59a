//! Command implementations
//!
//! Thin glue between the CLI surface and the pipeline components: each
//! `cmd_*` function wires up the pieces a subcommand needs, and the
//! `print_*` helpers render results for humans (the CLI's `--json` flag
//! bypasses them).

use crate::acquire::Acquirer;
use crate::batch::{load_companies, EntityId};
use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::error::Result;
use crate::generate::Generator;
use crate::index::{Indexer, SegmentStore};
use crate::orchestrate::{Orchestrator, RunOptions, RunSummary};
use crate::provider::{CostModel, HttpProvider};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Build the indexer shared by every command that touches the store
async fn build_indexer(config: &Config) -> Result<Arc<Indexer>> {
    let provider = Arc::new(HttpProvider::new(&config.provider)?);
    let store = SegmentStore::new(&config.index, config.provider.embedding_dimension).await?;

    Ok(Arc::new(Indexer::new(
        store,
        provider,
        CostModel::from_config(&config.provider),
        config.provider.embedding_batch_size,
    )))
}

/// Run a batch: validate the input file, assemble the pipeline, and
/// drive it through the orchestrator.
pub async fn cmd_run(config: &Config, input: &Path, options: RunOptions) -> Result<RunSummary> {
    // Batch preconditions fail here, before anything is dispatched.
    let companies = load_companies(input)?;

    let provider = Arc::new(HttpProvider::new(&config.provider)?);
    let store = SegmentStore::new(&config.index, config.provider.embedding_dimension).await?;
    let indexer = Arc::new(Indexer::new(
        store,
        provider.clone(),
        CostModel::from_config(&config.provider),
        config.provider.embedding_batch_size,
    ));
    let acquirer = Acquirer::new(&config.acquire)?;
    let generator = Generator::new(provider, &config.provider, config.generate.clone());

    let orchestrator = Orchestrator::new(config.clone(), acquirer, indexer, generator, options)?;
    orchestrator.run(companies).await
}

/// One result row for the debug query command
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub text: String,
    pub distance: f32,
}

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub company_id: String,
    pub query: String,
    pub hits: Vec<QueryHit>,
    pub cost: f64,
}

/// Debug retrieval against one company's index partition
pub async fn cmd_query(
    config: &Config,
    url: &str,
    query: &str,
    k: usize,
    max_distance: f32,
) -> Result<QueryResult> {
    let entity_id = EntityId::from_url(url)?;
    info!("Querying {} for: {}", entity_id, query);

    let indexer = build_indexer(config).await?;
    let (items, cost) = indexer.query(&entity_id, query, k, max_distance).await?;

    Ok(QueryResult {
        company_id: entity_id.to_string(),
        query: query.to_string(),
        hits: items
            .into_iter()
            .map(|item| QueryHit {
                text: item.text,
                distance: item.distance,
            })
            .collect(),
        cost,
    })
}

/// System status: checkpoint counts plus collection statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub processed: usize,
    pub failed: usize,
    pub collection_exists: bool,
    pub points_count: u64,
    pub collection_status: Option<String>,
}

pub async fn cmd_status(config: &Config) -> Result<StatusReport> {
    let checkpoint = Checkpoint::load(&config.paths.checkpoint_file);

    let store = SegmentStore::new(&config.index, config.provider.embedding_dimension).await?;
    let info = store.collection_info().await?;

    Ok(StatusReport {
        processed: checkpoint.processed.len(),
        failed: checkpoint.failed.len(),
        collection_exists: info.is_some(),
        points_count: info.as_ref().map(|i| i.points_count).unwrap_or(0),
        collection_status: info.map(|i| i.status),
    })
}

/// Write a default config file and create the working directories
pub async fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(crate::error::Error::Config(format!(
            "Config file already exists at {} (use --force to overwrite)",
            config_path.display()
        )));
    }

    let config = Config::default();
    config.save(config_path)?;

    std::fs::create_dir_all(&config.paths.output_dir)?;
    std::fs::create_dir_all(&config.paths.extracted_dir)?;

    Ok(())
}

/// Print query results to the console
pub fn print_query_results(result: &QueryResult) {
    println!("\nQuery against {}: {}\n", result.company_id, result.query);

    if result.hits.is_empty() {
        println!("No evidence found.");
        return;
    }

    for (i, hit) in result.hits.iter().enumerate() {
        let preview: String = hit.text.chars().take(200).collect();
        println!("{}. [distance: {:.3}]", i + 1, hit.distance);
        println!("   {}\n", preview.replace('\n', " "));
    }
}

/// Print the status report to the console
pub fn print_status(status: &StatusReport) {
    println!("factsmith status");
    println!("  Processed companies: {}", status.processed);
    println!("  Failed companies:    {}", status.failed);

    if status.collection_exists {
        println!("  Collection points:   {}", status.points_count);
        if let Some(ref s) = status.collection_status {
            println!("  Collection status:   {}", s);
        }
    } else {
        println!("  Collection: not created yet (run 'factsmith db init')");
    }
}
