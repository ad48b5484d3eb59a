//! Batch orchestration
//!
//! The top-level driver for a run:
//! - loads the checkpoint and computes the remaining work set
//! - fans acquisition → chunking → indexing out over a bounded worker
//!   pool, isolating per-entity failures
//! - runs generation sequentially against the completion provider
//! - folds every outcome into a shared ledger inside one critical
//!   section, flushing the checkpoint incrementally

use crate::acquire::Acquirer;
use crate::batch::{Company, EntityId, EntityState};
use crate::checkpoint::{Checkpoint, FailedEntity};
use crate::chunk::{clean_content, segment_clean_text};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::generate::Generator;
use crate::index::Indexer;
use crate::output::{ExtractedRecord, ExtractedStore, FactsheetWriter};
use crate::progress::add_progress_bar;
use crate::retrieve::{retrieve, EvidenceSource};
use crate::template::TemplateLibrary;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// What a run does with each entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Acquire, chunk, index, then generate factsheets
    Full,
    /// Acquire, chunk, index only
    IngestOnly,
}

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    pub max_concurrent: usize,
    pub force_refetch: bool,
    pub overwrite: bool,
    pub checkpoint_file: PathBuf,
}

/// Cross-worker mutable state. Mutated only while holding the run mutex.
struct RunLedger {
    checkpoint: Checkpoint,
    checkpoint_file: PathBuf,
    states: HashMap<String, EntityState>,
    embedding_cost: f64,
    generation_cost: f64,
    from_cache: usize,
    freshly_fetched: usize,
}

impl RunLedger {
    fn new(checkpoint: Checkpoint, checkpoint_file: PathBuf) -> Self {
        Self {
            checkpoint,
            checkpoint_file,
            states: HashMap::new(),
            embedding_cost: 0.0,
            generation_cost: 0.0,
            from_cache: 0,
            freshly_fetched: 0,
        }
    }

    fn mark(&mut self, id: &EntityId, state: EntityState) {
        self.states.insert(id.as_str().to_string(), state);
    }

    fn record_success(&mut self, id: &EntityId) {
        self.checkpoint.record_success(id);
        self.mark(id, EntityState::Succeeded);
        self.flush();
    }

    fn record_failure(&mut self, company: &Company, error: &Error) {
        self.checkpoint.record_failure(
            &company.id,
            FailedEntity {
                url: company.url.clone(),
                industry: company.industry.clone(),
                error: error.to_string(),
                timestamp: Utc::now(),
            },
        );
        self.mark(&company.id, EntityState::Failed);
        self.flush();
    }

    /// Incremental checkpoint write so a crash loses at most the entity
    /// in flight. A failed flush is logged, never fatal.
    fn flush(&self) {
        if let Err(e) = self.checkpoint.save(&self.checkpoint_file) {
            error!("Failed to flush checkpoint: {}", e);
        }
    }
}

/// Human-readable outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dispatched: usize,
    pub skipped_processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub from_cache: usize,
    pub freshly_fetched: usize,
    pub embedding_cost: f64,
    pub generation_cost: f64,
    pub failures: Vec<FailedEntity>,
}

/// Outcome of the ingest stage for one entity
struct IngestOutcome {
    segments: usize,
    cost: f64,
    from_cache: bool,
}

/// Top-level batch driver
pub struct Orchestrator {
    config: Config,
    acquirer: Acquirer,
    indexer: Arc<Indexer>,
    generator: Generator,
    templates: TemplateLibrary,
    writer: FactsheetWriter,
    extracted: ExtractedStore,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        acquirer: Acquirer,
        indexer: Arc<Indexer>,
        generator: Generator,
        options: RunOptions,
    ) -> Result<Self> {
        let templates = TemplateLibrary::new(&config.paths.templates_dir);
        let writer = FactsheetWriter::new(&config.paths.output_dir)?;
        let extracted = ExtractedStore::new(&config.paths.extracted_dir)?;

        Ok(Self {
            config,
            acquirer,
            indexer,
            generator,
            templates,
            writer,
            extracted,
            options,
        })
    }

    /// Run the batch. Always completes with a checkpoint reflecting
    /// every dispatched entity; only batch-level precondition failures
    /// abort before dispatch.
    pub async fn run(&self, companies: Vec<Company>) -> Result<RunSummary> {
        let checkpoint = Checkpoint::load(&self.options.checkpoint_file);
        let (work, skipped) = compute_work_set(companies, &checkpoint);

        let ledger = Arc::new(Mutex::new(RunLedger::new(
            checkpoint,
            self.options.checkpoint_file.clone(),
        )));

        if work.is_empty() {
            info!("No new companies to process");
            return Ok(self.summarize(&ledger, 0, skipped).await);
        }

        info!(
            "Processing {} companies with up to {} concurrent workers",
            work.len(),
            self.options.max_concurrent
        );

        {
            let mut guard = ledger.lock().await;
            for company in &work {
                guard.mark(&company.id, EntityState::Pending);
            }
        }

        let ingested = self.ingest_all(&work, &ledger).await;

        if self.options.mode == RunMode::Full {
            self.generate_all(&ingested, &ledger).await;
        }

        let summary = self.summarize(&ledger, work.len(), skipped).await;

        // Wholesale rewrite at end of run, after all incremental flushes.
        ledger.lock().await.flush();

        Ok(summary)
    }

    /// Ingest phase: bounded fan-out over acquire → chunk → index.
    /// Returns the companies that survived, in input order.
    async fn ingest_all(&self, work: &[Company], ledger: &Arc<Mutex<RunLedger>>) -> Vec<Company> {
        let bar = add_progress_bar(work.len() as u64);
        let succeeded: Arc<Mutex<HashMap<String, ()>>> = Arc::new(Mutex::new(HashMap::new()));

        run_bounded(
            work.to_vec(),
            self.options.max_concurrent,
            |company| {
                let ledger = ledger.clone();
                let succeeded = succeeded.clone();
                let bar = bar.clone();
                async move {
                    ledger
                        .lock()
                        .await
                        .mark(&company.id, EntityState::InProgress);

                    let outcome = self.ingest_entity(&company).await;

                    let mut guard = ledger.lock().await;
                    match outcome {
                        Ok(result) => {
                            guard.embedding_cost += result.cost;
                            if result.from_cache {
                                guard.from_cache += 1;
                            } else {
                                guard.freshly_fetched += 1;
                            }
                            info!(
                                "Indexed {} ({} segments)",
                                company.id, result.segments
                            );

                            if self.options.mode == RunMode::IngestOnly {
                                guard.record_success(&company.id);
                            } else {
                                // Terminal state comes from the generate phase.
                                guard.mark(&company.id, EntityState::InProgress);
                            }
                            succeeded
                                .lock()
                                .await
                                .insert(company.id.as_str().to_string(), ());
                        }
                        Err(e) => {
                            error!("Failed to process {}: {}", company.id, e);
                            guard.record_failure(&company, &e);
                        }
                    }
                    drop(guard);
                    bar.inc(1);
                }
            },
        )
        .await;

        bar.finish_and_clear();

        let succeeded = succeeded.lock().await;
        work.iter()
            .filter(|c| succeeded.contains_key(c.id.as_str()))
            .cloned()
            .collect()
    }

    /// Acquire (or reuse cached extraction), normalize, and index one
    /// entity.
    async fn ingest_entity(&self, company: &Company) -> Result<IngestOutcome> {
        let cached = if self.options.force_refetch {
            None
        } else {
            self.extracted.load(&company.id)
        };

        let (cleaned, from_cache) = match cached {
            Some(record) => {
                info!("Using cached extraction for {}", company.id);
                (record.text, true)
            }
            None => {
                let raw = self.acquirer.acquire(&company.url).await?;
                let cleaned = clean_content(&raw);

                if !cleaned.trim().is_empty() {
                    let record = ExtractedRecord::new(&company.url, cleaned.clone(), raw.method);
                    if let Err(e) = self.extracted.save(&company.id, &record) {
                        warn!("Failed to cache extraction for {}: {}", company.id, e);
                    }
                }
                (cleaned, false)
            }
        };

        let segments = segment_clean_text(&cleaned, &company.id, &self.config.chunk)?;
        if segments.is_empty() {
            warn!("No indexable content for {}", company.id);
            return Ok(IngestOutcome {
                segments: 0,
                cost: 0.0,
                from_cache,
            });
        }

        let receipt = self.indexer.index_segments(company, &segments).await?;

        Ok(IngestOutcome {
            segments: receipt.segments,
            cost: receipt.cost,
            from_cache,
        })
    }

    /// Generate phase: strictly sequential provider calls.
    async fn generate_all(&self, companies: &[Company], ledger: &Arc<Mutex<RunLedger>>) {
        for company in companies {
            match self.generate_entity(company).await {
                Ok(cost) => {
                    let mut guard = ledger.lock().await;
                    guard.generation_cost += cost;
                    guard.record_success(&company.id);
                }
                Err(e) => {
                    error!("Failed to generate factsheet for {}: {}", company.id, e);
                    ledger.lock().await.record_failure(company, &e);
                }
            }
        }
    }

    /// Retrieve evidence, generate, and write one factsheet. Returns the
    /// accumulated provider cost for this entity.
    async fn generate_entity(&self, company: &Company) -> Result<f64> {
        let template = self.templates.template(&company.industry)?;
        let placeholders = self.templates.placeholders(&company.industry)?;

        let retrieval = retrieve(
            self.indexer.as_ref() as &dyn EvidenceSource,
            &self.config.retrieve,
            &company.id,
            &placeholders,
        )
        .await?;

        if retrieval.items.is_empty() {
            return Err(Error::NoEvidence(company.id.to_string()));
        }

        let factsheet = self
            .generator
            .generate(company, &template, &retrieval.items)
            .await?;

        self.writer.write(
            &company.url,
            &company.industry,
            &factsheet,
            self.options.overwrite,
        )?;

        Ok(retrieval.cost + factsheet.cost)
    }

    async fn summarize(
        &self,
        ledger: &Arc<Mutex<RunLedger>>,
        dispatched: usize,
        skipped: usize,
    ) -> RunSummary {
        let guard = ledger.lock().await;

        let succeeded = guard
            .states
            .values()
            .filter(|s| **s == EntityState::Succeeded)
            .count();
        let failed = guard
            .states
            .values()
            .filter(|s| **s == EntityState::Failed)
            .count();

        RunSummary {
            dispatched,
            skipped_processed: skipped,
            succeeded,
            failed,
            from_cache: guard.from_cache,
            freshly_fetched: guard.freshly_fetched,
            embedding_cost: guard.embedding_cost,
            generation_cost: guard.generation_cost,
            failures: guard.checkpoint.failed.clone(),
        }
    }
}

/// Work set for a run: the input minus already-processed identifiers,
/// first occurrence per id. Returns the remaining companies in input
/// order and the count skipped via the checkpoint.
pub fn compute_work_set(companies: Vec<Company>, checkpoint: &Checkpoint) -> (Vec<Company>, usize) {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut work: Vec<Company> = Vec::new();
    let mut skipped = 0usize;

    for company in companies {
        if seen.insert(company.id.as_str().to_string(), ()).is_some() {
            continue;
        }
        if checkpoint.is_processed(&company.id) {
            info!("Skipping already processed: {}", company.id);
            skipped += 1;
            continue;
        }
        work.push(company);
    }

    (work, skipped)
}

/// Bounded concurrent fan-out: at most `limit` futures in flight.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, f: F)
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
{
    stream::iter(items)
        .for_each_concurrent(limit.max(1), f)
        .await;
}

/// Print the run summary in the human-readable format
pub fn print_summary(summary: &RunSummary) {
    println!("\n==================================================");
    println!("PROCESSING SUMMARY");
    println!("==================================================");
    println!("Dispatched:            {}", summary.dispatched);
    println!("Succeeded:             {}", summary.succeeded);
    println!("Failed:                {}", summary.failed);
    println!("Skipped (checkpoint):  {}", summary.skipped_processed);

    if summary.from_cache > 0 || summary.freshly_fetched > 0 {
        println!("\nDATA SOURCES");
        println!("  Cached extractions:  {}", summary.from_cache);
        println!("  Freshly fetched:     {}", summary.freshly_fetched);
    }

    println!("\nCOSTS");
    println!("  Embedding:  ${:.4}", summary.embedding_cost);
    println!("  Generation: ${:.4}", summary.generation_cost);
    println!(
        "  Total:      ${:.4}",
        summary.embedding_cost + summary.generation_cost
    );

    if !summary.failures.is_empty() {
        println!("\nFailed companies:");
        for failure in &summary.failures {
            println!("  - {}: {}", failure.url, failure.error);
        }
    }
}
