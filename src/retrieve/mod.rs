//! Evidence retrieval
//!
//! Maps template placeholders to targeted queries, fans them out against
//! one entity's index partition, and merges the per-query result sets
//! into a deduplicated evidence list capped at `total_k` items.

use crate::batch::EntityId;
use crate::config::RetrieveConfig;
use crate::error::Result;
use crate::index::{EvidenceItem, Indexer};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Seam over the index query contract so retrieval logic is testable
/// without a running vector store.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn query(
        &self,
        entity_id: &EntityId,
        text: &str,
        k: usize,
        max_distance: f32,
    ) -> Result<(Vec<EvidenceItem>, f64)>;
}

#[async_trait]
impl EvidenceSource for Indexer {
    async fn query(
        &self,
        entity_id: &EntityId,
        text: &str,
        k: usize,
        max_distance: f32,
    ) -> Result<(Vec<EvidenceItem>, f64)> {
        Indexer::query(self, entity_id, text, k, max_distance).await
    }
}

/// Outcome of one retrieval pass
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub items: Vec<EvidenceItem>,
    pub cost: f64,
    pub queries_run: usize,
    pub queries_failed: usize,
}

/// Generic query inserted when no placeholder covers the basics
const OVERVIEW_QUERY: &str = "company overview about business";

/// Map a placeholder name to a natural-language query. Unknown names fall
/// back to the name itself with separators replaced by spaces.
pub fn placeholder_query(name: &str) -> String {
    let mapped = match name {
        "company_overview" => "company overview mission vision about",
        "business_focus" => "business focus core services main activities",
        "products_services" => "products services offerings solutions",
        "market_position" => "market position competitive advantage",
        "key_metrics" => "performance metrics financial results revenue",
        "recent_developments" => "recent news updates developments announcements",
        "leadership_team" => "leadership team management executives founders",
        "locations_operations" => "locations offices operations facilities",
        "financial_highlights" => "financial performance revenue profit growth",
        "growth_strategy" => "strategy growth plans future expansion",
        "technology_stack" => "technology platform technical infrastructure",
        "construction_specialties" => "construction projects building specialties",
        "certifications_licenses" => "certifications licenses accreditations",
        "safety_record" => "safety record standards compliance",
        "healthcare_focus" => "healthcare medical clinical focus areas",
        "regulatory_compliance" => "regulatory compliance approvals standards",
        _ => return name.replace(['_', '-'], " "),
    };
    mapped.to_string()
}

/// Build the query set for one template's placeholders: mapped queries in
/// placeholder order, a generic overview query when none covers it, at
/// most `max_queries` in total.
pub fn build_queries(placeholders: &[String], max_queries: usize) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();

    for placeholder in placeholders.iter().take(6) {
        let query = placeholder_query(placeholder);
        if !queries.contains(&query) {
            queries.push(query);
        }
    }

    if !queries.iter().any(|q| q.contains("company overview")) {
        queries.insert(0, OVERVIEW_QUERY.to_string());
    }

    queries.truncate(max_queries);
    queries
}

/// Retrieve a deduplicated evidence set for one entity.
///
/// The per-query quota is `total_k / query_count` with the remainder
/// deliberately dropped (integer division, kept for compatibility with
/// the established retrieval behavior). Failed queries are logged and
/// skipped; they never abort the retrieval.
pub async fn retrieve(
    source: &dyn EvidenceSource,
    config: &RetrieveConfig,
    entity_id: &EntityId,
    placeholders: &[String],
) -> Result<Retrieval> {
    let queries = build_queries(placeholders, config.max_queries);
    if queries.is_empty() {
        return Ok(Retrieval::default());
    }

    let per_query_k = config.total_k / queries.len();
    debug!(
        "Retrieving for {}: {} queries, {} items each",
        entity_id,
        queries.len(),
        per_query_k
    );

    let mut retrieval = Retrieval::default();
    let mut seen: HashSet<String> = HashSet::new();

    'queries: for query in &queries {
        retrieval.queries_run += 1;

        let (items, cost) = match source
            .query(entity_id, query, per_query_k, config.max_distance)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Query '{}' failed for {}: {}", query, entity_id, e);
                retrieval.queries_failed += 1;
                continue;
            }
        };
        retrieval.cost += cost;

        for item in items {
            let key = if item.fingerprint.is_empty() {
                item.text.clone()
            } else {
                item.fingerprint.clone()
            };

            if !seen.insert(key) {
                continue;
            }

            retrieval.items.push(item);
            if retrieval.items.len() >= config.total_k {
                break 'queries;
            }
        }
    }

    debug!(
        "Retrieved {} unique items for {} ({} of {} queries failed)",
        retrieval.items.len(),
        entity_id,
        retrieval.queries_failed,
        retrieval.queries_run
    );

    Ok(retrieval)
}
