//! Per-entity vector index
//!
//! This module wraps the Qdrant client and composes it with the
//! embedding provider:
//! - collection management
//! - idempotent segment upsert (deterministic point ids)
//! - partitioned nearest-neighbor queries (never across entities)

mod payload;

pub use payload::*;

use crate::batch::{Company, EntityId};
use crate::chunk::Segment;
use crate::config::IndexConfig;
use crate::error::Result;
use crate::provider::{embed_in_batches, CostModel, Provider};
use chrono::Utc;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, ScalarQuantizationBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One retrieval result. Transient — constructed per query, never stored.
#[derive(Debug, Clone)]
pub struct EvidenceItem {
    pub text: String,
    /// Cosine distance; lower is more relevant.
    pub distance: f32,
    pub fingerprint: String,
    pub entity_id: EntityId,
}

/// Information about the backing collection
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub indexed_vectors_count: u64,
    pub status: String,
}

/// Qdrant store handle
pub struct SegmentStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl SegmentStore {
    /// Create a new store connection
    pub async fn new(config: &IndexConfig, dimension: usize) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", config.qdrant_url);

        let client = Qdrant::from_url(&config.qdrant_url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| crate::error::Error::Index(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection_name.clone(),
            dimension,
        })
    }

    /// Ensure the collection exists with correct configuration
    pub async fn ensure_collection(&self) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;
        if exists {
            debug!("Collection {} already exists", self.collection);
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .quantization_config(ScalarQuantizationBuilder::default()),
            )
            .await?;

        Ok(())
    }

    /// Get collection info (point count, etc)
    pub async fn collection_info(&self) -> Result<Option<CollectionInfo>> {
        if !self.client.collection_exists(&self.collection).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(&self.collection).await?;
        Ok(info.result.map(|r| CollectionInfo {
            points_count: r.points_count.unwrap_or(0),
            indexed_vectors_count: r.indexed_vectors_count.unwrap_or(0),
            status: format!("{:?}", r.status()),
        }))
    }

    /// Reset the collection (delete and recreate)
    pub async fn reset_collection(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            info!("Deleting existing collection {}", self.collection);
            self.client.delete_collection(&self.collection).await?;
        }
        self.ensure_collection().await
    }

    /// Upsert segment points. Point ids are deterministic, so repeating
    /// an upsert overwrites instead of duplicating.
    pub async fn upsert_points(&self, points: Vec<SegmentPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        debug!(
            "Upserting {} points to collection {}",
            points.len(),
            self.collection
        );

        let point_structs: Vec<_> = points.into_iter().map(|p| p.to_point_struct()).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, point_structs))
            .await?;

        Ok(())
    }

    /// Search one entity's partition. The company filter is mandatory —
    /// results never cross entity boundaries, and an unknown entity
    /// simply matches nothing.
    pub async fn search(
        &self,
        entity_id: &EntityId,
        query_vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredSegment>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if !self.client.collection_exists(&self.collection).await? {
            warn!("Collection {} does not exist yet", self.collection);
            return Ok(Vec::new());
        }

        let filter = Filter {
            must: vec![Condition::matches(
                "company_id",
                entity_id.as_str().to_string(),
            )],
            should: vec![],
            must_not: vec![],
            min_should: None,
        };

        let search = SearchPointsBuilder::new(&self.collection, query_vector, limit as u64)
            .with_payload(true)
            .filter(filter);

        let response = self.client.search_points(search).await?;

        let results = response
            .result
            .into_iter()
            .map(|p| {
                let payload: SegmentPayload = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();

                ScoredSegment {
                    score: p.score,
                    payload,
                }
            })
            .collect();

        Ok(results)
    }
}

/// One raw search hit: cosine similarity score plus payload
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    pub score: f32,
    pub payload: SegmentPayload,
}

/// Deterministic point id for (entity, segment index). Re-upserting the
/// same segment therefore lands on the same point.
pub fn segment_point_id(entity_id: &EntityId, segment_index: usize) -> Uuid {
    let key = format!("{}:{}", entity_id.as_str(), segment_index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

/// Convert similarity-scored hits into distance-ordered evidence, pruning
/// anything beyond `max_distance`.
pub fn to_evidence(
    results: Vec<ScoredSegment>,
    entity_id: &EntityId,
    max_distance: f32,
) -> Vec<EvidenceItem> {
    let mut items: Vec<EvidenceItem> = results
        .into_iter()
        .map(|r| EvidenceItem {
            distance: 1.0 - r.score,
            text: r.payload.text,
            fingerprint: r.payload.fingerprint,
            entity_id: entity_id.clone(),
        })
        .filter(|item| item.distance <= max_distance)
        .collect();

    items.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    items
}

/// Receipt for one indexing pass
#[derive(Debug, Clone)]
pub struct IndexReceipt {
    pub segments: usize,
    pub cost: f64,
}

/// Composes the embedding provider with the segment store.
pub struct Indexer {
    store: SegmentStore,
    provider: Arc<dyn Provider>,
    cost_model: CostModel,
    embedding_batch_size: usize,
}

impl Indexer {
    pub fn new(
        store: SegmentStore,
        provider: Arc<dyn Provider>,
        cost_model: CostModel,
        embedding_batch_size: usize,
    ) -> Self {
        Self {
            store,
            provider,
            cost_model,
            embedding_batch_size,
        }
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    /// Embed and upsert one entity's segments. Idempotent per
    /// (entity, segment index).
    pub async fn index_segments(
        &self,
        company: &Company,
        segments: &[Segment],
    ) -> Result<IndexReceipt> {
        if segments.is_empty() {
            return Ok(IndexReceipt {
                segments: 0,
                cost: 0.0,
            });
        }

        self.store.ensure_collection().await?;

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let batch = embed_in_batches(self.provider.as_ref(), &texts, self.embedding_batch_size)
            .await?;

        let indexed_at = Utc::now().to_rfc3339();
        let points: Vec<SegmentPoint> = segments
            .iter()
            .zip(batch.vectors)
            .map(|(segment, vector)| SegmentPoint {
                id: segment_point_id(&company.id, segment.index),
                vector,
                payload: SegmentPayload {
                    company_id: company.id.as_str().to_string(),
                    source_url: company.url.clone(),
                    industry: company.industry.clone(),
                    segment_index: segment.index as i32,
                    word_len: segment.word_len as i32,
                    text: segment.text.clone(),
                    fingerprint: blake3::hash(segment.text.as_bytes()).to_hex().to_string(),
                    indexed_at: indexed_at.clone(),
                },
            })
            .collect();

        let count = points.len();
        self.store.upsert_points(points).await?;

        Ok(IndexReceipt {
            segments: count,
            cost: self.cost_model.embedding_cost(batch.tokens),
        })
    }

    /// Query one entity's partition with a text query. Returns the
    /// pruned evidence list and the embedding cost of the query itself.
    pub async fn query(
        &self,
        entity_id: &EntityId,
        text: &str,
        k: usize,
        max_distance: f32,
    ) -> Result<(Vec<EvidenceItem>, f64)> {
        if k == 0 {
            return Ok((Vec::new(), 0.0));
        }

        let batch = self.provider.embed(&[text.to_string()]).await?;
        let cost = self.cost_model.embedding_cost(batch.tokens);

        let Some(vector) = batch.vectors.into_iter().next() else {
            return Err(crate::error::Error::Embedding(
                "No embedding returned for query".to_string(),
            ));
        };

        let hits = self.store.search(entity_id, vector, k).await?;
        Ok((to_evidence(hits, entity_id, max_distance), cost))
    }
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(json_from_qdrant_value).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> EntityId {
        EntityId::from_url("https://acme.com").unwrap()
    }

    fn scored(score: f32, text: &str) -> ScoredSegment {
        ScoredSegment {
            score,
            payload: SegmentPayload {
                company_id: "acme.com".to_string(),
                source_url: "https://acme.com".to_string(),
                industry: "technology".to_string(),
                segment_index: 0,
                word_len: 5,
                text: text.to_string(),
                fingerprint: blake3::hash(text.as_bytes()).to_hex().to_string(),
                indexed_at: String::new(),
            },
        }
    }

    #[test]
    fn test_segment_point_id_deterministic() {
        let id = entity();
        assert_eq!(segment_point_id(&id, 0), segment_point_id(&id, 0));
        assert_ne!(segment_point_id(&id, 0), segment_point_id(&id, 1));

        let other = EntityId::from_url("https://other.com").unwrap();
        assert_ne!(segment_point_id(&id, 0), segment_point_id(&other, 0));
    }

    #[test]
    fn test_to_evidence_converts_and_prunes() {
        let hits = vec![
            scored(0.9, "close match"),
            scored(0.5, "far match"),
            scored(0.8, "near match"),
        ];

        let items = to_evidence(hits, &entity(), 0.25);

        // score 0.5 → distance 0.5 is pruned by the 0.25 cutoff
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "close match");
        assert!(items[0].distance < items[1].distance);
        assert!((items[0].distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_to_evidence_empty() {
        let items = to_evidence(Vec::new(), &entity(), 0.25);
        assert!(items.is_empty());
    }
}
