//! Payload schema for indexed segments

use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// A point ready to be upserted to the vector store
#[derive(Debug, Clone)]
pub struct SegmentPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: SegmentPayload,
}

impl SegmentPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Payload stored with each segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentPayload {
    /// Owning entity identifier — every query filters on this field
    pub company_id: String,

    /// Original company URL
    pub source_url: String,

    /// Industry classification tag
    pub industry: String,

    /// Segment index within the normalization pass
    pub segment_index: i32,

    /// Length in words
    pub word_len: i32,

    /// Segment text (returned as evidence)
    pub text: String,

    /// Blake3 fingerprint of the text, used for retrieval dedup
    pub fingerprint: String,

    /// When this segment was last indexed
    pub indexed_at: String,
}

impl SegmentPayload {
    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("company_id".to_string(), string_to_qdrant(&self.company_id));
        map.insert("source_url".to_string(), string_to_qdrant(&self.source_url));
        map.insert("industry".to_string(), string_to_qdrant(&self.industry));
        map.insert(
            "segment_index".to_string(),
            int_to_qdrant(self.segment_index as i64),
        );
        map.insert("word_len".to_string(), int_to_qdrant(self.word_len as i64));
        map.insert("text".to_string(), string_to_qdrant(&self.text));
        map.insert(
            "fingerprint".to_string(),
            string_to_qdrant(&self.fingerprint),
        );
        map.insert("indexed_at".to_string(), string_to_qdrant(&self.indexed_at));

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(
            s.to_string(),
        )),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

impl From<Map<String, Value>> for SegmentPayload {
    fn from(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_else(|_| SegmentPayload {
            company_id: String::new(),
            source_url: String::new(),
            industry: String::new(),
            segment_index: 0,
            word_len: 0,
            text: String::new(),
            fingerprint: String::new(),
            indexed_at: String::new(),
        })
    }
}
