use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Similarity query against one knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub knowledge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    pub top_k: usize,
    /// Exact-match filter on document metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata_filter: Map<String, Value>,
}

/// Deletion request; either `ids` or `metadata_filter` selects documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorDelete {
    pub knowledge_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata_filter: Map<String, Value>,
}

/// A scored search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Narrow interface to the vector store collaborator.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search for similar documents, best first, at most `top_k`.
    async fn search(&self, query: VectorQuery) -> Result<Vec<VectorHit>>;

    /// Delete documents, returning how many were removed.
    async fn delete(&self, request: VectorDelete) -> Result<usize>;
}
