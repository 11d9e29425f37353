use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::vector::{VectorDelete, VectorHit, VectorQuery, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// A document held by [`InMemoryVectorStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Map::new(),
            embedding: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    fn matches(&self, filter: &Map<String, Value>) -> bool {
        filter.iter().all(|(k, v)| self.metadata.get(k) == Some(v))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Share of the query's distinct terms that appear in `content`.
pub fn term_overlap(query: &str, content: &str) -> f32 {
    let wanted = terms(query);
    if wanted.is_empty() {
        return 0.0;
    }
    let present = terms(content);
    wanted.intersection(&present).count() as f32 / wanted.len() as f32
}

/// Vector store kept in process memory, one collection per knowledge id.
///
/// Queries with a vector rank by cosine similarity against stored
/// embeddings; text queries rank by term overlap. Hits scoring zero are
/// dropped.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    data: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace documents by id, returning their ids.
    pub async fn add_documents(
        &self,
        knowledge_id: &str,
        docs: Vec<StoredDocument>,
    ) -> Vec<String> {
        let mut data = self.data.write().await;
        let collection = data.entry(knowledge_id.to_string()).or_default();
        docs.into_iter()
            .map(|doc| {
                let id = doc.id.clone();
                collection.retain(|d| d.id != id);
                collection.push(doc);
                id
            })
            .collect()
    }

    pub async fn len(&self, knowledge_id: &str) -> usize {
        self.data
            .read()
            .await
            .get(knowledge_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, query: VectorQuery) -> Result<Vec<VectorHit>> {
        if query.vector.is_none() && query.query.is_none() {
            return Err(ExternalCallError::rejected("vector_store", "query or vector is required").into());
        }
        let data = self.data.read().await;
        let Some(collection) = data.get(&query.knowledge_id) else {
            return Ok(Vec::new());
        };

        let score = |doc: &StoredDocument| -> f32 {
            match (&query.vector, &doc.embedding, &query.query) {
                (Some(v), Some(e), _) => cosine_similarity(v, e),
                (_, _, Some(text)) => term_overlap(text, &doc.content),
                _ => 0.0,
            }
        };

        let mut hits: Vec<VectorHit> = collection
            .iter()
            .filter(|doc| doc.matches(&query.metadata_filter))
            .map(|doc| VectorHit {
                id: doc.id.clone(),
                content: doc.content.clone(),
                score: score(doc),
                metadata: doc.metadata.clone(),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.top_k);
        Ok(hits)
    }

    async fn delete(&self, request: VectorDelete) -> Result<usize> {
        if request.ids.is_empty() && request.metadata_filter.is_empty() {
            return Err(ExternalCallError::rejected(
                "vector_store",
                "ids or metadata_filter is required",
            )
            .into());
        }
        let mut data = self.data.write().await;
        let Some(collection) = data.get_mut(&request.knowledge_id) else {
            return Ok(0);
        };
        let before = collection.len();
        collection.retain(|doc| {
            let by_id = !request.ids.is_empty() && request.ids.contains(&doc.id);
            let by_meta = !request.metadata_filter.is_empty() && doc.matches(&request.metadata_filter);
            !(by_id || by_meta)
        });
        Ok(before - collection.len())
    }
}
