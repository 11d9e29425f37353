use std::sync::Arc;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{FlowError, Result, ValidationIssue};
use flowrun_core::vector::{VectorDelete, VectorQuery};
use flowrun_expr::value::{as_f64, to_text};
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::Services;
use crate::support::{has_param, object_param, require_params};

pub const VECTOR_SEARCH_NODE_TYPE: &str = "vector_search";
pub const VECTOR_DELETE_NODE_TYPE: &str = "vector_delete";

const MAX_TOP_K: usize = 100;

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Similarity search against one knowledge base.
pub struct VectorSearchRunner {
    services: Arc<Services>,
}

impl VectorSearchRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

fn vector_param(step: &Step<'_>, ctx: &ExecutionData) -> Result<Option<Vec<f32>>> {
    let Some(value) = step.optional_param("vector", ctx)? else {
        return Ok(None);
    };
    let items = match value {
        Value::Array(items) => items,
        Value::String(s) => serde_json::from_str::<Vec<Value>>(&s)
            .map_err(|_| FlowError::invalid(step.node_id(), "vector", "expected an array of numbers"))?,
        _ => return Err(FlowError::invalid(step.node_id(), "vector", "expected an array of numbers")),
    };
    items
        .iter()
        .map(|v| {
            as_f64(v)
                .map(|f| f as f32)
                .ok_or_else(|| FlowError::invalid(step.node_id(), "vector", "expected an array of numbers"))
        })
        .collect::<Result<Vec<f32>>>()
        .map(Some)
}

#[async_trait]
impl NodeRunner for VectorSearchRunner {
    fn node_type(&self) -> &str {
        VECTOR_SEARCH_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let mut issues = require_params(node, &["knowledge_id"]);
        if !has_param(node, "query") && !has_param(node, "vector") {
            issues.push(ValidationIssue::field(&node.id, "query", "either query or vector is required"));
        }
        match config_as::<VectorSearchConfig>(node) {
            Ok(config) if !(1..=MAX_TOP_K).contains(&config.top_k) => {
                issues.push(ValidationIssue::field(
                    &node.id,
                    "top_k",
                    format!("must be between 1 and {MAX_TOP_K}"),
                ));
            }
            Ok(_) => {}
            Err(e) => issues.push(ValidationIssue::field(&node.id, "config", e.to_string())),
        }
        issues
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let config: VectorSearchConfig = step.config_as()?;
        let store = self.services.vectors()?;
        let query = VectorQuery {
            knowledge_id: step.param_text("knowledge_id", ctx)?,
            query: step.optional_param("query", ctx)?.map(|v| to_text(&v)),
            vector: vector_param(step, ctx)?,
            top_k: config.top_k.clamp(1, MAX_TOP_K),
            metadata_filter: object_param(step, "metadata_filter", ctx)?,
        };
        if query.query.is_none() && query.vector.is_none() {
            return Err(FlowError::invalid(
                step.node_id(),
                "query",
                "either query or vector is required",
            ));
        }

        let hits = step
            .external("vector_store", step.config.vector_timeout(), store.search(query))
            .await?;
        vertex.set("count", Value::from(hits.len()));
        vertex.set("documents", serde_json::to_value(hits)?);
        vertex.activate(step.all_successors());
        Ok(())
    }
}

/// Deletes documents by id or metadata from one knowledge base.
pub struct VectorDeleteRunner {
    services: Arc<Services>,
}

impl VectorDeleteRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl NodeRunner for VectorDeleteRunner {
    fn node_type(&self) -> &str {
        VECTOR_DELETE_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let mut issues = require_params(node, &["knowledge_id"]);
        if !has_param(node, "ids") && !has_param(node, "metadata_filter") {
            issues.push(ValidationIssue::field(
                &node.id,
                "ids",
                "either ids or metadata_filter is required",
            ));
        }
        issues
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let store = self.services.vectors()?;
        let ids = match step.optional_param("ids", ctx)? {
            None => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(to_text).collect(),
            Some(single) => vec![to_text(&single)],
        };
        let request = VectorDelete {
            knowledge_id: step.param_text("knowledge_id", ctx)?,
            ids,
            metadata_filter: object_param(step, "metadata_filter", ctx)?,
        };
        if request.ids.is_empty() && request.metadata_filter.is_empty() {
            return Err(FlowError::invalid(
                step.node_id(),
                "ids",
                "either ids or metadata_filter is required",
            ));
        }

        let deleted = step
            .external("vector_store", step.config.vector_timeout(), store.delete(request))
            .await?;
        vertex.set("deleted", Value::from(deleted));
        vertex.activate(step.all_successors());
        Ok(())
    }
}
