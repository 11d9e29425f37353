use std::collections::HashMap;
use std::sync::Arc;

use flowrun_core::error::{FlowError, Result};

use crate::node::Node;
use crate::runner::NodeRunner;

/// Registry mapping `(node type, version)` to runners.
///
/// Populated while building the engine and read-only afterwards.
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: HashMap<(String, String), Arc<dyn NodeRunner>>,
}

impl RunnerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner under its own type and version, replacing any previous one.
    pub fn register(&mut self, runner: Arc<dyn NodeRunner>) {
        let key = (runner.node_type().to_string(), runner.version().to_string());
        self.runners.insert(key, runner);
    }

    pub fn with(mut self, runner: Arc<dyn NodeRunner>) -> Self {
        self.register(runner);
        self
    }

    /// Check if a node type is registered at a version.
    pub fn has_type(&self, node_type: &str, version: &str) -> bool {
        self.runners
            .contains_key(&(node_type.to_string(), version.to_string()))
    }

    /// Look up the runner for a node.
    pub fn resolve(&self, node: &Node) -> Result<Arc<dyn NodeRunner>> {
        self.runners
            .get(&(node.node_type.clone(), node.version.clone()))
            .cloned()
            .ok_or_else(|| FlowError::UnsupportedNodeType {
                node_type: node.node_type.clone(),
                version: node.version.clone(),
            })
    }

    /// Registered `(type, version)` pairs, sorted.
    pub fn types(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .runners
            .keys()
            .map(|(t, v)| (t.as_str(), v.as_str()))
            .collect();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("types", &self.types())
            .finish()
    }
}
