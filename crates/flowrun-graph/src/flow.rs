use std::collections::HashMap;

use flowrun_core::error::{FlowError, Result};

use crate::constants::START_NODE_TYPE;
use crate::node::{Edge, Node};

/// A validated directed graph of nodes.
///
/// Node ids are unique, non-empty, free of `.` and never start with `$`
/// (which is reserved for scope roots). Every edge endpoint names an existing
/// node and at least one start node exists.
#[derive(Debug, Clone)]
pub struct Flow {
    id: String,
    name: Option<String>,
    nodes: HashMap<String, Node>,
    order: Vec<String>,
    edges: Vec<Edge>,
    start_node_ids: Vec<String>,
}

impl Flow {
    /// Build a flow whose start nodes are every node of type `start`.
    pub fn new(id: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        Self::build(id.into(), nodes, edges, Vec::new())
    }

    /// Build a flow with an explicit list of start nodes.
    pub fn with_start_nodes(
        id: impl Into<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        start_node_ids: Vec<String>,
    ) -> Result<Self> {
        Self::build(id.into(), nodes, edges, start_node_ids)
    }

    fn build(id: String, nodes: Vec<Node>, edges: Vec<Edge>, explicit: Vec<String>) -> Result<Self> {
        let mut map = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        for node in nodes {
            validate_node_id(&node.id)?;
            if map.contains_key(&node.id) {
                return Err(FlowError::InvalidFlow(format!(
                    "Duplicate node id: '{}'",
                    node.id
                )));
            }
            order.push(node.id.clone());
            map.insert(node.id.clone(), node);
        }

        for edge in &edges {
            for (endpoint, role) in [(&edge.source, "source"), (&edge.target, "target")] {
                if !map.contains_key(endpoint) {
                    return Err(FlowError::InvalidFlow(format!(
                        "Unknown node '{endpoint}' referenced as edge {role}"
                    )));
                }
            }
        }

        let start_node_ids: Vec<String> = if explicit.is_empty() {
            order
                .iter()
                .filter(|id| map[id.as_str()].node_type == START_NODE_TYPE)
                .cloned()
                .collect()
        } else {
            for id in &explicit {
                if !map.contains_key(id) {
                    return Err(FlowError::InvalidFlow(format!(
                        "Start node '{id}' does not exist"
                    )));
                }
            }
            explicit
        };

        let flow = Self {
            id,
            name: None,
            nodes: map,
            order,
            edges,
            start_node_ids,
        };
        flow.ensure_start()?;
        Ok(flow)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn ensure_start(&self) -> Result<()> {
        if self.start_node_ids.is_empty() {
            return Err(FlowError::InvalidFlow(format!(
                "Flow '{}' has no start node",
                self.id
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Outgoing edges of `id`, in declaration order.
    pub fn edges_from(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == id).collect()
    }

    /// Distinct targets reachable from `id` through `handle`.
    pub fn successors(&self, id: &str, handle: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for edge in &self.edges {
            if edge.source == id && edge.source_handle == handle && !out.contains(&edge.target.as_str())
            {
                out.push(&edge.target);
            }
        }
        out
    }

    pub fn start_node_ids(&self) -> &[String] {
        &self.start_node_ids
    }
}

fn validate_node_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(FlowError::InvalidFlow("Node id must not be empty".into()));
    }
    if id.starts_with('$') {
        return Err(FlowError::InvalidFlow(format!(
            "Node id '{id}' uses the reserved '$' prefix"
        )));
    }
    if id.contains('.') {
        return Err(FlowError::InvalidFlow(format!(
            "Node id '{id}' must not contain '.'"
        )));
    }
    Ok(())
}
