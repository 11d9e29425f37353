use std::collections::VecDeque;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{Result, ValidationIssue};
use flowrun_expr::value::to_text;
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::support::require_params;

pub const TEXT_SPLITTER_NODE_TYPE: &str = "text_splitter";

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect()
}

/// Chunking parameters; lengths are counted in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterOptions {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Tried in order; an empty separator splits between characters.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

impl SplitterOptions {
    fn issues(&self, node_id: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.chunk_size == 0 {
            issues.push(ValidationIssue::field(node_id, "chunk_size", "must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            issues.push(ValidationIssue::field(
                node_id,
                "chunk_overlap",
                "must be smaller than chunk_size",
            ));
        }
        issues
    }
}

/// Split `text` recursively: the first separator present in the text splits
/// it, and pieces still too long are split again with the remaining
/// separators. Adjacent pieces are merged back into chunks of at most
/// `chunk_size` characters, repeating up to `chunk_overlap` characters of the
/// previous chunk.
pub fn split_text(text: &str, options: &SplitterOptions) -> Vec<String> {
    split_recursive(text, &options.separators, options)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[String], options: &SplitterOptions) -> Vec<String> {
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep.as_str()));
    let (separator, rest) = match position {
        Some(i) => (separators[i].as_str(), &separators[i + 1..]),
        None => ("", &[][..]),
    };

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut short: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) < options.chunk_size {
            short.push(piece);
            continue;
        }
        if !short.is_empty() {
            chunks.extend(merge(&short, separator, options));
            short.clear();
        }
        if rest.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(split_recursive(&piece, rest, options));
        }
    }
    if !short.is_empty() {
        chunks.extend(merge(&short, separator, options));
    }
    chunks
}

fn merge(pieces: &[String], separator: &str, options: &SplitterOptions) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joint = if current.is_empty() { 0 } else { sep_len };
        if total + len + joint > options.chunk_size && !current.is_empty() {
            push_chunk(&mut chunks, &current, separator);
            loop {
                let joint = if current.is_empty() { 0 } else { sep_len };
                let too_long = total > 0 && total + len + joint > options.chunk_size;
                if total <= options.chunk_overlap && !too_long {
                    break;
                }
                let Some(front) = current.pop_front() else {
                    break;
                };
                let trailing = if current.is_empty() { 0 } else { sep_len };
                total -= char_len(front) + trailing;
            }
        }
        let joint = if current.is_empty() { 0 } else { sep_len };
        current.push_back(piece);
        total += len + joint;
    }
    push_chunk(&mut chunks, &current, separator);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Splits the `content` param into chunks.
pub struct TextSplitterRunner;

#[async_trait]
impl NodeRunner for TextSplitterRunner {
    fn node_type(&self) -> &str {
        TEXT_SPLITTER_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let mut issues = require_params(node, &["content"]);
        match config_as::<SplitterOptions>(node) {
            Ok(options) => issues.extend(options.issues(&node.id)),
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
        let options: SplitterOptions = step.config_as()?;
        let content = to_text(&step.param("content", ctx)?);
        let chunks = split_text(&content, &options);
        vertex.set("count", Value::from(chunks.len()));
        vertex.set(
            "chunks",
            Value::Array(chunks.into_iter().map(Value::String).collect()),
        );
        vertex.activate(step.all_successors());
        Ok(())
    }
}
