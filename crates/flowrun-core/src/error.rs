use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the flowrun engine.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("External call failed: {0}")]
    ExternalCall(#[from] ExternalCallError),

    #[error("Unsupported node type: '{node_type}' (version {version})")]
    UnsupportedNodeType { node_type: String, version: String },

    #[error("Invalid flow: {0}")]
    InvalidFlow(String),

    #[error("Node reported failure [{code}]: {message}")]
    NodeFailed { code: String, message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Step limit ({limit}) exceeded")]
    StepLimit { limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl FlowError {
    /// Shorthand for a single-issue validation error.
    pub fn invalid(
        node_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        FlowError::Validation(vec![ValidationIssue::field(node_id, field, message)])
    }

    /// Stable classification used in run reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Validation(_) => ErrorKind::Validation,
            FlowError::Expression(_) => ErrorKind::Expression,
            FlowError::ExternalCall(_) => ErrorKind::ExternalCall,
            FlowError::UnsupportedNodeType { .. } => ErrorKind::UnsupportedNodeType,
            FlowError::InvalidFlow(_) => ErrorKind::InvalidFlow,
            FlowError::NodeFailed { .. } => ErrorKind::NodeFailed,
            FlowError::Cancelled => ErrorKind::Cancelled,
            FlowError::StepLimit { .. } => ErrorKind::StepLimit,
            FlowError::Serialization(_) | FlowError::Other(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised while resolving a widget against the execution context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Unresolved field reference '{path}'")]
    UnresolvedField { path: String },

    #[error("Invalid field path '{path}'")]
    InvalidPath { path: String },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("Function '{name}' failed: {detail}")]
    FunctionFailed { name: String, detail: String },
}

/// Failures of an external collaborator (LLM gateway, HTTP, vector store, tools).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExternalCallError {
    #[error("{service} timed out after {after_ms}ms")]
    Timeout { service: String, after_ms: u64 },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} transport failure: {detail}")]
    Transport { service: String, detail: String },

    #[error("{service} rejected the call: {detail}")]
    Rejected { service: String, detail: String },

    #[error("{service} is not configured")]
    Unavailable { service: String },
}

impl ExternalCallError {
    pub fn transport(service: impl Into<String>, detail: impl fmt::Display) -> Self {
        ExternalCallError::Transport {
            service: service.into(),
            detail: detail.to_string(),
        }
    }

    pub fn rejected(service: impl Into<String>, detail: impl fmt::Display) -> Self {
        ExternalCallError::Rejected {
            service: service.into(),
            detail: detail.to_string(),
        }
    }

    pub fn unavailable(service: impl Into<String>) -> Self {
        ExternalCallError::Unavailable {
            service: service.into(),
        }
    }
}

/// A single structural or semantic problem found in a node definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            field: None,
            message: message.into(),
        }
    }

    pub fn field(
        node_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}: {}", self.node_id, field, self.message),
            None => write!(f, "{}: {}", self.node_id, self.message),
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error classification exposed to callers deciding whether to re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Expression,
    ExternalCall,
    UnsupportedNodeType,
    InvalidFlow,
    NodeFailed,
    Cancelled,
    StepLimit,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Expression => "expression",
            ErrorKind::ExternalCall => "external_call",
            ErrorKind::UnsupportedNodeType => "unsupported_node_type",
            ErrorKind::InvalidFlow => "invalid_flow",
            ErrorKind::NodeFailed => "node_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::StepLimit => "step_limit",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_error_display() {
        let err = ExpressionError::UnresolvedField {
            path: "9527.xxx".into(),
        };
        assert_eq!(err.to_string(), "Unresolved field reference '9527.xxx'");
    }

    #[test]
    fn external_timeout_display() {
        let err = ExternalCallError::Timeout {
            service: "llm".into(),
            after_ms: 1500,
        };
        assert_eq!(err.to_string(), "llm timed out after 1500ms");
    }

    #[test]
    fn validation_joins_issues() {
        let err = FlowError::Validation(vec![
            ValidationIssue::field("n1", "url", "missing"),
            ValidationIssue::new("n2", "no branches"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: n1.url: missing; n2: no branches"
        );
    }

    #[test]
    fn unsupported_node_type_display() {
        let err = FlowError::UnsupportedNodeType {
            node_type: "teleport".into(),
            version: "1".into(),
        };
        assert_eq!(err.to_string(), "Unsupported node type: 'teleport' (version 1)");
    }

    #[test]
    fn flow_error_from_expression_error() {
        let err: FlowError = ExpressionError::UnknownFunction { name: "nope".into() }.into();
        assert!(matches!(err, FlowError::Expression(_)));
        assert_eq!(err.kind(), ErrorKind::Expression);
    }

    #[test]
    fn flow_error_from_external_error() {
        let err: FlowError = ExternalCallError::unavailable("vector_store").into();
        assert_eq!(err.kind(), ErrorKind::ExternalCall);
        assert!(err.to_string().contains("vector_store is not configured"));
    }

    #[test]
    fn kinds_have_stable_codes() {
        assert_eq!(FlowError::Cancelled.kind().as_str(), "cancelled");
        assert_eq!(FlowError::StepLimit { limit: 3 }.kind().as_str(), "step_limit");
        assert_eq!(FlowError::Other("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(
            serde_json::to_value(ErrorKind::UnsupportedNodeType).unwrap(),
            serde_json::json!("unsupported_node_type")
        );
    }
}
