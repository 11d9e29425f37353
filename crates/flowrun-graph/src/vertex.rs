use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failure details reported by a runner that did not raise an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexError {
    pub code: String,
    pub message: String,
}

/// Per-node execution outcome.
///
/// Runners fill `result` and choose `children_ids`; the executor merges the
/// result into the context and activates the children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexResult {
    pub node_id: String,
    pub result: Map<String, Value>,
    pub children_ids: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VertexError>,
}

impl VertexResult {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            result: Map::new(),
            children_ids: Vec::new(),
            success: true,
            error: None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.result.insert(key.into(), value);
    }

    pub fn extend(&mut self, values: Map<String, Value>) {
        for (k, v) in values {
            self.result.insert(k, v);
        }
    }

    /// Append children, skipping ids already present.
    pub fn activate<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.children_ids.contains(&id) {
                self.children_ids.push(id);
            }
        }
    }

    pub fn fail(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.success = false;
        self.error = Some(VertexError {
            code: code.into(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activate_deduplicates() {
        let mut v = VertexResult::new("a");
        v.activate(["b", "c"]);
        v.activate(vec!["c".to_string(), "d".to_string()]);
        assert_eq!(v.children_ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn fail_marks_unsuccessful() {
        let mut v = VertexResult::new("a");
        v.set("partial", json!(1));
        v.fail("bad_input", "nope");
        assert!(!v.success);
        assert_eq!(v.error.as_ref().unwrap().code, "bad_input");
        assert_eq!(v.result["partial"], json!(1));
    }
}
