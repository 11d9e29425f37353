use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ExpressionError;
use crate::record::ChatRecord;

/// Root of paths that read run metadata.
pub const SYS_ROOT: &str = "$sys";

/// Lifetime bucket for cached and user-defined variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Agent,
    User,
    Topic,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Agent, Scope::User, Scope::Topic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Agent => "agent",
            Scope::User => "user",
            Scope::Topic => "topic",
        }
    }

    /// The reserved path root addressing this scope, e.g. `$user`.
    pub fn root(&self) -> &'static str {
        match self {
            Scope::Agent => "$agent",
            Scope::User => "$user",
            Scope::Topic => "$topic",
        }
    }

    pub fn from_root(root: &str) -> Option<Scope> {
        Scope::ALL.into_iter().find(|s| s.root() == root)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Scope::Agent),
            "user" => Ok(Scope::User),
            "topic" => Ok(Scope::Topic),
            other => Err(format!("unknown scope '{other}' (expected agent, user or topic)")),
        }
    }
}

/// What started the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Message,
    Schedule,
    Argument,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Message => "message",
            TriggerKind::Schedule => "schedule",
            TriggerKind::Argument => "argument",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub kind: TriggerKind,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Trigger {
    /// A chat message trigger; the text is exposed as `query`.
    pub fn message(text: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("query".into(), Value::String(text.into()));
        Self {
            kind: TriggerKind::Message,
            payload,
        }
    }

    pub fn arguments(payload: Map<String, Value>) -> Self {
        Self {
            kind: TriggerKind::Argument,
            payload,
        }
    }

    pub fn schedule() -> Self {
        Self {
            kind: TriggerKind::Schedule,
            payload: Map::new(),
        }
    }
}

/// Identity and trigger information for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub topic_id: String,
    #[serde(default)]
    pub trigger: Trigger,
    /// Conversation so far, oldest first.
    #[serde(default)]
    pub history: Vec<ChatRecord>,
    pub started_at: DateTime<Utc>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            agent_id: String::new(),
            user_id: String::new(),
            topic_id: String::new(),
            trigger: Trigger::default(),
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }
}

impl RunMetadata {
    /// The object exposed under `$sys`.
    pub fn system_value(&self) -> Value {
        let query = self
            .trigger
            .payload
            .get("query")
            .cloned()
            .unwrap_or(Value::Null);
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "agent_id": self.agent_id,
            "user_id": self.user_id,
            "topic_id": self.topic_id,
            "trigger_kind": self.trigger.kind.as_str(),
            "query": query,
            "started_at": self.started_at.to_rfc3339(),
        })
    }
}

/// Mutable state shared by every node of one run.
///
/// Owned by the caller; the executor borrows it mutably for the duration of a
/// run, so outputs written before a failure remain readable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionData {
    pub node_outputs: HashMap<String, Map<String, Value>>,
    pub scoped_vars: HashMap<Scope, Map<String, Value>>,
    pub metadata: RunMetadata,
}

impl ExecutionData {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            node_outputs: HashMap::new(),
            scoped_vars: HashMap::new(),
            metadata,
        }
    }

    /// Pre-populate a scope, e.g. with values restored by the host.
    pub fn with_scope(mut self, scope: Scope, vars: Map<String, Value>) -> Self {
        self.scoped_vars.insert(scope, vars);
        self
    }

    /// Merge `data` into the node's output map; later keys overwrite earlier ones.
    pub fn save_node_context(&mut self, node_id: &str, data: Map<String, Value>) {
        let slot = self.node_outputs.entry(node_id.to_string()).or_default();
        for (k, v) in data {
            slot.insert(k, v);
        }
    }

    pub fn get_node_context(&self, node_id: &str) -> Option<&Map<String, Value>> {
        self.node_outputs.get(node_id)
    }

    pub fn get_scoped(&self, scope: Scope, key: &str) -> Option<&Value> {
        self.scoped_vars.get(&scope).and_then(|vars| vars.get(key))
    }

    pub fn set_scoped(&mut self, scope: Scope, key: impl Into<String>, value: Value) {
        self.scoped_vars
            .entry(scope)
            .or_default()
            .insert(key.into(), value);
    }

    pub fn remove_scoped(&mut self, scope: Scope, key: &str) -> Option<Value> {
        self.scoped_vars
            .get_mut(&scope)
            .and_then(|vars| vars.remove(key))
    }

    pub fn scope_vars(&self, scope: Scope) -> Option<&Map<String, Value>> {
        self.scoped_vars.get(&scope)
    }

    /// Resolve a dotted path.
    ///
    /// The first segment is a node id, a scope root (`$agent`, `$user`,
    /// `$topic`) or `$sys`. Later segments index objects by key and arrays by
    /// position. `Ok(None)` means the path is well formed but nothing lives there.
    pub fn get_path(&self, path: &str) -> Result<Option<Value>, ExpressionError> {
        let segments = split_path(path)?;
        let (root, rest) = segments
            .split_first()
            .ok_or_else(|| ExpressionError::InvalidPath { path: path.into() })?;

        if *root == SYS_ROOT {
            let sys = self.metadata.system_value();
            return Ok(traverse(&sys, rest).cloned());
        }

        let base = match Scope::from_root(root) {
            Some(scope) => self.scoped_vars.get(&scope),
            None if root.starts_with('$') => {
                return Err(ExpressionError::InvalidPath { path: path.into() });
            }
            None => self.node_outputs.get(*root),
        };
        let Some(base) = base else {
            return Ok(None);
        };

        let Some((first, tail)) = rest.split_first() else {
            return Ok(Some(Value::Object(base.clone())));
        };
        Ok(base.get(*first).and_then(|v| traverse(v, tail)).cloned())
    }

    /// Write a value at a dotted path, creating intermediate objects.
    ///
    /// `$sys` is read-only. Array elements can be replaced but not appended.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<(), ExpressionError> {
        let invalid = || ExpressionError::InvalidPath { path: path.into() };
        let segments = split_path(path)?;
        let [root, first, tail @ ..] = segments.as_slice() else {
            return Err(invalid());
        };

        let scope = Scope::from_root(root);
        if scope.is_none() && root.starts_with('$') {
            return Err(invalid());
        }
        let existing = match scope {
            Some(scope) => self.scoped_vars.get(&scope),
            None => self.node_outputs.get(*root),
        };
        if !writable(existing.and_then(|m| m.get(*first)), tail) {
            return Err(invalid());
        }

        let map = match scope {
            Some(scope) => self.scoped_vars.entry(scope).or_default(),
            None => self.node_outputs.entry(root.to_string()).or_default(),
        };

        if tail.is_empty() {
            map.insert(first.to_string(), value);
            return Ok(());
        }
        let slot = map
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        assign(slot, tail, value).ok_or_else(invalid)
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, ExpressionError> {
    let segments: Vec<&str> = path.trim().split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ExpressionError::InvalidPath { path: path.into() });
    }
    Ok(segments)
}

fn traverse<'a>(mut current: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Whether `assign` can write through `segments` starting at `slot`.
fn writable(slot: Option<&Value>, segments: &[&str]) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return true;
    };
    match slot {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => writable(map.get(*segment), rest),
        Some(Value::Array(items)) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
            Some(item) => writable(Some(item), rest),
            None => false,
        },
        Some(_) => false,
    }
}

fn assign(slot: &mut Value, segments: &[&str], value: Value) -> Option<()> {
    let Some((segment, rest)) = segments.split_first() else {
        *slot = value;
        return Some(());
    };
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    let next = match slot {
        Value::Object(map) => map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new())),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
        _ => return None,
    };
    assign(next, rest, value)
}
