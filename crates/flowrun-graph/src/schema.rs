use flowrun_core::config::MissingField;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{Result, ValidationIssue};
use flowrun_core::widget::Widget;
use flowrun_expr::evaluator::Evaluator;
use flowrun_expr::value::{as_f64, number, to_text, truthy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Object,
    Array,
    #[default]
    String,
    Number,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Object, Value::Object(_))
                | (FieldType::Array, Value::Array(_))
                | (FieldType::String, Value::String(_))
                | (FieldType::Number, Value::Number(_))
                | (FieldType::Boolean, Value::Bool(_))
        )
    }

    /// Best-effort conversion of scalars to this type; other values pass through.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::String, v @ (Value::Number(_) | Value::Bool(_))) => {
                Value::String(to_text(&v))
            }
            (FieldType::Number, v @ (Value::String(_) | Value::Bool(_))) => {
                as_f64(&v).and_then(number).unwrap_or(v)
            }
            (FieldType::Boolean, Value::String(s)) if s == "true" || s == "false" => {
                Value::Bool(s == "true")
            }
            (FieldType::Boolean, v @ Value::Number(_)) => Value::Bool(truthy(&v)),
            (_, v) => v,
        }
    }

    /// Empty value of this type.
    pub fn zero(&self) -> Value {
        match self {
            FieldType::Object => Value::Object(Map::new()),
            FieldType::Array => Value::Array(Vec::new()),
            FieldType::String => Value::String(String::new()),
            FieldType::Number => Value::from(0),
            FieldType::Boolean => Value::Bool(false),
        }
    }
}

/// One declared field of a node's input or output shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Value bound to this field, resolved against the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Widget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaField>,
}

impl SchemaField {
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            title: None,
            field_type,
            required: false,
            value: None,
            children: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_value(mut self, widget: Widget) -> Self {
        self.value = Some(widget);
        self
    }

    pub fn with_children(mut self, children: Vec<SchemaField>) -> Self {
        self.children = children;
        self
    }

    fn skeleton(&self) -> Value {
        if self.field_type == FieldType::Object && !self.children.is_empty() {
            Value::Object(skeleton(&self.children))
        } else {
            self.field_type.zero()
        }
    }
}

/// Declared shape of a node's data (`NodeOutput` / `NodeInput`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    /// Type and presence problems of `data` against this shape.
    pub fn check(&self, node_id: &str, data: &Map<String, Value>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check_fields(node_id, "", &self.fields, data, &mut issues);
        issues
    }

    /// Evaluate every field's bound widget.
    ///
    /// Required fields fail on unresolved references; optional ones resolve
    /// to `null`. Object fields without a value are built from their children.
    pub fn resolve(&self, evaluator: &Evaluator, ctx: &ExecutionData) -> Result<Map<String, Value>> {
        resolve_fields(&self.fields, evaluator, ctx)
    }

    /// A const widget holding an empty JSON skeleton of this shape.
    pub fn to_widget(&self) -> Widget {
        Widget::value(Value::Object(skeleton(&self.fields)))
    }

    /// Pick the declared keys out of `value`, coercing scalars to their
    /// declared types. Absent keys become `null`.
    pub fn project(&self, value: &Value) -> Map<String, Value> {
        project_fields(&self.fields, value)
    }
}

fn check_fields(
    node_id: &str,
    prefix: &str,
    fields: &[SchemaField],
    data: &Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) {
    for field in fields {
        let path = format!("{prefix}{}", field.key);
        match data.get(&field.key) {
            None | Some(Value::Null) => {
                if field.required {
                    issues.push(ValidationIssue::field(node_id, &path, "required field is missing"));
                }
            }
            Some(value) if !field.field_type.matches(value) => {
                issues.push(ValidationIssue::field(
                    node_id,
                    &path,
                    format!("expected {}, got {}", field.field_type.as_str(), type_name(value)),
                ));
            }
            Some(Value::Object(inner)) if !field.children.is_empty() => {
                check_fields(node_id, &format!("{path}."), &field.children, inner, issues);
            }
            Some(_) => {}
        }
    }
}

fn resolve_fields(
    fields: &[SchemaField],
    evaluator: &Evaluator,
    ctx: &ExecutionData,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for field in fields {
        let value = match &field.value {
            Some(widget) => {
                let missing = if field.required {
                    MissingField::Error
                } else {
                    MissingField::Null
                };
                field
                    .field_type
                    .coerce(evaluator.evaluate_with(widget, ctx, missing)?)
            }
            None if field.field_type == FieldType::Object && !field.children.is_empty() => {
                Value::Object(resolve_fields(&field.children, evaluator, ctx)?)
            }
            None => Value::Null,
        };
        out.insert(field.key.clone(), value);
    }
    Ok(out)
}

fn project_fields(fields: &[SchemaField], value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields {
        let found = value.get(&field.key).cloned().unwrap_or(Value::Null);
        let projected = match found {
            Value::Object(_) if field.field_type == FieldType::Object && !field.children.is_empty() => {
                Value::Object(project_fields(&field.children, &found))
            }
            other => field.field_type.coerce(other),
        };
        out.insert(field.key.clone(), projected);
    }
    out
}

fn skeleton(fields: &[SchemaField]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| (f.key.clone(), f.skeleton()))
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
