use std::sync::Arc;

use flowrun_core::config::MissingField;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::ExpressionError;
use flowrun_core::widget::{ExprItem, Widget};
use serde_json::Value;

use crate::functions::FunctionCatalog;
use crate::value::{to_text, truthy};

/// Resolves widgets against an [`ExecutionData`].
///
/// Evaluation is pure: the context is only read.
#[derive(Debug, Clone)]
pub struct Evaluator {
    functions: Arc<FunctionCatalog>,
    missing: MissingField,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator with the built-in function catalog and strict missing-field policy.
    pub fn new() -> Self {
        Self {
            functions: Arc::new(FunctionCatalog::with_builtins()),
            missing: MissingField::Error,
        }
    }

    pub fn with_functions(mut self, functions: FunctionCatalog) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    pub fn with_missing(mut self, missing: MissingField) -> Self {
        self.missing = missing;
        self
    }

    pub fn missing(&self) -> MissingField {
        self.missing
    }

    pub fn functions(&self) -> &FunctionCatalog {
        &self.functions
    }

    /// Evaluate with the evaluator's default missing-field policy.
    pub fn evaluate(&self, widget: &Widget, ctx: &ExecutionData) -> Result<Value, ExpressionError> {
        self.evaluate_with(widget, ctx, self.missing)
    }

    /// Evaluate a widget.
    ///
    /// An empty widget yields `null`. A single item yields its value with the
    /// type preserved. Several items are concatenated as text, in order.
    pub fn evaluate_with(
        &self,
        widget: &Widget,
        ctx: &ExecutionData,
        missing: MissingField,
    ) -> Result<Value, ExpressionError> {
        match widget.items() {
            [] => Ok(Value::Null),
            [item] => self.resolve_item(item, ctx, missing),
            items => {
                let mut out = String::new();
                for item in items {
                    out.push_str(&to_text(&self.resolve_item(item, ctx, missing)?));
                }
                Ok(Value::String(out))
            }
        }
    }

    /// Evaluate and apply truthiness.
    pub fn evaluate_bool(&self, widget: &Widget, ctx: &ExecutionData) -> Result<bool, ExpressionError> {
        Ok(truthy(&self.evaluate(widget, ctx)?))
    }

    /// Evaluate and render the result as text.
    pub fn evaluate_text(&self, widget: &Widget, ctx: &ExecutionData) -> Result<String, ExpressionError> {
        Ok(to_text(&self.evaluate(widget, ctx)?))
    }

    fn resolve_item(
        &self,
        item: &ExprItem,
        ctx: &ExecutionData,
        missing: MissingField,
    ) -> Result<Value, ExpressionError> {
        match item {
            ExprItem::Text { value } => Ok(Value::String(value.clone())),
            ExprItem::Input { value } => Ok(value.clone()),
            ExprItem::Fields { value } => {
                let found = ctx.get_path(value)?;
                or_missing(found, value, missing)
            }
            ExprItem::NodeRef { value, name } => {
                let Some(outputs) = ctx.get_node_context(value) else {
                    return or_missing(None, value, missing);
                };
                match name {
                    None => Ok(Value::Object(outputs.clone())),
                    Some(key) => {
                        or_missing(outputs.get(key).cloned(), &format!("{value}.{key}"), missing)
                    }
                }
            }
            ExprItem::Func { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.evaluate_with(arg, ctx, missing))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::trace!(function = %name, args = values.len(), "calling expression function");
                self.functions.call(name, &values)
            }
        }
    }
}

fn or_missing(
    found: Option<Value>,
    path: &str,
    missing: MissingField,
) -> Result<Value, ExpressionError> {
    match (found, missing) {
        (Some(value), _) => Ok(value),
        (None, MissingField::Null) => Ok(Value::Null),
        (None, MissingField::Error) => Err(ExpressionError::UnresolvedField { path: path.into() }),
    }
}
