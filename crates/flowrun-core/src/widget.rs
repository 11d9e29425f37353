use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Selects which payload list of a [`Widget`] is meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    #[default]
    Const,
    Expression,
}

/// A parameter value container.
///
/// Only the list selected by `kind` is read; the other one is ignored even
/// when present in the stored definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(rename = "type", default)]
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub const_value: Vec<ExprItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression_value: Vec<ExprItem>,
}

/// One unit of an expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprItem {
    /// Literal string fragment.
    Text { value: String },
    /// Raw literal of any JSON type.
    Input { value: Value },
    /// Dotted path into the context, e.g. `"<node_id>.<field>"` or `"$user.name"`.
    Fields { value: String },
    /// Named function applied to evaluated argument widgets.
    Func {
        name: String,
        #[serde(default)]
        args: Vec<Widget>,
    },
    /// Direct reference to another node's output, optionally one exposed key.
    #[serde(rename = "node")]
    NodeRef {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Widget {
    pub fn constant(items: Vec<ExprItem>) -> Self {
        Self {
            kind: WidgetKind::Const,
            const_value: items,
            expression_value: Vec::new(),
        }
    }

    pub fn expression(items: Vec<ExprItem>) -> Self {
        Self {
            kind: WidgetKind::Expression,
            const_value: Vec::new(),
            expression_value: items,
        }
    }

    /// Constant widget holding a single text fragment.
    pub fn text(value: impl Into<String>) -> Self {
        Self::constant(vec![ExprItem::text(value)])
    }

    /// Constant widget holding a single literal of any type.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::constant(vec![ExprItem::input(value)])
    }

    /// Expression widget referencing a single context path.
    pub fn field(path: impl Into<String>) -> Self {
        Self::expression(vec![ExprItem::field(path)])
    }

    /// Expression widget calling a single function.
    pub fn func(name: impl Into<String>, args: Vec<Widget>) -> Self {
        Self::expression(vec![ExprItem::func(name, args)])
    }

    /// The items selected by `kind`.
    pub fn items(&self) -> &[ExprItem] {
        match self.kind {
            WidgetKind::Const => &self.const_value,
            WidgetKind::Expression => &self.expression_value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// The literal value of a widget that needs no context to resolve.
    ///
    /// Only single `text`/`input` widgets qualify; anything else returns `None`.
    pub fn literal(&self) -> Option<Value> {
        match self.items() {
            [ExprItem::Text { value }] => Some(Value::String(value.clone())),
            [ExprItem::Input { value }] => Some(value.clone()),
            _ => None,
        }
    }

    /// Every context path this widget reads, including function arguments.
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_references(self.items(), &mut out);
        out
    }
}

fn collect_references(items: &[ExprItem], out: &mut Vec<String>) {
    for item in items {
        match item {
            ExprItem::Fields { value } => out.push(value.clone()),
            ExprItem::NodeRef { value, name } => match name {
                Some(key) => out.push(format!("{value}.{key}")),
                None => out.push(value.clone()),
            },
            ExprItem::Func { args, .. } => {
                for arg in args {
                    collect_references(arg.items(), out);
                }
            }
            ExprItem::Text { .. } | ExprItem::Input { .. } => {}
        }
    }
}

impl ExprItem {
    pub fn text(value: impl Into<String>) -> Self {
        ExprItem::Text {
            value: value.into(),
        }
    }

    pub fn input(value: impl Into<Value>) -> Self {
        ExprItem::Input {
            value: value.into(),
        }
    }

    pub fn field(path: impl Into<String>) -> Self {
        ExprItem::Fields { value: path.into() }
    }

    pub fn func(name: impl Into<String>, args: Vec<Widget>) -> Self {
        ExprItem::Func {
            name: name.into(),
            args,
        }
    }

    pub fn node(node_id: impl Into<String>, key: Option<&str>) -> Self {
        ExprItem::NodeRef {
            value: node_id.into(),
            name: key.map(str::to_string),
        }
    }
}
