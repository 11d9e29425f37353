//! Named pure functions callable from `func` expression items.

mod array;
mod date;
mod json;
mod logic;
mod math;
mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use flowrun_core::error::ExpressionError;
use serde_json::Value;

use crate::value::{as_f64, to_text};

/// Result of a single function call; the error is a human-readable detail.
pub type FunctionResult = std::result::Result<Value, String>;

/// A function over already-evaluated arguments.
pub type Function = Arc<dyn Fn(&[Value]) -> FunctionResult + Send + Sync>;

/// Name-indexed table of functions.
#[derive(Clone, Default)]
pub struct FunctionCatalog {
    functions: HashMap<String, Function>,
}

impl FunctionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with every built-in function registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        string::register(&mut catalog);
        math::register(&mut catalog);
        array::register(&mut catalog);
        logic::register(&mut catalog);
        json::register(&mut catalog);
        date::register(&mut catalog);
        catalog
    }

    /// Register a function, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke `name` with evaluated arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| ExpressionError::UnknownFunction { name: name.into() })?;
        f(args).map_err(|detail| ExpressionError::FunctionFailed {
            name: name.into(),
            detail,
        })
    }
}

impl fmt::Debug for FunctionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCatalog")
            .field("functions", &self.names())
            .finish()
    }
}

// Argument helpers shared by the function families.

fn arity(args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        return Err(if min == max {
            format!("expected {min} argument(s), got {}", args.len())
        } else if max == usize::MAX {
            format!("expected at least {min} argument(s), got {}", args.len())
        } else {
            format!("expected {min} to {max} arguments, got {}", args.len())
        });
    }
    Ok(())
}

fn text_arg(args: &[Value], index: usize) -> String {
    args.get(index).map(to_text).unwrap_or_default()
}

fn num_arg(args: &[Value], index: usize) -> Result<f64, String> {
    let value = args.get(index).unwrap_or(&Value::Null);
    as_f64(value).ok_or_else(|| format!("argument {} is not a number: {value}", index + 1))
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, String> {
    let n = num_arg(args, index)?;
    if n.fract() != 0.0 {
        return Err(format!("argument {} must be an integer, got {n}", index + 1));
    }
    Ok(n as i64)
}

fn array_arg(args: &[Value], index: usize) -> Result<&Vec<Value>, String> {
    match args.get(index) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(format!("argument {} is not an array: {other}", index + 1)),
        None => Err(format!("argument {} is missing", index + 1)),
    }
}

fn to_number(value: f64) -> FunctionResult {
    crate::value::number(value).ok_or_else(|| format!("result {value} is not a finite number"))
}

/// Resolve a possibly negative index against a length.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

/// Clamp a possibly negative bound into `0..=len`.
fn clamp_bound(index: i64, len: usize) -> usize {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    idx.clamp(0, len) as usize
}
