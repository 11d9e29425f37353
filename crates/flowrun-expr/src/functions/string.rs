use serde_json::Value;

use super::{FunctionCatalog, arity, int_arg, text_arg};
use crate::value::{is_empty, loose_eq, to_text};

pub(super) fn register(catalog: &mut FunctionCatalog) {
    catalog.register("concat", |args: &[Value]| {
        Ok(Value::String(args.iter().map(to_text).collect()))
    });
    catalog.register("upper", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(Value::String(text_arg(args, 0).to_uppercase()))
    });
    catalog.register("lower", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(Value::String(text_arg(args, 0).to_lowercase()))
    });
    catalog.register("trim", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(Value::String(text_arg(args, 0).trim().to_string()))
    });
    catalog.register("length", |args: &[Value]| {
        arity(args, 1, 1)?;
        let len = match &args[0] {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            Value::Null => 0,
            other => to_text(other).chars().count(),
        };
        Ok(Value::from(len))
    });
    catalog.register("substring", substring);
    catalog.register("replace", |args: &[Value]| {
        arity(args, 3, 3)?;
        let from = text_arg(args, 1);
        if from.is_empty() {
            return Err("pattern to replace must not be empty".into());
        }
        Ok(Value::String(
            text_arg(args, 0).replace(&from, &text_arg(args, 2)),
        ))
    });
    catalog.register("split", |args: &[Value]| {
        arity(args, 2, 2)?;
        let text = text_arg(args, 0);
        let sep = text_arg(args, 1);
        let parts: Vec<Value> = if sep.is_empty() {
            text.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            text.split(sep.as_str())
                .map(|p| Value::String(p.to_string()))
                .collect()
        };
        Ok(Value::Array(parts))
    });
    catalog.register("join", |args: &[Value]| {
        arity(args, 1, 2)?;
        let items = super::array_arg(args, 0)?;
        let sep = if args.len() > 1 {
            text_arg(args, 1)
        } else {
            ",".to_string()
        };
        Ok(Value::String(
            items.iter().map(to_text).collect::<Vec<_>>().join(&sep),
        ))
    });
    catalog.register("contains", |args: &[Value]| {
        arity(args, 2, 2)?;
        let found = match &args[0] {
            Value::Array(items) => items.iter().any(|v| loose_eq(v, &args[1])),
            Value::Object(map) => map.contains_key(&text_arg(args, 1)),
            other => to_text(other).contains(&text_arg(args, 1)),
        };
        Ok(Value::Bool(found))
    });
    catalog.register("starts_with", |args: &[Value]| {
        arity(args, 2, 2)?;
        Ok(Value::Bool(text_arg(args, 0).starts_with(&text_arg(args, 1))))
    });
    catalog.register("ends_with", |args: &[Value]| {
        arity(args, 2, 2)?;
        Ok(Value::Bool(text_arg(args, 0).ends_with(&text_arg(args, 1))))
    });
    catalog.register("to_string", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(Value::String(text_arg(args, 0)))
    });
    catalog.register("default", |args: &[Value]| {
        arity(args, 2, 2)?;
        if is_empty(&args[0]) {
            Ok(args[1].clone())
        } else {
            Ok(args[0].clone())
        }
    });
}

/// `substring(text, start, len?)`, counted in characters. A negative start
/// counts from the end.
fn substring(args: &[Value]) -> super::FunctionResult {
    arity(args, 2, 3)?;
    let chars: Vec<char> = text_arg(args, 0).chars().collect();
    let start = super::clamp_bound(int_arg(args, 1)?, chars.len());
    let end = if args.len() == 3 {
        let len = int_arg(args, 2)?;
        if len < 0 {
            return Err("length must not be negative".into());
        }
        start.saturating_add(len as usize).min(chars.len())
    } else {
        chars.len()
    };
    Ok(Value::String(chars[start..end].iter().collect()))
}
