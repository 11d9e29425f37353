use serde_json::Value;

use super::{FunctionCatalog, arity, text_arg};
use crate::value::truthy;

pub(super) fn register(catalog: &mut FunctionCatalog) {
    catalog.register("json_parse", |args: &[Value]| {
        arity(args, 1, 1)?;
        match &args[0] {
            Value::String(s) => serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}")),
            // Already structured.
            other => Ok(other.clone()),
        }
    });
    catalog.register("json_stringify", |args: &[Value]| {
        arity(args, 1, 2)?;
        let pretty = args.get(1).is_some_and(truthy);
        let text = if pretty {
            serde_json::to_string_pretty(&args[0])
        } else {
            serde_json::to_string(&args[0])
        }
        .map_err(|e| e.to_string())?;
        Ok(Value::String(text))
    });
    catalog.register("get", |args: &[Value]| {
        arity(args, 2, 3)?;
        let path = text_arg(args, 1);
        let found = path
            .split('.')
            .filter(|s| !s.is_empty())
            .try_fold(&args[0], |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            });
        Ok(found
            .cloned()
            .or_else(|| args.get(2).cloned())
            .unwrap_or(Value::Null))
    });
}
