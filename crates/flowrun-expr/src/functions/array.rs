use serde_json::Value;

use super::{FunctionCatalog, arity, array_arg, clamp_bound, int_arg, normalize_index};
use crate::value::{compare, loose_eq, to_text};

pub(super) fn register(catalog: &mut FunctionCatalog) {
    catalog.register("first", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(array_arg(args, 0)?.first().cloned().unwrap_or(Value::Null))
    });
    catalog.register("last", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(array_arg(args, 0)?.last().cloned().unwrap_or(Value::Null))
    });
    catalog.register("at", |args: &[Value]| {
        arity(args, 2, 2)?;
        let items = array_arg(args, 0)?;
        Ok(normalize_index(int_arg(args, 1)?, items.len())
            .map(|i| items[i].clone())
            .unwrap_or(Value::Null))
    });
    catalog.register("slice", |args: &[Value]| {
        arity(args, 2, 3)?;
        let items = array_arg(args, 0)?;
        let start = clamp_bound(int_arg(args, 1)?, items.len());
        let end = if args.len() == 3 {
            clamp_bound(int_arg(args, 2)?, items.len())
        } else {
            items.len()
        };
        Ok(Value::Array(if start < end {
            items[start..end].to_vec()
        } else {
            Vec::new()
        }))
    });
    catalog.register("reverse", |args: &[Value]| {
        arity(args, 1, 1)?;
        match &args[0] {
            Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
            Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
            other => Err(format!("cannot reverse {other}")),
        }
    });
    catalog.register("unique", |args: &[Value]| {
        arity(args, 1, 1)?;
        let mut out: Vec<Value> = Vec::new();
        for item in array_arg(args, 0)? {
            if !out.iter().any(|seen| loose_eq(seen, item)) {
                out.push(item.clone());
            }
        }
        Ok(Value::Array(out))
    });
    catalog.register("sort", |args: &[Value]| {
        arity(args, 1, 1)?;
        let mut items = array_arg(args, 0)?.clone();
        items.sort_by(|a, b| {
            compare(a, b).unwrap_or_else(|| to_text(a).cmp(&to_text(b)))
        });
        Ok(Value::Array(items))
    });
    catalog.register("flatten", |args: &[Value]| {
        arity(args, 1, 1)?;
        let mut out = Vec::new();
        for item in array_arg(args, 0)? {
            match item {
                Value::Array(inner) => out.extend(inner.iter().cloned()),
                other => out.push(other.clone()),
            }
        }
        Ok(Value::Array(out))
    });
    catalog.register("array", |args: &[Value]| Ok(Value::Array(args.to_vec())));
}

#[cfg(test)]
mod tests {
    use crate::functions::FunctionCatalog;
    use serde_json::{Value, json};

    fn call(name: &str, args: &[Value]) -> Value {
        FunctionCatalog::with_builtins().call(name, args).unwrap()
    }

    #[test]
    fn element_access() {
        assert_eq!(call("first", &[json!([1, 2])]), json!(1));
        assert_eq!(call("last", &[json!([1, 2])]), json!(2));
        assert_eq!(call("first", &[json!([])]), json!(null));
        assert_eq!(call("at", &[json!(["a", "b", "c"]), json!(-1)]), json!("c"));
        assert_eq!(call("at", &[json!(["a"]), json!(4)]), json!(null));
    }

    #[test]
    fn slicing() {
        assert_eq!(call("slice", &[json!([1, 2, 3, 4]), json!(1), json!(3)]), json!([2, 3]));
        assert_eq!(call("slice", &[json!([1, 2, 3, 4]), json!(-2)]), json!([3, 4]));
        assert_eq!(call("slice", &[json!([1, 2]), json!(2), json!(1)]), json!([]));
    }

    #[test]
    fn reorderings() {
        assert_eq!(call("reverse", &[json!([1, 2, 3])]), json!([3, 2, 1]));
        assert_eq!(call("reverse", &[json!("abc")]), json!("cba"));
        assert_eq!(call("sort", &[json!([3, 1, 2])]), json!([1, 2, 3]));
        assert_eq!(call("sort", &[json!(["b", "a"])]), json!(["a", "b"]));
    }

    #[test]
    fn unique_flatten_array() {
        assert_eq!(call("unique", &[json!([1, 1.0, 2, "2"])]), json!([1, 2, "2"]));
        assert_eq!(call("flatten", &[json!([[1, 2], 3, [[4]]])]), json!([1, 2, 3, [4]]));
        assert_eq!(call("array", &[json!(1), json!("a")]), json!([1, "a"]));
    }

    #[test]
    fn non_arrays_are_rejected() {
        assert!(
            FunctionCatalog::with_builtins()
                .call("first", &[json!("abc")])
                .is_err()
        );
    }
}
