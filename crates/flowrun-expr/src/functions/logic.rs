use std::cmp::Ordering;

use serde_json::Value;

use super::{FunctionCatalog, FunctionResult, arity};
use crate::value::{compare, is_empty, loose_eq, truthy};

pub(super) fn register(catalog: &mut FunctionCatalog) {
    catalog.register("eq", |args: &[Value]| {
        arity(args, 2, 2)?;
        Ok(Value::Bool(loose_eq(&args[0], &args[1])))
    });
    catalog.register("ne", |args: &[Value]| {
        arity(args, 2, 2)?;
        Ok(Value::Bool(!loose_eq(&args[0], &args[1])))
    });
    catalog.register("gt", |args: &[Value]| ordered(args, |o| o == Ordering::Greater));
    catalog.register("gte", |args: &[Value]| ordered(args, |o| o != Ordering::Less));
    catalog.register("lt", |args: &[Value]| ordered(args, |o| o == Ordering::Less));
    catalog.register("lte", |args: &[Value]| ordered(args, |o| o != Ordering::Greater));
    catalog.register("and", |args: &[Value]| {
        arity(args, 1, usize::MAX)?;
        Ok(Value::Bool(args.iter().all(truthy)))
    });
    catalog.register("or", |args: &[Value]| {
        arity(args, 1, usize::MAX)?;
        Ok(Value::Bool(args.iter().any(truthy)))
    });
    catalog.register("not", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(Value::Bool(!truthy(&args[0])))
    });
    catalog.register("is_empty", |args: &[Value]| {
        arity(args, 1, 1)?;
        Ok(Value::Bool(is_empty(&args[0])))
    });
    catalog.register("if", |args: &[Value]| {
        arity(args, 2, 3)?;
        if truthy(&args[0]) {
            Ok(args[1].clone())
        } else {
            Ok(args.get(2).cloned().unwrap_or(Value::Null))
        }
    });
}

fn ordered(args: &[Value], accept: fn(Ordering) -> bool) -> FunctionResult {
    arity(args, 2, 2)?;
    let ordering = compare(&args[0], &args[1])
        .ok_or_else(|| format!("cannot compare {} with {}", args[0], args[1]))?;
    Ok(Value::Bool(accept(ordering)))
}

#[cfg(test)]
mod tests {
    use crate::functions::FunctionCatalog;
    use serde_json::{Value, json};

    fn call(name: &str, args: &[Value]) -> Value {
        FunctionCatalog::with_builtins().call(name, args).unwrap()
    }

    #[test]
    fn equality() {
        assert_eq!(call("eq", &[json!(1), json!(1.0)]), json!(true));
        assert_eq!(call("eq", &[json!("a"), json!("b")]), json!(false));
        assert_eq!(call("ne", &[json!(null), json!(0)]), json!(true));
    }

    #[test]
    fn ordering() {
        assert_eq!(call("gt", &[json!(3), json!(2)]), json!(true));
        assert_eq!(call("gte", &[json!(2), json!("2")]), json!(true));
        assert_eq!(call("lt", &[json!("apple"), json!("banana")]), json!(true));
        assert_eq!(call("lte", &[json!(5), json!(4)]), json!(false));
        assert!(
            FunctionCatalog::with_builtins()
                .call("gt", &[json!([1]), json!(1)])
                .is_err()
        );
    }

    #[test]
    fn boolean_combinators() {
        assert_eq!(call("and", &[json!(true), json!("yes"), json!(1)]), json!(true));
        assert_eq!(call("and", &[json!(true), json!("0")]), json!(false));
        assert_eq!(call("or", &[json!(false), json!([1])]), json!(true));
        assert_eq!(call("not", &[json!("")]), json!(true));
        assert_eq!(call("is_empty", &[json!({})]), json!(true));
    }

    #[test]
    fn conditional() {
        assert_eq!(call("if", &[json!(1), json!("a"), json!("b")]), json!("a"));
        assert_eq!(call("if", &[json!(0), json!("a"), json!("b")]), json!("b"));
        assert_eq!(call("if", &[json!(false), json!("a")]), json!(null));
    }
}
