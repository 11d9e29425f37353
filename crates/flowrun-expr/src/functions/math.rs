use serde_json::Value;

use super::{FunctionCatalog, FunctionResult, arity, int_arg, num_arg, text_arg, to_number};
use crate::value::as_f64;

pub(super) fn register(catalog: &mut FunctionCatalog) {
    catalog.register("to_number", |args: &[Value]| {
        arity(args, 1, 1)?;
        to_number(num_arg(args, 0)?)
    });
    catalog.register("add", |args: &[Value]| {
        arity(args, 1, usize::MAX)?;
        to_number(numbers(args)?.iter().sum())
    });
    catalog.register("subtract", |args: &[Value]| {
        arity(args, 2, 2)?;
        to_number(num_arg(args, 0)? - num_arg(args, 1)?)
    });
    catalog.register("multiply", |args: &[Value]| {
        arity(args, 1, usize::MAX)?;
        to_number(numbers(args)?.iter().product())
    });
    catalog.register("divide", |args: &[Value]| {
        arity(args, 2, 2)?;
        let divisor = num_arg(args, 1)?;
        if divisor == 0.0 {
            return Err("division by zero".into());
        }
        to_number(num_arg(args, 0)? / divisor)
    });
    catalog.register("mod", |args: &[Value]| {
        arity(args, 2, 2)?;
        let divisor = num_arg(args, 1)?;
        if divisor == 0.0 {
            return Err("modulo by zero".into());
        }
        to_number(num_arg(args, 0)? % divisor)
    });
    catalog.register("abs", |args: &[Value]| {
        arity(args, 1, 1)?;
        to_number(num_arg(args, 0)?.abs())
    });
    catalog.register("round", |args: &[Value]| {
        arity(args, 1, 2)?;
        let digits = if args.len() == 2 { int_arg(args, 1)? } else { 0 };
        if !(0..=15).contains(&digits) {
            return Err(format!("digits must be between 0 and 15, got {digits}"));
        }
        let factor = 10f64.powi(digits as i32);
        to_number((num_arg(args, 0)? * factor).round() / factor)
    });
    catalog.register("floor", |args: &[Value]| {
        arity(args, 1, 1)?;
        to_number(num_arg(args, 0)?.floor())
    });
    catalog.register("ceil", |args: &[Value]| {
        arity(args, 1, 1)?;
        to_number(num_arg(args, 0)?.ceil())
    });
    catalog.register("min", |args: &[Value]| extreme(args, f64::min));
    catalog.register("max", |args: &[Value]| extreme(args, f64::max));
    catalog.register("calc", |args: &[Value]| {
        arity(args, 1, 1)?;
        let expr = text_arg(args, 0);
        let result = meval::eval_str(&expr).map_err(|e| format!("cannot evaluate '{expr}': {e}"))?;
        to_number(result)
    });
}

/// Numeric view of every argument; a single array argument is expanded.
fn numbers(args: &[Value]) -> Result<Vec<f64>, String> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };
    items
        .iter()
        .map(|v| as_f64(v).ok_or_else(|| format!("not a number: {v}")))
        .collect()
}

fn extreme(args: &[Value], pick: fn(f64, f64) -> f64) -> FunctionResult {
    arity(args, 1, usize::MAX)?;
    let values = numbers(args)?;
    let first = values.first().copied().ok_or("no values to compare")?;
    to_number(values.into_iter().fold(first, pick))
}

#[cfg(test)]
mod tests {
    use crate::functions::FunctionCatalog;
    use serde_json::{Value, json};

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        FunctionCatalog::with_builtins()
            .call(name, args)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn arithmetic() {
        assert_eq!(call("add", &[json!(1), json!("2"), json!(3.5)]).unwrap(), json!(6.5));
        assert_eq!(call("add", &[json!([1, 2, 3])]).unwrap(), json!(6));
        assert_eq!(call("subtract", &[json!(10), json!(4)]).unwrap(), json!(6));
        assert_eq!(call("multiply", &[json!(2), json!(3), json!(4)]).unwrap(), json!(24));
        assert_eq!(call("divide", &[json!(7), json!(2)]).unwrap(), json!(3.5));
        assert_eq!(call("mod", &[json!(7), json!(3)]).unwrap(), json!(1));
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(call("divide", &[json!(1), json!(0)]).is_err());
        assert!(call("mod", &[json!(1), json!(0)]).is_err());
    }

    #[test]
    fn rounding() {
        assert_eq!(call("round", &[json!(2.346), json!(2)]).unwrap(), json!(2.35));
        assert_eq!(call("round", &[json!(2.5)]).unwrap(), json!(3));
        assert_eq!(call("floor", &[json!(-1.5)]).unwrap(), json!(-2));
        assert_eq!(call("ceil", &[json!(1.1)]).unwrap(), json!(2));
        assert_eq!(call("abs", &[json!(-4)]).unwrap(), json!(4));
    }

    #[test]
    fn min_max() {
        assert_eq!(call("min", &[json!(3), json!(1), json!(2)]).unwrap(), json!(1));
        assert_eq!(call("max", &[json!([3, 9, 2])]).unwrap(), json!(9));
        assert!(call("max", &[json!([])]).is_err());
    }

    #[test]
    fn to_number_parses_strings() {
        assert_eq!(call("to_number", &[json!(" 42 ")]).unwrap(), json!(42));
        assert!(call("to_number", &[json!("abc")]).is_err());
    }

    #[test]
    fn calc_evaluates_expressions() {
        assert_eq!(call("calc", &[json!("2 + 3 * 4")]).unwrap(), json!(14));
        assert_eq!(call("calc", &[json!("(1 + 1) / 4")]).unwrap(), json!(0.5));
        assert!(call("calc", &[json!("2 +")]).is_err());
    }
}
