use async_trait::async_trait;
use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::tool::{Tool, ToolDefinition};
use serde_json::{Number, Value, json};

/// Evaluates arithmetic expressions with `meval`.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculator".into(),
            description: "Evaluates mathematical expressions. Supports +, -, *, /, ^, parentheses and common math functions.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "The expression to evaluate, e.g. '2 * (3 + 4)'"
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let expr = input
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| ExternalCallError::rejected("calculator", "missing 'expression' field"))?;

        let result = meval::eval_str(expr).map_err(|e| {
            ExternalCallError::rejected("calculator", format!("failed to evaluate '{expr}': {e}"))
        })?;

        if result.fract() == 0.0 && result.abs() < 1e15 {
            return Ok(json!(result as i64));
        }
        Number::from_f64(result)
            .map(Value::Number)
            .ok_or_else(|| ExternalCallError::rejected("calculator", format!("'{expr}' is not finite")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_requires_expression() {
        let def = CalculatorTool.definition();
        assert_eq!(def.name, "calculator");
        assert!(
            def.parameters["required"]
                .as_array()
                .unwrap()
                .contains(&json!("expression"))
        );
    }

    #[tokio::test]
    async fn whole_results_are_integers() {
        let result = CalculatorTool
            .call(json!({"expression": "2 * (3 + 4)"}))
            .await
            .unwrap();
        assert_eq!(result, json!(14));
        let result = CalculatorTool
            .call(json!({"expression": "1.5 + 2.5"}))
            .await
            .unwrap();
        assert_eq!(result, json!(4));
    }

    #[tokio::test]
    async fn fractional_results_stay_floats() {
        let result = CalculatorTool
            .call(json!({"expression": "1 / 4"}))
            .await
            .unwrap();
        assert_eq!(result, json!(0.25));
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        assert!(CalculatorTool.call(json!({"expression": "abc"})).await.is_err());
        assert!(CalculatorTool.call(json!({})).await.is_err());
        assert!(CalculatorTool.call(json!({"expression": "1 / 0"})).await.is_err());
    }
}
