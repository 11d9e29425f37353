use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::Result;
use flowrun_graph::constants::{DEFAULT_HANDLE, START_NODE_TYPE};
use flowrun_graph::runner::{NodeRunner, Step};
use flowrun_graph::vertex::VertexResult;
use serde_json::{Map, Value};

/// Entry node: exposes the trigger payload to downstream nodes.
///
/// The result is the trigger payload merged over the values declared by the
/// node's `output` schema, plus `trigger_kind`. Successors are taken from the
/// handle named after the trigger kind (`message`, `schedule`, `argument`),
/// falling back to the default handle.
pub struct StartRunner;

#[async_trait]
impl NodeRunner for StartRunner {
    fn node_type(&self) -> &str {
        START_NODE_TYPE
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let mut result = match &step.node.output {
            Some(schema) => schema.resolve(step.evaluator, ctx)?,
            None => Map::new(),
        };
        let trigger = &ctx.metadata.trigger;
        for (key, value) in &trigger.payload {
            result.insert(key.clone(), value.clone());
        }
        let kind = trigger.kind.as_str();
        result.insert("trigger_kind".into(), Value::String(kind.to_string()));
        vertex.extend(result);

        let mut children = step.successors(kind);
        if children.is_empty() {
            children = step.successors(DEFAULT_HANDLE);
        }
        vertex.activate(children);
        Ok(())
    }
}
