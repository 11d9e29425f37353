use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::Result;
use flowrun_graph::constants::END_NODE_TYPE;
use flowrun_graph::runner::{NodeRunner, Step};
use flowrun_graph::vertex::VertexResult;

/// Terminal node: collects values from the context into its result.
///
/// Every param widget becomes a result key, evaluated with the run's
/// missing-field policy. Fields of the `output` schema are resolved after the
/// params, each with its own `required` flag. Never activates successors.
pub struct EndRunner;

#[async_trait]
impl NodeRunner for EndRunner {
    fn node_type(&self) -> &str {
        END_NODE_TYPE
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        for (key, widget) in &step.node.params {
            vertex.set(key.clone(), step.evaluator.evaluate(widget, ctx)?);
        }
        if let Some(schema) = &step.node.output {
            vertex.extend(schema.resolve(step.evaluator, ctx)?);
        }
        Ok(())
    }
}
