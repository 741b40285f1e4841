//! The planner facade.
//!
//! Composes the builder, cycle check, topological sort, stage computation,
//! metadata propagation and resource estimation into one entry point.

use std::sync::Arc;

use tracing::debug;

use mflow_models::{JobSpec, ProcessingPlan};
use mflow_ops::OperatorRegistry;

use crate::builder::GraphBuilder;
use crate::error::{PlanError, PlanResult};
use crate::estimate::estimate_resources;
use crate::graph::Graph;
use crate::propagate::propagate_metadata;

/// Compiles job specs into processing plans.
pub struct Planner {
    registry: Arc<OperatorRegistry>,
}

impl Planner {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    /// Planner over the process-wide catalogue.
    pub fn with_global_registry() -> Self {
        Self::new(mflow_ops::registry::global())
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    /// Every referenced operator name must be registered.
    pub fn validate_operators(&self, spec: &JobSpec) -> PlanResult<()> {
        for (index, op) in spec.operations.iter().enumerate() {
            self.registry
                .require(&op.op)
                .map_err(|e| PlanError::at_node(format!("op_{}_{}", index, op.op), e))?;
        }
        Ok(())
    }

    /// Every operation's parameter bag must pass its descriptor.
    pub fn validate_parameters(&self, spec: &JobSpec) -> PlanResult<()> {
        for (index, op) in spec.operations.iter().enumerate() {
            let node_id = format!("op_{}_{}", index, op.op);
            let operator = self
                .registry
                .require(&op.op)
                .map_err(|e| PlanError::at_node(&node_id, e))?;
            operator
                .validate(&op.params)
                .map_err(|e| PlanError::at_node(&node_id, e))?;
        }
        Ok(())
    }

    /// Build the dependency graph for a spec.
    pub fn build_graph(&self, spec: &JobSpec) -> PlanResult<Graph> {
        GraphBuilder::new(Arc::clone(&self.registry)).build(spec)
    }

    /// Compile a spec into a plan. Metadata-dependent steps (propagation,
    /// estimation) run only when every input node already carries probed
    /// metadata; the command is attached later by the command builder.
    pub fn plan(&self, spec: &JobSpec) -> PlanResult<ProcessingPlan> {
        let mut graph = self.build_graph(spec)?;
        self.plan_graph(&mut graph)
    }

    /// Plan over an existing graph, e.g. after the stager has attached
    /// probed metadata to input nodes.
    pub fn plan_graph(&self, graph: &mut Graph) -> PlanResult<ProcessingPlan> {
        graph.detect_cycles()?;
        let order = graph.topological_sort()?;
        let stages = graph.compute_execution_stages()?;

        let probed = graph
            .input_nodes()
            .iter()
            .all(|node| node.media().is_some());

        let estimate = if probed {
            propagate_metadata(graph, &self.registry)?;
            Some(estimate_resources(graph, &stages, &self.registry)?)
        } else {
            debug!("input metadata absent, skipping propagation and estimation");
            None
        };

        let (nodes, edges) = graph.snapshot();
        Ok(ProcessingPlan {
            nodes,
            edges,
            order,
            stages,
            estimate,
            command: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{FormatInfo, MediaDuration, MediaInfo, VideoStream};
    use serde_json::json;

    fn planner() -> Planner {
        Planner::with_global_registry()
    }

    fn probed() -> MediaInfo {
        MediaInfo {
            format: FormatInfo {
                filename: "in.mp4".to_string(),
                format_name: "mp4".to_string(),
                duration: Some(MediaDuration::from_secs(120)),
                size: Some(1_000_000),
                bit_rate: Some(2_000_000),
                start_time: Some(0.0),
            },
            video_streams: vec![VideoStream {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate: 30.0,
                pixel_format: "yuv420p".to_string(),
                bit_rate: Some(2_000_000),
                duration: Some(MediaDuration::from_secs(120)),
            }],
            audio_streams: Vec::new(),
        }
    }

    fn two_op_spec() -> JobSpec {
        serde_json::from_value(json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [
                {"op": "trim", "input": "video", "output": "trimmed",
                 "params": {"start": "00:00:10", "duration": "00:00:30"}},
                {"op": "scale", "input": "trimmed", "output": "scaled",
                 "params": {"width": 1280, "height": 720}}
            ],
            "outputs": [{"id": "scaled", "destination": "file:///out.mp4"}]
        }))
        .unwrap()
    }

    #[test]
    fn two_op_plan_shape() {
        let plan = planner().plan(&two_op_spec()).unwrap();
        assert_eq!(plan.node_count(), 4);
        assert_eq!(plan.edge_count(), 3);
        assert_eq!(plan.stages.len(), 4);
        assert_eq!(plan.order.len(), 4);
        // No metadata, no estimate.
        assert!(plan.estimate.is_none());
    }

    #[test]
    fn plan_with_metadata_estimates() {
        let p = planner();
        let mut graph = p.build_graph(&two_op_spec()).unwrap();
        graph.node_mut("input_video").unwrap().set_media(probed());
        let plan = p.plan_graph(&mut graph).unwrap();
        let estimate = plan.estimate.unwrap();
        // trim 30s/10 + scale 30s/2.
        assert!((estimate.total_duration_secs - 18.0).abs() < 1e-9);
        assert!((estimate.peak_memory_mb - 200.0).abs() < 1e-9);
    }

    #[test]
    fn validate_operators_rejects_unknown_names() {
        let mut spec = two_op_spec();
        spec.operations[1].op = "sharpen".to_string();
        let err = planner().validate_operators(&spec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "node op_1_sharpen: unknown operator 'sharpen'"
        );
    }

    #[test]
    fn validate_parameters_surfaces_descriptor_failures() {
        let mut spec = two_op_spec();
        spec.operations[1].params = json!({"width": 1280}).as_object().unwrap().clone();
        let err = planner().validate_parameters(&spec).unwrap_err();
        assert_eq!(err.to_string(), "node op_1_scale: parameter height: required");
    }

    #[test]
    fn parallel_fan_out_shares_a_stage() {
        let spec: JobSpec = serde_json::from_value(json!({
            "inputs": [
                {"id": "a", "source": "file:///a.mp4"},
                {"id": "b", "source": "file:///b.mp4"}
            ],
            "operations": [
                {"op": "trim", "input": "a", "output": "a_cut", "params": {"duration": "10s"}},
                {"op": "trim", "input": "b", "output": "b_cut", "params": {"duration": "10s"}}
            ],
            "outputs": [
                {"id": "a_cut", "destination": "file:///a_out.mp4"},
                {"id": "b_cut", "destination": "file:///b_out.mp4"}
            ]
        }))
        .unwrap();

        let plan = planner().plan(&spec).unwrap();
        let second_stage: std::collections::HashSet<&str> =
            plan.stages[1].iter().map(String::as_str).collect();
        assert_eq!(
            second_stage,
            ["op_0_trim", "op_1_trim"].into_iter().collect()
        );
    }
}
