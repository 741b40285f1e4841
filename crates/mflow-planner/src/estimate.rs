//! Resource estimation over execution stages.
//!
//! Nodes within a stage are assumed to run concurrently: the stage's
//! apparent duration is the maximum member duration and its memory is the
//! sum. Across stages, durations add and memory peaks.

use std::collections::HashMap;
use std::sync::Arc;

use mflow_models::{NodeEstimate, ResourceEstimate};
use mflow_ops::OperatorRegistry;

use crate::error::{PlanError, PlanResult};
use crate::graph::{Graph, NodeKind};
use crate::propagate::predecessor_media;

/// Estimate resource usage per node and aggregate per stage.
pub fn estimate_resources(
    graph: &Graph,
    stages: &[Vec<String>],
    registry: &Arc<OperatorRegistry>,
) -> PlanResult<ResourceEstimate> {
    let mut per_node: HashMap<String, NodeEstimate> = HashMap::new();
    let mut total_duration_secs = 0.0f64;
    let mut peak_memory_mb = 0.0f64;
    let mut total_disk_mb = 0.0f64;

    for stage in stages {
        let mut stage_duration = 0.0f64;
        let mut stage_memory = 0.0f64;

        for id in stage {
            let node = graph
                .node(id)
                .ok_or_else(|| PlanError::UnknownNode(id.clone()))?;
            let NodeKind::Operation { op, params, .. } = &node.kind else {
                continue;
            };

            let inputs = predecessor_media(graph, id)
                .map_err(|_| PlanError::EstimateBeforePropagation)?;
            let operator = registry
                .require(op)
                .map_err(|e| PlanError::at_node(id, e))?;
            let coerced = operator
                .validate(params)
                .map_err(|e| PlanError::at_node(id, e))?;
            let cost = operator
                .estimate(&inputs, &coerced)
                .map_err(|e| PlanError::at_node(id, e))?;

            let estimate = NodeEstimate {
                duration_secs: cost.cpu_seconds,
                memory_mb: cost.memory_mb,
                disk_mb: cost.disk_mb,
            };
            stage_duration = stage_duration.max(estimate.duration_secs);
            stage_memory += estimate.memory_mb;
            total_disk_mb += estimate.disk_mb;
            per_node.insert(id.clone(), estimate);
        }

        total_duration_secs += stage_duration;
        peak_memory_mb = peak_memory_mb.max(stage_memory);
    }

    Ok(ResourceEstimate {
        total_duration_secs,
        peak_memory_mb,
        total_disk_mb,
        per_node,
    })
}
