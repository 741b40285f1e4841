//! Metadata propagation.
//!
//! Walks nodes in topological order. Input nodes must already carry probed
//! metadata; operation nodes receive cloned predecessor metadata and store
//! their operator's computed output; output nodes inherit a deep clone from
//! their single producer.

use std::sync::Arc;

use mflow_models::MediaInfo;
use mflow_ops::OperatorRegistry;

use crate::error::{PlanError, PlanResult};
use crate::graph::{Graph, NodeKind};

/// Propagate metadata through the graph, storing computed `MediaInfo` on
/// every node.
pub fn propagate_metadata(graph: &mut Graph, registry: &Arc<OperatorRegistry>) -> PlanResult<()> {
    let order = graph.topological_sort()?;

    for id in order {
        let node = graph
            .node(&id)
            .ok_or_else(|| PlanError::UnknownNode(id.clone()))?;

        match &node.kind {
            NodeKind::Input { media, .. } => {
                if media.is_none() {
                    return Err(PlanError::MissingMediaInfo(id));
                }
            }
            NodeKind::Operation { op, params, .. } => {
                let inputs = predecessor_media(graph, &id)?;
                let operator = registry
                    .require(op)
                    .map_err(|e| PlanError::at_node(&id, e))?;
                let coerced = operator
                    .validate(params)
                    .map_err(|e| PlanError::at_node(&id, e))?;
                let computed = operator
                    .output_metadata(&inputs, &coerced)
                    .map_err(|e| PlanError::at_node(&id, e))?;
                if let Some(node) = graph.node_mut(&id) {
                    node.set_media(computed);
                }
            }
            NodeKind::Output { .. } => {
                let predecessors = graph.predecessors(&id);
                if predecessors.len() != 1 {
                    return Err(PlanError::OutputArity(id));
                }
                let inherited = graph
                    .node(predecessors[0])
                    .and_then(|p| p.media())
                    .cloned()
                    .ok_or_else(|| PlanError::MissingMediaInfo(predecessors[0].to_string()))?;
                if let Some(node) = graph.node_mut(&id) {
                    node.set_media(inherited);
                }
            }
        }
    }
    Ok(())
}

/// Cloned metadata of every predecessor, in edge order.
pub(crate) fn predecessor_media(graph: &Graph, id: &str) -> PlanResult<Vec<MediaInfo>> {
    graph
        .predecessors(id)
        .iter()
        .map(|pred| {
            graph
                .node(pred)
                .and_then(|n| n.media())
                .cloned()
                .ok_or_else(|| PlanError::MissingMediaInfo(pred.to_string()))
        })
        .collect()
}
