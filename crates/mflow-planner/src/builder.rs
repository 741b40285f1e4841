//! Spec-to-graph translation.
//!
//! Walks the spec in order, creating one node per input, operation and
//! output, resolving symbolic references through a name table. Operator
//! parameter validation is deliberately left to the planner so that graph
//! shape and operator semantics fail independently.

use std::collections::HashMap;
use std::sync::Arc;

use mflow_models::{JobSpec, SpecError, StreamType};
use mflow_ops::{OpCategory, OperatorRegistry};

use crate::error::PlanResult;
use crate::graph::{Graph, Node, NodeKind};

/// Builds a [`Graph`] from a [`JobSpec`].
pub struct GraphBuilder {
    registry: Arc<OperatorRegistry>,
}

impl GraphBuilder {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    /// Translate the spec into a graph and verify acyclicity.
    pub fn build(&self, spec: &JobSpec) -> PlanResult<Graph> {
        spec.validate()?;

        let mut graph = Graph::new();
        let mut names: HashMap<&str, String> = HashMap::new();

        for input in &spec.inputs {
            let node_id = format!("input_{}", input.id);
            graph.add_node(Node {
                id: node_id.clone(),
                kind: NodeKind::Input {
                    spec_id: input.id.clone(),
                    source: input.source.clone(),
                    staged: None,
                    media: None,
                },
            })?;
            names.insert(input.id.as_str(), node_id);
        }

        for (index, op) in spec.operations.iter().enumerate() {
            let node_id = format!("op_{}_{}", index, op.op);
            graph.add_node(Node {
                id: node_id.clone(),
                kind: NodeKind::Operation {
                    op: op.op.clone(),
                    params: op.params.clone(),
                    media: None,
                },
            })?;

            let stream_type = self.stream_type_for(&op.op);
            for reference in op.input_refs() {
                let producer = names
                    .get(reference)
                    .ok_or_else(|| SpecError::UnknownReference(reference.to_string()))?;
                graph.add_edge(producer.clone(), node_id.clone(), stream_type)?;
            }

            names.insert(op.output.as_str(), node_id);
        }

        for output in &spec.outputs {
            let node_id = format!("output_{}", output.id);
            graph.add_node(Node {
                id: node_id.clone(),
                kind: NodeKind::Output {
                    spec_id: output.id.clone(),
                    destination: output.destination.clone(),
                    staged: None,
                    media: None,
                },
            })?;

            let producer = names
                .get(output.id.as_str())
                .ok_or_else(|| SpecError::UnknownReference(output.id.clone()))?;
            graph.add_edge(producer.clone(), node_id, StreamType::Both)?;
        }

        graph.detect_cycles()?;
        Ok(graph)
    }

    /// Edge stream type from the operator's category. Unregistered names
    /// default to `Both`; the planner's operator validation rejects them
    /// later with a better message.
    fn stream_type_for(&self, op_name: &str) -> StreamType {
        match self.registry.get(op_name).map(|op| op.category()) {
            Some(OpCategory::Audio) => StreamType::Audio,
            Some(OpCategory::Video) | Some(OpCategory::Graphics) => StreamType::Video,
            _ => StreamType::Both,
        }
    }
}
