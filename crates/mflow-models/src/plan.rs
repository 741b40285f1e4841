//! The compiled processing plan.
//!
//! A `ProcessingPlan` is a serializable snapshot of the compiled graph:
//! nodes, edges, the linear topological order, the stage layering, optional
//! resource estimates, and the emitted external command.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stream type carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Video,
    Audio,
    #[default]
    Both,
}

/// A node in the serialized plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanNode {
    Input {
        id: String,
        spec_id: String,
        source: String,
    },
    Operation {
        id: String,
        op: String,
        #[serde(default)]
        params: serde_json::Map<String, serde_json::Value>,
    },
    Output {
        id: String,
        spec_id: String,
        destination: String,
    },
}

impl PlanNode {
    pub fn id(&self) -> &str {
        match self {
            PlanNode::Input { id, .. }
            | PlanNode::Operation { id, .. }
            | PlanNode::Output { id, .. } => id,
        }
    }
}

/// A directed edge in the serialized plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub stream_type: StreamType,
}

/// Estimated resource cost for one node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodeEstimate {
    pub duration_secs: f64,
    pub memory_mb: f64,
    pub disk_mb: f64,
}

/// Aggregated resource estimate for the whole plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResourceEstimate {
    /// Sum of per-stage maxima
    pub total_duration_secs: f64,
    /// Maximum of per-stage memory sums
    pub peak_memory_mb: f64,
    /// Sum over all nodes
    pub total_disk_mb: f64,
    #[serde(default)]
    pub per_node: HashMap<String, NodeEstimate>,
}

/// The compiled, validated, ordered representation of a job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingPlan {
    pub nodes: Vec<PlanNode>,
    pub edges: Vec<PlanEdge>,

    /// Linear topological order of node ids
    pub order: Vec<String>,

    /// Stage layering: each stage is a set of mutually-independent node ids
    pub stages: Vec<Vec<String>>,

    /// Present once metadata propagation has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<ResourceEstimate>,

    /// The emitted external-tool argv, once the command builder has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl ProcessingPlan {
    pub fn node(&self, id: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The stage index a node is scheduled in.
    pub fn stage_of(&self, id: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.iter().any(|n| n == id))
    }
}
