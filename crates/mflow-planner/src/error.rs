//! Planner error types.

use thiserror::Error;

use mflow_models::SpecError;
use mflow_ops::OpError;

/// Result type for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while compiling a spec into a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("cycle detected: {from} -> {to}")]
    Cycle { from: String, to: String },

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("unknown node id '{0}'")]
    UnknownNode(String),

    #[error("input node '{0}' missing media info")]
    MissingMediaInfo(String),

    #[error("output node '{0}' must have exactly one predecessor")]
    OutputArity(String),

    #[error("resource estimation requires metadata: run propagation first")]
    EstimateBeforePropagation,

    /// Operator failure wrapped with the node it occurred at.
    #[error("node {node}: {source}")]
    Node { node: String, source: OpError },

    #[error(transparent)]
    Op(#[from] OpError),
}

impl PlanError {
    /// Attach node context to an operator error.
    pub fn at_node(node: impl Into<String>, source: OpError) -> Self {
        Self::Node {
            node: node.into(),
            source,
        }
    }
}
