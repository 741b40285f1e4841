//! Graph compilation for Mediaflow jobs.
//!
//! Translates a `JobSpec` into a typed DAG, orders it, layers it into
//! execution stages, propagates probed metadata and estimates resource
//! cost. The output is a `ProcessingPlan` ready for the command builder.

pub mod builder;
pub mod error;
pub mod estimate;
pub mod graph;
pub mod planner;
pub mod propagate;

pub use builder::GraphBuilder;
pub use error::{PlanError, PlanResult};
pub use estimate::estimate_resources;
pub use graph::{Edge, Graph, Node, NodeKind};
pub use planner::Planner;
pub use propagate::propagate_metadata;
