//! Shared data models for the Mediaflow backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job specifications (inputs, operations, outputs)
//! - Job records and lifecycle states
//! - Probed media metadata
//! - Compiled processing plans and resource estimates
//! - Duration and resolution surface forms

pub mod duration;
pub mod job;
pub mod media;
pub mod plan;
pub mod resolution;
pub mod spec;

// Re-export common types
pub use duration::{DurationParseError, MediaDuration, MAX_DURATION_SECS};
pub use job::{error_code, ErrorInfo, Job, JobId, JobStatus, OutputArtifact};
pub use media::{AudioStream, FormatInfo, MediaInfo, VideoStream};
pub use plan::{NodeEstimate, PlanEdge, PlanNode, ProcessingPlan, ResourceEstimate, StreamType};
pub use resolution::{Resolution, ResolutionParseError};
pub use spec::{InputSpec, JobSpec, OperationSpec, OutputSpec, SpecError};
