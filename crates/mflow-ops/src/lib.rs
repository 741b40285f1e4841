//! Operator catalogue for the Mediaflow planner.
//!
//! This crate provides:
//! - Parameter typing, coercion and descriptor-driven validation
//! - The `Operator` capability set (validate, metadata, estimate, compile)
//! - The process-wide registry of built-in operators

pub mod error;
pub mod operator;
pub mod operators;
pub mod params;
pub mod registry;

pub use error::{OpError, OpResult};
pub use operator::{
    CompileContext, FilterFragment, OpCategory, Operator, OperatorDescriptor, ResourceCost,
    StreamKind, StreamLabel,
};
pub use operators::register_builtins;
pub use params::{
    convert, validate_params, CustomRule, ParamSpec, ParamType, ParamValue, Params,
    ValidationRules,
};
pub use registry::{global, OperatorRegistry};
