//! The declarative job specification submitted by users.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One named media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InputSpec {
    /// Symbolic id, unique within the spec
    pub id: String,
    /// Source URI (file, http(s), s3, ...)
    pub source: String,
    /// Optional type hint ("video", "audio", "image")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// One parameterised operation.
///
/// References name either a single `input` or a list of `inputs`; exactly
/// one of the two forms is used on the wire, and `input_refs` normalizes
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationSpec {
    /// Operator name (must be registered in the catalogue)
    pub op: String,

    /// Single symbolic input reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Multiple symbolic input references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    /// Symbolic output id, unique across the spec
    pub output: String,

    /// Untyped parameter bag, coerced against the operator descriptor
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl OperationSpec {
    /// All symbolic input references, in declaration order.
    pub fn input_refs(&self) -> Vec<&str> {
        match &self.input {
            Some(single) => vec![single.as_str()],
            None => self.inputs.iter().map(String::as_str).collect(),
        }
    }
}

/// One final output destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputSpec {
    /// Symbolic id of an already-produced name
    pub id: String,
    /// Destination URI
    pub destination: String,
}

/// The declarative description of a media-processing job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSpec {
    /// Optional client-supplied identifier; the server assigns one otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub inputs: Vec<InputSpec>,

    #[serde(default)]
    pub operations: Vec<OperationSpec>,

    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

impl JobSpec {
    /// Structural validation: unique names, resolvable references, no
    /// forward references. Operator-level validation happens in the
    /// planner.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.inputs.is_empty() {
            return Err(SpecError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(SpecError::NoOutputs);
        }

        let mut produced: HashSet<&str> = HashSet::new();
        for input in &self.inputs {
            if input.id.trim().is_empty() {
                return Err(SpecError::EmptyName("input".to_string()));
            }
            if !produced.insert(input.id.as_str()) {
                return Err(SpecError::DuplicateName(input.id.clone()));
            }
        }

        for op in &self.operations {
            let refs = op.input_refs();
            if refs.is_empty() {
                return Err(SpecError::NoOperationInputs(op.op.clone()));
            }
            for reference in refs {
                // Only names produced so far are visible; later outputs are
                // forward references and rejected.
                if !produced.contains(reference) {
                    return Err(SpecError::UnknownReference(reference.to_string()));
                }
            }
            if op.output.trim().is_empty() {
                return Err(SpecError::EmptyName(format!("output of '{}'", op.op)));
            }
            if !produced.insert(op.output.as_str()) {
                return Err(SpecError::DuplicateName(op.output.clone()));
            }
        }

        let mut seen_outputs: HashSet<&str> = HashSet::new();
        for output in &self.outputs {
            if !produced.contains(output.id.as_str()) {
                return Err(SpecError::UnknownReference(output.id.clone()));
            }
            if !seen_outputs.insert(output.id.as_str()) {
                return Err(SpecError::DuplicateName(output.id.clone()));
            }
        }

        Ok(())
    }
}

/// Structural spec validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("spec declares no inputs")]
    NoInputs,

    #[error("spec declares no outputs")]
    NoOutputs,

    #[error("operation '{0}' declares no inputs")]
    NoOperationInputs(String),

    #[error("reference '{0}' not found")]
    UnknownReference(String),

    #[error("name '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("{0} has an empty name")]
    EmptyName(String),
}
