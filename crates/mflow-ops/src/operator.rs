//! The operator contract.
//!
//! An operator is a named, self-describing unit: it validates its parameter
//! bag, computes output metadata from its inputs, estimates resource cost,
//! and compiles into a filter-graph fragment. Operators are stateless and
//! shared; they are called concurrently from many tasks.

use serde_json::Value;

use mflow_models::MediaInfo;

use crate::error::{OpError, OpResult};
use crate::params::{validate_params, ParamSpec, Params};

/// Operator category tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    Timeline,
    Audio,
    Video,
    Graphics,
    Output,
    Advanced,
}

impl OpCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpCategory::Timeline => "timeline",
            OpCategory::Audio => "audio",
            OpCategory::Video => "video",
            OpCategory::Graphics => "graphics",
            OpCategory::Output => "output",
            OpCategory::Advanced => "advanced",
        }
    }
}

/// Semantic stream kind carried alongside every label.
///
/// Raw input labels (`0:v`) still encode their kind as a substring; carrying
/// the kind explicitly means downstream code never re-parses label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

/// A named stream label (`[0:v]`, `[v]`) with its semantic kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLabel {
    /// Bare label text without brackets
    pub name: String,
    pub kind: StreamKind,
}

impl StreamLabel {
    pub fn video(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Video,
        }
    }

    pub fn audio(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Audio,
        }
    }

    /// Infer the kind from the `:v`/`:a` substring of a raw input label.
    pub fn from_raw(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = if name.contains(":a") {
            StreamKind::Audio
        } else {
            StreamKind::Video
        };
        Self { name, kind }
    }

    /// Bracketed form as the filter graph wants it.
    pub fn render(&self) -> String {
        format!("[{}]", self.name)
    }
}

/// Static descriptor registered for every operator.
#[derive(Debug, Clone)]
pub struct OperatorDescriptor {
    pub name: &'static str,
    pub category: OpCategory,
    pub params: Vec<ParamSpec>,
    pub min_inputs: usize,
    pub max_inputs: usize,
    pub input_media_types: Vec<&'static str>,
    pub output_media_types: Vec<&'static str>,
    pub supports_two_pass: bool,
    pub supports_streaming: bool,
}

impl OperatorDescriptor {
    pub fn check_arity(&self, got: usize) -> OpResult<()> {
        if got < self.min_inputs || got > self.max_inputs {
            return Err(OpError::Arity {
                op: self.name.to_string(),
                min: self.min_inputs,
                max: self.max_inputs,
                got,
            });
        }
        Ok(())
    }
}

/// Estimated resource cost of running one operation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceCost {
    pub cpu_seconds: f64,
    pub memory_mb: f64,
    pub disk_mb: f64,
}

/// Everything an operator needs to compile its filter fragment.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Per predecessor, the labels that predecessor produced
    pub inputs: Vec<Vec<StreamLabel>>,
    /// Coerced parameter bag
    pub params: Params,
    /// Cloned predecessor metadata, in the same order as `inputs`.
    /// Empty when propagation has not run.
    pub metadata: Vec<MediaInfo>,
}

impl CompileContext {
    /// First video label across all inputs.
    pub fn video_label(&self) -> Option<&StreamLabel> {
        self.inputs
            .iter()
            .flatten()
            .find(|l| l.kind == StreamKind::Video)
    }

    /// First audio label across all inputs.
    pub fn audio_label(&self) -> Option<&StreamLabel> {
        self.inputs
            .iter()
            .flatten()
            .find(|l| l.kind == StreamKind::Audio)
    }

    /// First label of each kind for one input.
    pub fn labels_of(&self, input: usize, kind: StreamKind) -> Option<&StreamLabel> {
        self.inputs.get(input)?.iter().find(|l| l.kind == kind)
    }

    /// All audio labels, for operators that pass audio through untouched.
    pub fn passthrough_audio(&self) -> Vec<StreamLabel> {
        self.inputs
            .iter()
            .flatten()
            .filter(|l| l.kind == StreamKind::Audio)
            .cloned()
            .collect()
    }

    /// All video labels, for audio operators that pass video through.
    pub fn passthrough_video(&self) -> Vec<StreamLabel> {
        self.inputs
            .iter()
            .flatten()
            .filter(|l| l.kind == StreamKind::Video)
            .cloned()
            .collect()
    }

    /// Metadata of the first input, when propagation has run.
    pub fn primary_metadata(&self) -> Option<&MediaInfo> {
        self.metadata.first()
    }
}

/// A compiled filter-graph fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterFragment {
    /// Filter expressions, joined with `;` by the command builder
    pub exprs: Vec<String>,
    /// The labels this operation's node exposes to successors
    pub outputs: Vec<StreamLabel>,
}

impl std::fmt::Debug for dyn Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator").field("name", &self.name()).finish()
    }
}

/// The capability set every operator satisfies.
pub trait Operator: Send + Sync {
    fn name(&self) -> &'static str;

    fn category(&self) -> OpCategory {
        self.descriptor().category
    }

    fn descriptor(&self) -> OperatorDescriptor;

    /// Descriptor-driven validation plus operator-specific cross-field
    /// checks. Returns the coerced parameter bag.
    fn validate(&self, bag: &serde_json::Map<String, Value>) -> OpResult<Params> {
        let params = validate_params(&self.descriptor().params, bag)?;
        self.check_params(&params)?;
        Ok(params)
    }

    /// Cross-field rules beyond the declarative ones.
    fn check_params(&self, _params: &Params) -> OpResult<()> {
        Ok(())
    }

    /// Compute the metadata of this operation's output from cloned input
    /// metadata. Must not mutate `inputs`.
    fn output_metadata(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<MediaInfo>;

    /// Estimate the resource cost of running this operation.
    fn estimate(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<ResourceCost>;

    /// Emit this operation's filter-graph fragment.
    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment>;
}

/// Disk estimate shared by most operators: bitrate · seconds / 8, in MB.
pub(crate) fn disk_estimate_mb(info: &MediaInfo, output_secs: f64) -> f64 {
    const FALLBACK_BIT_RATE: u64 = 4_000_000;
    let bit_rate = info.bit_rate().unwrap_or(FALLBACK_BIT_RATE) as f64;
    bit_rate * output_secs / 8.0 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_label_kind_inference() {
        assert_eq!(StreamLabel::from_raw("0:v").kind, StreamKind::Video);
        assert_eq!(StreamLabel::from_raw("3:a").kind, StreamKind::Audio);
        assert_eq!(StreamLabel::from_raw("0:v").render(), "[0:v]");
    }

    #[test]
    fn arity_bounds() {
        let descriptor = OperatorDescriptor {
            name: "concat",
            category: OpCategory::Timeline,
            params: Vec::new(),
            min_inputs: 2,
            max_inputs: 8,
            input_media_types: vec!["video"],
            output_media_types: vec!["video"],
            supports_two_pass: false,
            supports_streaming: false,
        };
        assert!(descriptor.check_arity(2).is_ok());
        assert!(descriptor.check_arity(1).is_err());
        assert!(descriptor.check_arity(9).is_err());
    }
}
