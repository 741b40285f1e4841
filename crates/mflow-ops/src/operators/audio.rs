//! Audio operators: volume and audio_fade.

use serde_json::json;

use mflow_models::{MediaDuration, MediaInfo};

use crate::error::{OpError, OpResult};
use crate::operator::{
    disk_estimate_mb, CompileContext, FilterFragment, OpCategory, Operator, OperatorDescriptor,
    ResourceCost, StreamLabel,
};
use crate::operators::{fmt_number, input_duration};
use crate::params::{ParamSpec, ParamType, Params};

/// Adjust audio gain.
pub struct VolumeOp;

impl Operator for VolumeOp {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "volume",
            category: OpCategory::Audio,
            params: vec![ParamSpec::new("level", ParamType::Float)
                .required()
                .range(0.0, 10.0)
                .describe("Gain multiplier; 1.0 is unchanged")
                .examples(&["0.5", "1.5"])],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["audio", "video"],
            output_media_types: vec!["audio", "video"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("volume input".to_string()))?;
        if input.primary_audio().is_none() {
            return Err(OpError::MissingStream("audio"));
        }
        Ok(input.clone())
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("volume input".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 10.0,
            memory_mb: 50.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let audio = ctx.audio_label().ok_or(OpError::MissingStream("audio"))?;
        let level = ctx.params.require_f64("level")?;

        let mut outputs = ctx.passthrough_video();
        outputs.push(StreamLabel::audio("a"));
        Ok(FilterFragment {
            exprs: vec![format!(
                "{}volume={}[a]",
                audio.render(),
                fmt_number(level)
            )],
            outputs,
        })
    }
}

/// Fade audio in or out over a window.
pub struct AudioFadeOp;

impl Operator for AudioFadeOp {
    fn name(&self) -> &'static str {
        "audio_fade"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "audio_fade",
            category: OpCategory::Audio,
            params: vec![
                ParamSpec::new("type", ParamType::Enum)
                    .default_value(json!("in"))
                    .allowed(&["in", "out"]),
                ParamSpec::new("start", ParamType::Duration).default_value(json!("0s")),
                ParamSpec::new("duration", ParamType::Duration)
                    .required()
                    .range(0.0, 3600.0)
                    .examples(&["2s", "00:00:05"]),
            ],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["audio", "video"],
            output_media_types: vec!["audio", "video"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("audio_fade input".to_string()))?;
        if input.primary_audio().is_none() {
            return Err(OpError::MissingStream("audio"));
        }
        Ok(input.clone())
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("audio_fade input".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 10.0,
            memory_mb: 50.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let audio = ctx.audio_label().ok_or(OpError::MissingStream("audio"))?;
        let fade_type = ctx.params.get_str("type").unwrap_or("in");
        let start = ctx
            .params
            .get_duration("start")
            .unwrap_or(MediaDuration::ZERO);
        let duration = ctx.params.require_duration("duration")?;

        let mut outputs = ctx.passthrough_video();
        outputs.push(StreamLabel::audio("a"));
        Ok(FilterFragment {
            exprs: vec![format!(
                "{}afade=t={}:st={}:d={}[a]",
                audio.render(),
                fade_type,
                start.to_filter_secs(),
                duration.to_filter_secs()
            )],
            outputs,
        })
    }
}
