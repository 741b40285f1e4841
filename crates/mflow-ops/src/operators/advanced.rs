//! Advanced operators: playback speed.

use mflow_models::{MediaDuration, MediaInfo};

use crate::error::{OpError, OpResult};
use crate::operator::{
    disk_estimate_mb, CompileContext, FilterFragment, OpCategory, Operator, OperatorDescriptor,
    ResourceCost, StreamLabel,
};
use crate::operators::{fmt_number, input_duration};
use crate::params::{ParamSpec, ParamType, Params};

/// Change playback speed of video and audio together.
///
/// ffmpeg's `atempo` only accepts factors in 0.5..2.0 per instance, so
/// factors outside that window compile to a chain.
pub struct SpeedOp;

impl SpeedOp {
    /// Decompose a factor into atempo-legal steps.
    fn atempo_chain(factor: f64) -> Vec<f64> {
        let mut steps = Vec::new();
        let mut remaining = factor;
        while remaining > 2.0 {
            steps.push(2.0);
            remaining /= 2.0;
        }
        while remaining < 0.5 {
            steps.push(0.5);
            remaining /= 0.5;
        }
        steps.push(remaining);
        steps
    }
}

impl Operator for SpeedOp {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "speed",
            category: OpCategory::Advanced,
            params: vec![ParamSpec::new("factor", ParamType::Float)
                .required()
                .range(0.25, 4.0)
                .describe("Playback speed multiplier")
                .examples(&["0.5", "2"])],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["video", "audio"],
            output_media_types: vec!["video", "audio"],
            supports_two_pass: false,
            supports_streaming: false,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("speed input".to_string()))?;
        let factor = params.require_f64("factor")?;
        let scaled = MediaDuration::from_secs_f64(input.duration_secs() / factor);
        Ok(input.clone().with_duration(scaled))
    }

    fn estimate(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("speed input".to_string()))?;
        let factor = params.require_f64("factor")?;
        let output_secs = input_duration(inputs).as_secs_f64() / factor;
        Ok(ResourceCost {
            cpu_seconds: output_secs / 2.0,
            memory_mb: 150.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let factor = ctx.params.require_f64("factor")?;

        let mut fragment = FilterFragment::default();
        if let Some(video) = ctx.video_label() {
            fragment.exprs.push(format!(
                "{}setpts=PTS/{}[v]",
                video.render(),
                fmt_number(factor)
            ));
            fragment.outputs.push(StreamLabel::video("v"));
        }
        if let Some(audio) = ctx.audio_label() {
            let chain = Self::atempo_chain(factor)
                .into_iter()
                .map(|step| format!("atempo={}", fmt_number(step)))
                .collect::<Vec<_>>()
                .join(",");
            fragment
                .exprs
                .push(format!("{}{}[a]", audio.render(), chain));
            fragment.outputs.push(StreamLabel::audio("a"));
        }
        if fragment.exprs.is_empty() {
            return Err(OpError::MissingStream("video or audio"));
        }
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{input_context, sample_info};
    use serde_json::json;

    fn params(factor: f64) -> Params {
        SpeedOp
            .validate(json!({"factor": factor}).as_object().unwrap())
            .unwrap()
    }

    #[test]
    fn speed_scales_duration() {
        let inputs = vec![sample_info()];
        let meta = SpeedOp.output_metadata(&inputs, &params(2.0)).unwrap();
        assert_eq!(meta.duration_secs(), 60.0);
        assert_eq!(inputs[0].duration_secs(), 120.0);
    }

    #[test]
    fn speed_compiles_simple_factor() {
        let fragment = SpeedOp.compile(&input_context(params(2.0))).unwrap();
        assert_eq!(
            fragment.exprs,
            vec!["[0:v]setpts=PTS/2[v]", "[0:a]atempo=2[a]"]
        );
    }

    #[test]
    fn speed_chains_atempo_for_large_factors() {
        let fragment = SpeedOp.compile(&input_context(params(4.0))).unwrap();
        assert_eq!(fragment.exprs[1], "[0:a]atempo=2,atempo=2[a]");
    }

    #[test]
    fn speed_chains_atempo_for_small_factors() {
        let fragment = SpeedOp.compile(&input_context(params(0.25))).unwrap();
        assert_eq!(fragment.exprs[1], "[0:a]atempo=0.500,atempo=0.500[a]");
    }

    #[test]
    fn speed_rejects_out_of_range() {
        assert!(SpeedOp
            .validate(json!({"factor": 10.0}).as_object().unwrap())
            .is_err());
    }
}
