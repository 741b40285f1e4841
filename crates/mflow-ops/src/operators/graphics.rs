//! Graphics operators: overlay and drawtext.

use serde_json::json;

use mflow_models::MediaInfo;

use crate::error::{OpError, OpResult};
use crate::operator::{
    disk_estimate_mb, CompileContext, FilterFragment, OpCategory, Operator, OperatorDescriptor,
    ResourceCost, StreamKind, StreamLabel,
};
use crate::operators::input_duration;
use crate::params::{ParamSpec, ParamType, Params};

/// Composite a second input on top of the first.
pub struct OverlayOp;

impl Operator for OverlayOp {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "overlay",
            category: OpCategory::Graphics,
            params: vec![
                ParamSpec::new("x", ParamType::Int).default_value(json!(0)),
                ParamSpec::new("y", ParamType::Int).default_value(json!(0)),
            ],
            min_inputs: 2,
            max_inputs: 2,
            input_media_types: vec!["video"],
            output_media_types: vec!["video"],
            supports_two_pass: false,
            supports_streaming: false,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<MediaInfo> {
        if inputs.len() < 2 {
            return Err(OpError::MissingMetadata("overlay inputs".to_string()));
        }
        // The base layer dictates dimensions and timing.
        Ok(inputs[0].clone())
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let base = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("overlay inputs".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 2.0,
            memory_mb: 250.0,
            disk_mb: disk_estimate_mb(base, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        self.descriptor().check_arity(ctx.inputs.len())?;
        let base = ctx
            .labels_of(0, StreamKind::Video)
            .ok_or(OpError::MissingStream("video"))?;
        let layer = ctx
            .labels_of(1, StreamKind::Video)
            .ok_or(OpError::MissingStream("video"))?;
        let x = ctx.params.get_i64("x").unwrap_or(0);
        let y = ctx.params.get_i64("y").unwrap_or(0);

        let mut outputs = vec![StreamLabel::video("v")];
        // Only the base layer's audio survives compositing.
        if let Some(audio) = ctx.labels_of(0, StreamKind::Audio) {
            outputs.push(audio.clone());
        }
        Ok(FilterFragment {
            exprs: vec![format!(
                "{}{}overlay={}:{}[v]",
                base.render(),
                layer.render(),
                x,
                y
            )],
            outputs,
        })
    }
}

/// Burn text into the video.
pub struct DrawtextOp;

impl DrawtextOp {
    /// Escape for a single-quoted drawtext argument.
    fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                ':' => out.push_str("\\:"),
                '\'' => out.push_str("\\'"),
                other => out.push(other),
            }
        }
        out
    }
}

impl Operator for DrawtextOp {
    fn name(&self) -> &'static str {
        "drawtext"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "drawtext",
            category: OpCategory::Graphics,
            params: vec![
                ParamSpec::new("text", ParamType::String)
                    .required()
                    .length(1, 500),
                ParamSpec::new("fontsize", ParamType::Int)
                    .default_value(json!(24))
                    .range(8.0, 400.0),
                ParamSpec::new("fontcolor", ParamType::String)
                    .default_value(json!("white"))
                    .pattern("^[A-Za-z0-9#]+$"),
                ParamSpec::new("x", ParamType::String).default_value(json!("10")),
                ParamSpec::new("y", ParamType::String).default_value(json!("10")),
            ],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["video"],
            output_media_types: vec!["video"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("drawtext input".to_string()))?;
        if input.primary_video().is_none() {
            return Err(OpError::MissingStream("video"));
        }
        Ok(input.clone())
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("drawtext input".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 3.0,
            memory_mb: 150.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let video = ctx.video_label().ok_or(OpError::MissingStream("video"))?;
        let text = ctx.params.require_str("text")?;
        let fontsize = ctx.params.get_i64("fontsize").unwrap_or(24);
        let fontcolor = ctx.params.get_str("fontcolor").unwrap_or("white");
        let x = ctx.params.get_str("x").unwrap_or("10");
        let y = ctx.params.get_str("y").unwrap_or("10");

        let mut outputs = vec![StreamLabel::video("v")];
        outputs.extend(ctx.passthrough_audio());
        Ok(FilterFragment {
            exprs: vec![format!(
                "{}drawtext=text='{}':fontsize={}:fontcolor={}:x={}:y={}[v]",
                video.render(),
                Self::escape(text),
                fontsize,
                fontcolor,
                x,
                y
            )],
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{input_context, sample_info};
    use serde_json::json;

    #[test]
    fn overlay_composites_two_inputs() {
        let params = OverlayOp
            .validate(json!({"x": 20, "y": 40}).as_object().unwrap())
            .unwrap();
        let ctx = CompileContext {
            inputs: vec![
                vec![StreamLabel::video("0:v"), StreamLabel::audio("0:a")],
                vec![StreamLabel::video("1:v")],
            ],
            params,
            metadata: Vec::new(),
        };
        let fragment = OverlayOp.compile(&ctx).unwrap();
        assert_eq!(fragment.exprs, vec!["[0:v][1:v]overlay=20:40[v]"]);
        // Base audio passes through, the layer's does not exist.
        assert_eq!(fragment.outputs.len(), 2);
        assert_eq!(fragment.outputs[1].render(), "[0:a]");
    }

    #[test]
    fn overlay_takes_base_metadata() {
        let mut small = sample_info();
        small.video_streams[0].width = 320;
        let inputs = vec![sample_info(), small];
        let params = OverlayOp.validate(&serde_json::Map::new()).unwrap();
        let meta = OverlayOp.output_metadata(&inputs, &params).unwrap();
        assert_eq!(meta.primary_video().unwrap().width, 1920);
    }

    #[test]
    fn drawtext_escapes_special_characters() {
        let params = DrawtextOp
            .validate(json!({"text": "it's 10:00"}).as_object().unwrap())
            .unwrap();
        let fragment = DrawtextOp.compile(&input_context(params)).unwrap();
        assert_eq!(
            fragment.exprs,
            vec!["[0:v]drawtext=text='it\\'s 10\\:00':fontsize=24:fontcolor=white:x=10:y=10[v]"]
        );
    }

    #[test]
    fn drawtext_rejects_bad_color() {
        let err = DrawtextOp
            .validate(
                json!({"text": "hi", "fontcolor": "not a color"})
                    .as_object()
                    .unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("parameter fontcolor:"));
    }

    #[test]
    fn drawtext_rejects_empty_text() {
        let err = DrawtextOp
            .validate(json!({"text": ""}).as_object().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("below minimum"));
    }
}
