//! Video operators: scale, crop, fps.

use serde_json::json;

use mflow_models::MediaInfo;

use crate::error::{OpError, OpResult};
use crate::operator::{
    disk_estimate_mb, CompileContext, FilterFragment, OpCategory, Operator, OperatorDescriptor,
    ResourceCost, StreamLabel,
};
use crate::operators::{fmt_number, input_duration};
use crate::params::{ParamSpec, ParamType, Params};

/// Resize the video stream.
///
/// A `-1` on one axis is computed to preserve the source aspect ratio with
/// integer arithmetic; both axes at `-1` is rejected.
pub struct ScaleOp;

impl ScaleOp {
    /// Resolve `-1` dimensions against the source. Raw values pass through
    /// when no metadata is available.
    fn resolve_dims(&self, input: Option<&MediaInfo>, width: i64, height: i64) -> (i64, i64) {
        let Some(video) = input.and_then(|i| i.primary_video()) else {
            return (width, height);
        };
        let (src_w, src_h) = (video.width as i64, video.height as i64);
        if src_w == 0 || src_h == 0 {
            return (width, height);
        }
        match (width, height) {
            (-1, h) => (src_w * h / src_h, h),
            (w, -1) => (w, src_h * w / src_w),
            other => other,
        }
    }
}

impl Operator for ScaleOp {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "scale",
            category: OpCategory::Video,
            params: vec![
                ParamSpec::new("width", ParamType::Int)
                    .required()
                    .range(-1.0, 7680.0)
                    .describe("Target width; -1 preserves aspect")
                    .examples(&["1280", "-1"]),
                ParamSpec::new("height", ParamType::Int)
                    .required()
                    .range(-1.0, 4320.0)
                    .describe("Target height; -1 preserves aspect")
                    .examples(&["720", "-1"]),
                ParamSpec::new("algorithm", ParamType::Enum)
                    .default_value(json!("bicubic"))
                    .allowed(&["bilinear", "bicubic", "lanczos", "neighbor"]),
            ],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["video"],
            output_media_types: vec!["video"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn check_params(&self, params: &Params) -> OpResult<()> {
        if params.get_i64("width") == Some(-1) && params.get_i64("height") == Some(-1) {
            return Err(OpError::invalid("width and height cannot both be -1"));
        }
        Ok(())
    }

    fn output_metadata(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("scale input".to_string()))?;
        if input.primary_video().is_none() {
            return Err(OpError::MissingStream("video"));
        }

        let width = params.require_i64("width")?;
        let height = params.require_i64("height")?;
        let (width, height) = self.resolve_dims(Some(input), width, height);

        let mut out = input.clone();
        if let Some(video) = out.video_streams.first_mut() {
            video.width = width.max(0) as u32;
            video.height = height.max(0) as u32;
        }
        Ok(out)
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("scale input".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 2.0,
            memory_mb: 200.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let video = ctx.video_label().ok_or(OpError::MissingStream("video"))?;
        let width = ctx.params.require_i64("width")?;
        let height = ctx.params.require_i64("height")?;
        let (width, height) = self.resolve_dims(ctx.primary_metadata(), width, height);
        let algorithm = ctx.params.get_str("algorithm").unwrap_or("bicubic");

        let expr = format!(
            "{}scale={}:{}:flags={}[v]",
            video.render(),
            width,
            height,
            algorithm
        );
        let mut outputs = vec![StreamLabel::video("v")];
        outputs.extend(ctx.passthrough_audio());
        Ok(FilterFragment {
            exprs: vec![expr],
            outputs,
        })
    }
}

/// Cut a rectangle out of the frame.
pub struct CropOp;

impl Operator for CropOp {
    fn name(&self) -> &'static str {
        "crop"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "crop",
            category: OpCategory::Video,
            params: vec![
                ParamSpec::new("width", ParamType::Int)
                    .required()
                    .range(1.0, 7680.0),
                ParamSpec::new("height", ParamType::Int)
                    .required()
                    .range(1.0, 4320.0),
                ParamSpec::new("x", ParamType::Int).range(0.0, 7680.0),
                ParamSpec::new("y", ParamType::Int).range(0.0, 4320.0),
            ],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["video"],
            output_media_types: vec!["video"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("crop input".to_string()))?;
        if input.primary_video().is_none() {
            return Err(OpError::MissingStream("video"));
        }

        let mut out = input.clone();
        if let Some(video) = out.video_streams.first_mut() {
            video.width = params.require_i64("width")? as u32;
            video.height = params.require_i64("height")? as u32;
        }
        Ok(out)
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("crop input".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 4.0,
            memory_mb: 150.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let video = ctx.video_label().ok_or(OpError::MissingStream("video"))?;
        let width = ctx.params.require_i64("width")?;
        let height = ctx.params.require_i64("height")?;

        // Omitted offsets centre the crop.
        let expr = match (ctx.params.get_i64("x"), ctx.params.get_i64("y")) {
            (None, None) => format!("{}crop={}:{}[v]", video.render(), width, height),
            (x, y) => {
                let x = x.map(|v| v.to_string()).unwrap_or_else(|| "(iw-ow)/2".to_string());
                let y = y.map(|v| v.to_string()).unwrap_or_else(|| "(ih-oh)/2".to_string());
                format!("{}crop={}:{}:{}:{}[v]", video.render(), width, height, x, y)
            }
        };

        let mut outputs = vec![StreamLabel::video("v")];
        outputs.extend(ctx.passthrough_audio());
        Ok(FilterFragment {
            exprs: vec![expr],
            outputs,
        })
    }
}

/// Resample the video frame rate.
pub struct FpsOp;

impl Operator for FpsOp {
    fn name(&self) -> &'static str {
        "fps"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "fps",
            category: OpCategory::Video,
            params: vec![ParamSpec::new("fps", ParamType::Float)
                .required()
                .range(1.0, 240.0)
                .examples(&["24", "29.97", "60"])],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["video"],
            output_media_types: vec!["video"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("fps input".to_string()))?;
        if input.primary_video().is_none() {
            return Err(OpError::MissingStream("video"));
        }

        let mut out = input.clone();
        if let Some(video) = out.video_streams.first_mut() {
            video.frame_rate = params.require_f64("fps")?;
        }
        Ok(out)
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("fps input".to_string()))?;
        let output_secs = input_duration(inputs).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 4.0,
            memory_mb: 150.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let video = ctx.video_label().ok_or(OpError::MissingStream("video"))?;
        let fps = ctx.params.require_f64("fps")?;

        let mut outputs = vec![StreamLabel::video("v")];
        outputs.extend(ctx.passthrough_audio());
        Ok(FilterFragment {
            exprs: vec![format!("{}fps={}[v]", video.render(), fmt_number(fps))],
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{input_context, sample_info};
    use serde_json::json;

    fn scale_params(bag: serde_json::Value) -> Params {
        ScaleOp.validate(bag.as_object().unwrap()).unwrap()
    }

    #[test]
    fn scale_rejects_double_auto() {
        let err = ScaleOp
            .validate(json!({"width": -1, "height": -1}).as_object().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("cannot both be -1"));
    }

    #[test]
    fn scale_rejects_out_of_range_width() {
        let err = ScaleOp
            .validate(json!({"width": 8000, "height": 720}).as_object().unwrap())
            .unwrap_err();
        assert!(err.to_string().starts_with("parameter width:"));
    }

    #[test]
    fn scale_resolves_auto_height() {
        let inputs = vec![sample_info()];
        let params = scale_params(json!({"width": 1280, "height": -1}));
        let meta = ScaleOp.output_metadata(&inputs, &params).unwrap();
        let video = meta.primary_video().unwrap();
        assert_eq!((video.width, video.height), (1280, 720));
        // Source untouched.
        assert_eq!(inputs[0].primary_video().unwrap().height, 1080);
    }

    #[test]
    fn scale_resolves_auto_width() {
        let inputs = vec![sample_info()];
        let params = scale_params(json!({"width": -1, "height": 540}));
        let meta = ScaleOp.output_metadata(&inputs, &params).unwrap();
        assert_eq!(meta.primary_video().unwrap().width, 960);
    }

    #[test]
    fn scale_compiles_with_default_algorithm() {
        let params = scale_params(json!({"width": 1280, "height": 720}));
        let fragment = ScaleOp.compile(&input_context(params)).unwrap();
        assert_eq!(fragment.exprs, vec!["[0:v]scale=1280:720:flags=bicubic[v]"]);
        // Audio passes through.
        assert_eq!(fragment.outputs.len(), 2);
        assert_eq!(fragment.outputs[1].render(), "[0:a]");
    }

    #[test]
    fn scale_estimate_follows_cost_model() {
        let inputs = vec![sample_info()];
        let params = scale_params(json!({"width": 1280, "height": 720}));
        let cost = ScaleOp.estimate(&inputs, &params).unwrap();
        assert!((cost.cpu_seconds - 60.0).abs() < 1e-9);
        assert_eq!(cost.memory_mb, 200.0);
    }

    #[test]
    fn crop_defaults_to_centre() {
        let params = CropOp
            .validate(json!({"width": 640, "height": 480}).as_object().unwrap())
            .unwrap();
        let fragment = CropOp.compile(&input_context(params)).unwrap();
        assert_eq!(fragment.exprs, vec!["[0:v]crop=640:480[v]"]);
    }

    #[test]
    fn crop_emits_explicit_offsets() {
        let params = CropOp
            .validate(json!({"width": 640, "height": 480, "x": 10}).as_object().unwrap())
            .unwrap();
        let fragment = CropOp.compile(&input_context(params)).unwrap();
        assert_eq!(fragment.exprs, vec!["[0:v]crop=640:480:10:(ih-oh)/2[v]"]);
    }

    #[test]
    fn fps_updates_frame_rate() {
        let inputs = vec![sample_info()];
        let params = FpsOp.validate(json!({"fps": 60}).as_object().unwrap()).unwrap();
        let meta = FpsOp.output_metadata(&inputs, &params).unwrap();
        assert_eq!(meta.primary_video().unwrap().frame_rate, 60.0);

        let fragment = FpsOp.compile(&input_context(params)).unwrap();
        assert_eq!(fragment.exprs, vec!["[0:v]fps=60[v]"]);
    }
}
