//! Timeline operators: trim and concat.

use serde_json::json;

use mflow_models::{MediaDuration, MediaInfo};

use crate::error::{OpError, OpResult};
use crate::operator::{
    disk_estimate_mb, CompileContext, FilterFragment, OpCategory, Operator, OperatorDescriptor,
    ResourceCost, StreamKind, StreamLabel,
};
use crate::operators::input_duration;
use crate::params::{ParamSpec, ParamType, Params};

/// Cut a time window out of the input.
///
/// `duration` and `end` are mutually exclusive. The output duration is
/// `duration` when given, else `end - start`, else the input duration minus
/// `start`.
pub struct TrimOp;

impl TrimOp {
    fn output_duration(&self, inputs: &[MediaInfo], params: &Params) -> MediaDuration {
        let start = params.get_duration("start").unwrap_or(MediaDuration::ZERO);
        if let Some(duration) = params.get_duration("duration") {
            return duration;
        }
        if let Some(end) = params.get_duration("end") {
            return end.saturating_sub(start);
        }
        input_duration(inputs).saturating_sub(start)
    }

    /// Explicit window length to emit, when one is derivable from params.
    fn emitted_duration(&self, params: &Params) -> Option<MediaDuration> {
        let start = params.get_duration("start").unwrap_or(MediaDuration::ZERO);
        params
            .get_duration("duration")
            .or_else(|| params.get_duration("end").map(|end| end.saturating_sub(start)))
    }
}

impl Operator for TrimOp {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "trim",
            category: OpCategory::Timeline,
            params: vec![
                ParamSpec::new("start", ParamType::Duration)
                    .default_value(json!("0s"))
                    .describe("Window start offset")
                    .examples(&["10s", "00:00:10", "PT10S"]),
                ParamSpec::new("duration", ParamType::Duration)
                    .describe("Window length; exclusive with end")
                    .examples(&["30s", "00:00:30"]),
                ParamSpec::new("end", ParamType::Timecode)
                    .describe("Window end timecode; exclusive with duration")
                    .examples(&["00:00:40"]),
            ],
            min_inputs: 1,
            max_inputs: 1,
            input_media_types: vec!["video", "audio"],
            output_media_types: vec!["video", "audio"],
            supports_two_pass: false,
            supports_streaming: true,
        }
    }

    fn check_params(&self, params: &Params) -> OpResult<()> {
        if params.contains("duration") && params.contains("end") {
            return Err(OpError::parameter(
                "duration",
                "mutually exclusive with 'end'",
            ));
        }
        Ok(())
    }

    fn output_metadata(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<MediaInfo> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("trim input".to_string()))?;
        Ok(input.clone().with_duration(self.output_duration(inputs, params)))
    }

    fn estimate(&self, inputs: &[MediaInfo], params: &Params) -> OpResult<ResourceCost> {
        let input = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("trim input".to_string()))?;
        let output_secs = self.output_duration(inputs, params).as_secs_f64();
        Ok(ResourceCost {
            cpu_seconds: output_secs / 10.0,
            memory_mb: 100.0,
            disk_mb: disk_estimate_mb(input, output_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let start = ctx
            .params
            .get_duration("start")
            .unwrap_or(MediaDuration::ZERO);
        let window = self.emitted_duration(&ctx.params);

        let mut args = format!("start={}", start.to_filter_secs());
        if let Some(duration) = window {
            args.push_str(&format!(":duration={}", duration.to_filter_secs()));
        }

        let mut fragment = FilterFragment::default();
        if let Some(video) = ctx.video_label() {
            fragment
                .exprs
                .push(format!("{}trim={}[v]", video.render(), args));
            fragment.outputs.push(StreamLabel::video("v"));
        }
        if let Some(audio) = ctx.audio_label() {
            fragment
                .exprs
                .push(format!("{}atrim={}[a]", audio.render(), args));
            fragment.outputs.push(StreamLabel::audio("a"));
        }
        if fragment.exprs.is_empty() {
            return Err(OpError::MissingStream("video or audio"));
        }
        Ok(fragment)
    }
}

/// Join inputs end to end.
pub struct ConcatOp;

impl Operator for ConcatOp {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn descriptor(&self) -> OperatorDescriptor {
        OperatorDescriptor {
            name: "concat",
            category: OpCategory::Timeline,
            params: Vec::new(),
            min_inputs: 2,
            max_inputs: 8,
            input_media_types: vec!["video", "audio"],
            output_media_types: vec!["video", "audio"],
            supports_two_pass: false,
            supports_streaming: false,
        }
    }

    fn output_metadata(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<MediaInfo> {
        let first = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("concat inputs".to_string()))?;
        let total = inputs.iter().fold(MediaDuration::ZERO, |acc, info| {
            acc.saturating_add(info.duration().unwrap_or(MediaDuration::ZERO))
        });
        Ok(first.clone().with_duration(total))
    }

    fn estimate(&self, inputs: &[MediaInfo], _params: &Params) -> OpResult<ResourceCost> {
        let first = inputs
            .first()
            .ok_or_else(|| OpError::MissingMetadata("concat inputs".to_string()))?;
        let total_secs: f64 = inputs.iter().map(|i| i.duration_secs()).sum();
        Ok(ResourceCost {
            cpu_seconds: total_secs / 4.0,
            memory_mb: 150.0,
            disk_mb: disk_estimate_mb(first, total_secs),
        })
    }

    fn compile(&self, ctx: &CompileContext) -> OpResult<FilterFragment> {
        let n = ctx.inputs.len();
        self.descriptor().check_arity(n)?;

        // Audio participates only when every segment carries it; a silent
        // segment would otherwise desynchronize the join.
        let with_audio = (0..n).all(|i| ctx.labels_of(i, StreamKind::Audio).is_some());
        let with_video = (0..n).all(|i| ctx.labels_of(i, StreamKind::Video).is_some());
        if !with_video && !with_audio {
            return Err(OpError::MissingStream("video or audio"));
        }

        let mut sequence = String::new();
        for i in 0..n {
            if with_video {
                if let Some(video) = ctx.labels_of(i, StreamKind::Video) {
                    sequence.push_str(&video.render());
                }
            }
            if with_audio {
                if let Some(audio) = ctx.labels_of(i, StreamKind::Audio) {
                    sequence.push_str(&audio.render());
                }
            }
        }

        let mut expr = format!(
            "{}concat=n={}:v={}:a={}",
            sequence,
            n,
            with_video as u8,
            with_audio as u8
        );
        let mut outputs = Vec::new();
        if with_video {
            expr.push_str("[v]");
            outputs.push(StreamLabel::video("v"));
        }
        if with_audio {
            expr.push_str("[a]");
            outputs.push(StreamLabel::audio("a"));
        }

        Ok(FilterFragment {
            exprs: vec![expr],
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{input_context, sample_info};
    use serde_json::json;

    fn trim_params(bag: serde_json::Value) -> Params {
        TrimOp.validate(bag.as_object().unwrap()).unwrap()
    }

    #[test]
    fn trim_rejects_duration_with_end() {
        let err = TrimOp
            .validate(
                json!({"duration": "30s", "end": "00:00:40"})
                    .as_object()
                    .unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn trim_output_duration_precedence() {
        let inputs = vec![sample_info()];

        let explicit = trim_params(json!({"start": "10s", "duration": "30s"}));
        assert_eq!(
            TrimOp.output_metadata(&inputs, &explicit).unwrap().duration_secs(),
            30.0
        );

        let via_end = trim_params(json!({"start": "10s", "end": "00:00:40"}));
        assert_eq!(
            TrimOp.output_metadata(&inputs, &via_end).unwrap().duration_secs(),
            30.0
        );

        let remainder = trim_params(json!({"start": "20s"}));
        assert_eq!(
            TrimOp.output_metadata(&inputs, &remainder).unwrap().duration_secs(),
            100.0
        );
    }

    #[test]
    fn trim_does_not_mutate_inputs() {
        let inputs = vec![sample_info()];
        let before = inputs.clone();
        let params = trim_params(json!({"start": "10s", "duration": "30s"}));
        TrimOp.output_metadata(&inputs, &params).unwrap();
        assert_eq!(inputs, before);
    }

    #[test]
    fn trim_estimate_follows_cost_model() {
        let inputs = vec![sample_info()];
        let params = trim_params(json!({"start": "10s", "duration": "30s"}));
        let cost = TrimOp.estimate(&inputs, &params).unwrap();
        assert!((cost.cpu_seconds - 3.0).abs() < 1e-9);
        assert_eq!(cost.memory_mb, 100.0);
        // 2 Mbit/s * 30 s / 8 = 7.5 MB
        assert!((cost.disk_mb - 7.5).abs() < 1e-9);
    }

    #[test]
    fn trim_compiles_both_stream_kinds() {
        let params = trim_params(json!({"start": "00:00:10", "duration": "00:00:30"}));
        let fragment = TrimOp.compile(&input_context(params)).unwrap();
        assert_eq!(
            fragment.exprs,
            vec![
                "[0:v]trim=start=10.000:duration=30.000[v]",
                "[0:a]atrim=start=10.000:duration=30.000[a]",
            ]
        );
        assert_eq!(fragment.outputs.len(), 2);
        assert_eq!(fragment.outputs[0].render(), "[v]");
        assert_eq!(fragment.outputs[1].render(), "[a]");
    }

    #[test]
    fn trim_omits_duration_when_open_ended() {
        let params = trim_params(json!({"start": "5s"}));
        let fragment = TrimOp.compile(&input_context(params)).unwrap();
        assert_eq!(fragment.exprs[0], "[0:v]trim=start=5.000[v]");
    }

    #[test]
    fn concat_sums_durations() {
        let inputs = vec![sample_info(), sample_info()];
        let meta = ConcatOp.output_metadata(&inputs, &Params::default()).unwrap();
        assert_eq!(meta.duration_secs(), 240.0);
    }

    #[test]
    fn concat_compiles_interleaved_pairs() {
        let ctx = CompileContext {
            inputs: vec![
                vec![StreamLabel::video("0:v"), StreamLabel::audio("0:a")],
                vec![StreamLabel::video("1:v"), StreamLabel::audio("1:a")],
            ],
            params: Params::default(),
            metadata: Vec::new(),
        };
        let fragment = ConcatOp.compile(&ctx).unwrap();
        assert_eq!(
            fragment.exprs,
            vec!["[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[v][a]"]
        );
    }

    #[test]
    fn concat_drops_audio_when_a_segment_lacks_it() {
        let ctx = CompileContext {
            inputs: vec![
                vec![StreamLabel::video("0:v"), StreamLabel::audio("0:a")],
                vec![StreamLabel::video("1:v")],
            ],
            params: Params::default(),
            metadata: Vec::new(),
        };
        let fragment = ConcatOp.compile(&ctx).unwrap();
        assert_eq!(fragment.exprs, vec!["[0:v][1:v]concat=n=2:v=1:a=0[v]"]);
        assert_eq!(fragment.outputs.len(), 1);
    }

    #[test]
    fn concat_rejects_single_input() {
        let ctx = CompileContext {
            inputs: vec![vec![StreamLabel::video("0:v")]],
            params: Params::default(),
            metadata: Vec::new(),
        };
        assert!(matches!(
            ConcatOp.compile(&ctx),
            Err(OpError::Arity { .. })
        ));
    }
}
