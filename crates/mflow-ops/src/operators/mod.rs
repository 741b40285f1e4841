//! Built-in operators.

pub mod advanced;
pub mod audio;
pub mod graphics;
pub mod timeline;
pub mod video;

use std::sync::Arc;

use mflow_models::{MediaDuration, MediaInfo};

use crate::registry::OperatorRegistry;

pub use advanced::SpeedOp;
pub use audio::{AudioFadeOp, VolumeOp};
pub use graphics::{DrawtextOp, OverlayOp};
pub use timeline::{ConcatOp, TrimOp};
pub use video::{CropOp, FpsOp, ScaleOp};

/// Register every built-in operator into a registry.
pub fn register_builtins(registry: &OperatorRegistry) {
    registry.register(Arc::new(TrimOp));
    registry.register(Arc::new(ConcatOp));
    registry.register(Arc::new(ScaleOp));
    registry.register(Arc::new(CropOp));
    registry.register(Arc::new(FpsOp));
    registry.register(Arc::new(VolumeOp));
    registry.register(Arc::new(AudioFadeOp));
    registry.register(Arc::new(OverlayOp));
    registry.register(Arc::new(DrawtextOp));
    registry.register(Arc::new(SpeedOp));
}

/// Duration of the first input, zero when unknown.
pub(crate) fn input_duration(inputs: &[MediaInfo]) -> MediaDuration {
    inputs
        .first()
        .and_then(|i| i.duration())
        .unwrap_or(MediaDuration::ZERO)
}

/// Render a float the way filter expressions want it: integral values
/// without a fraction, everything else with millisecond precision.
pub(crate) fn fmt_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use mflow_models::{AudioStream, FormatInfo, MediaDuration, MediaInfo, VideoStream};

    use crate::operator::{CompileContext, StreamLabel};
    use crate::params::Params;

    /// A 1920x1080, 120-second sample with one video and one audio stream.
    pub fn sample_info() -> MediaInfo {
        MediaInfo {
            format: FormatInfo {
                filename: "in.mp4".to_string(),
                format_name: "mp4".to_string(),
                duration: Some(MediaDuration::from_secs(120)),
                size: Some(30_000_000),
                bit_rate: Some(2_000_000),
                start_time: Some(0.0),
            },
            video_streams: vec![VideoStream {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate: 30.0,
                pixel_format: "yuv420p".to_string(),
                bit_rate: Some(1_800_000),
                duration: Some(MediaDuration::from_secs(120)),
            }],
            audio_streams: vec![AudioStream {
                index: 1,
                codec: "aac".to_string(),
                sample_rate: 48_000,
                channels: 2,
                bit_rate: Some(128_000),
                duration: Some(MediaDuration::from_secs(120)),
            }],
        }
    }

    /// A context with raw `[0:v]`/`[0:a]` labels and sample metadata.
    pub fn input_context(params: Params) -> CompileContext {
        CompileContext {
            inputs: vec![vec![StreamLabel::video("0:v"), StreamLabel::audio("0:a")]],
            params,
            metadata: vec![sample_info()],
        }
    }
}
