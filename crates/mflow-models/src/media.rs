//! Probed media metadata.
//!
//! `MediaInfo` is the record the probe collaborator produces for a local
//! file and the planner propagates through the graph. Clones are deep;
//! operators receive clones so they can never mutate a predecessor's
//! metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration::MediaDuration;

/// Container-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormatInfo {
    /// Source filename or staged path
    #[serde(default)]
    pub filename: String,

    /// Container format name (e.g. "mov,mp4,m4a,3gp,3g2,mj2")
    #[serde(default)]
    pub format_name: String,

    /// Total duration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<MediaDuration>,

    /// File size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Overall bitrate in bits/second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,

    /// Start offset in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
}

/// A single video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoStream {
    pub index: u32,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second
    pub frame_rate: f64,
    #[serde(default)]
    pub pixel_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<MediaDuration>,
}

/// A single audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioStream {
    pub index: u32,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<MediaDuration>,
}

/// Full probed metadata for one media source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaInfo {
    pub format: FormatInfo,
    #[serde(default)]
    pub video_streams: Vec<VideoStream>,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        !self.video_streams.is_empty()
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_streams.is_empty()
    }

    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }

    pub fn primary_audio(&self) -> Option<&AudioStream> {
        self.audio_streams.first()
    }

    /// Container duration in seconds, 0 when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.format
            .duration
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> Option<MediaDuration> {
        self.format.duration
    }

    /// Overall bitrate in bits/second, falling back to stream bitrates.
    pub fn bit_rate(&self) -> Option<u64> {
        self.format.bit_rate.or_else(|| {
            let video: u64 = self.video_streams.iter().filter_map(|s| s.bit_rate).sum();
            let audio: u64 = self.audio_streams.iter().filter_map(|s| s.bit_rate).sum();
            let total = video + audio;
            (total > 0).then_some(total)
        })
    }

    /// Replace the container duration, clamping stream durations that would
    /// exceed it.
    pub fn with_duration(mut self, duration: MediaDuration) -> Self {
        self.format.duration = Some(duration);
        for stream in &mut self.video_streams {
            stream.duration = Some(duration);
        }
        for stream in &mut self.audio_streams {
            stream.duration = Some(duration);
        }
        self
    }
}
