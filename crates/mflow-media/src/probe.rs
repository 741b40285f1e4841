//! FFprobe wrapper producing `MediaInfo`.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use mflow_models::{AudioStream, FormatInfo, MediaDuration, MediaInfo, VideoStream};

use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output shape.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    filename: Option<String>,
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
    start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a local media file.
pub async fn probe(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::ToolNotFound("ffprobe".to_string()))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("exit status {:?}", output.status.code()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    into_media_info(probe)
}

fn into_media_info(probe: FfprobeOutput) -> MediaResult<MediaInfo> {
    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .map(MediaDuration::from_secs_f64);

    let format = FormatInfo {
        filename: probe.format.filename.unwrap_or_default(),
        format_name: probe.format.format_name.unwrap_or_default(),
        duration,
        size: probe.format.size.as_deref().and_then(|s| s.parse().ok()),
        bit_rate: probe.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
        start_time: probe
            .format
            .start_time
            .as_deref()
            .and_then(|s| s.parse().ok()),
    };

    let mut info = MediaInfo {
        format,
        video_streams: Vec::new(),
        audio_streams: Vec::new(),
    };

    for stream in probe.streams {
        let stream_duration = stream
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .map(MediaDuration::from_secs_f64)
            .or(duration);

        match stream.codec_type.as_str() {
            "video" => info.video_streams.push(VideoStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                width: stream.width.unwrap_or(0),
                height: stream.height.unwrap_or(0),
                frame_rate: stream
                    .avg_frame_rate
                    .as_deref()
                    .or(stream.r_frame_rate.as_deref())
                    .and_then(parse_frame_rate)
                    .unwrap_or(0.0),
                pixel_format: stream.pix_fmt.unwrap_or_default(),
                bit_rate: stream.bit_rate.as_deref().and_then(|b| b.parse().ok()),
                duration: stream_duration,
            }),
            "audio" => info.audio_streams.push(AudioStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                sample_rate: stream
                    .sample_rate
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                channels: stream.channels.unwrap_or(0),
                bit_rate: stream.bit_rate.as_deref().and_then(|b| b.parse().ok()),
                duration: stream_duration,
            }),
            _ => {}
        }
    }

    if !info.has_video() && !info.has_audio() {
        return Err(MediaError::InvalidMedia(
            "no video or audio streams found".to_string(),
        ));
    }
    Ok(info)
}

/// Parse a frame rate string (`"30/1"` or `"29.97"`).
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_rates() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("30/0").is_none());
    }

    #[test]
    fn maps_ffprobe_json() {
        let raw = serde_json::json!({
            "format": {
                "filename": "in.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "120.5",
                "size": "10000000",
                "bit_rate": "2000000",
                "start_time": "0.000000"
            },
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264",
                 "width": 1920, "height": 1080, "pix_fmt": "yuv420p",
                 "avg_frame_rate": "30/1", "bit_rate": "1800000"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac",
                 "sample_rate": "48000", "channels": 2, "bit_rate": "128000"},
                {"index": 2, "codec_type": "subtitle"}
            ]
        });
        let probe: FfprobeOutput = serde_json::from_value(raw).unwrap();
        let info = into_media_info(probe).unwrap();

        assert!((info.duration_secs() - 120.5).abs() < 1e-9);
        assert_eq!(info.video_streams.len(), 1);
        assert_eq!(info.audio_streams.len(), 1);
        let video = info.primary_video().unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert_eq!(video.frame_rate, 30.0);
        assert_eq!(info.primary_audio().unwrap().sample_rate, 48_000);
    }

    #[test]
    fn rejects_streamless_files() {
        let raw = serde_json::json!({"format": {"duration": "1.0"}, "streams": []});
        let probe: FfprobeOutput = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            into_media_info(probe),
            Err(MediaError::InvalidMedia(_))
        ));
    }
}
