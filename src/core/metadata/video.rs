//! Stream probing for video files via ffprobe.

use super::MediaMetadata;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Divide an ffprobe rational like `"30000/1001"`.
///
/// Anything else, including a bare `"30"`, yields the `0.0` sentinel.
pub fn parse_frame_rate(value: &str) -> f64 {
    let Some((num, den)) = value.trim().split_once('/') else {
        return 0.0;
    };
    match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
        (Ok(num), Ok(den)) if den != 0.0 && num.is_finite() => num / den,
        _ => 0.0,
    }
}

/// Run ffprobe and map its JSON. Any failure yields empty metadata.
///
/// No timeout is applied here, unlike photo extraction.
pub fn probe_video_metadata(ffprobe: &str, path: &Path) -> MediaMetadata {
    let output = match Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(tool = ffprobe, error = %e, "media prober unavailable");
            return MediaMetadata::default();
        }
    };

    if !output.status.success() {
        tracing::debug!(path = %path.display(), status = %output.status, "ffprobe failed");
        return MediaMetadata::default();
    }

    parse_probe_json(&output.stdout).unwrap_or_default()
}

fn parse_probe_json(bytes: &[u8]) -> Option<MediaMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(bytes).ok()?;
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let rate = video
        .avg_frame_rate
        .as_deref()
        .map(parse_frame_rate)
        .filter(|r| *r > 0.0)
        .or_else(|| video.r_frame_rate.as_deref().map(parse_frame_rate))
        .unwrap_or(0.0);

    let duration = video
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok());

    Some(MediaMetadata {
        width: video.width,
        height: video.height,
        codec: video.codec_name.clone(),
        frame_rate: Some(rate),
        duration,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntsc_rate_divides() {
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("25/1") - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unparseable_rates_are_zero() {
        assert_eq!(parse_frame_rate("30"), 0.0);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("abc/def"), 0.0);
        assert_eq!(parse_frame_rate(""), 0.0);
    }

    #[test]
    fn probe_json_maps_first_video_stream() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "r_frame_rate": "30000/1001", "avg_frame_rate": "0/0"}
            ],
            "format": {"duration": "12.500000"}
        }"#;

        let metadata = parse_probe_json(json).unwrap();
        assert_eq!(metadata.codec.as_deref(), Some("h264"));
        assert_eq!(metadata.width, Some(1920));
        assert!((metadata.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(metadata.duration, Some(12.5));
    }

    #[test]
    fn audio_only_file_has_no_video_metadata() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(parse_probe_json(json).is_none());
    }

    #[test]
    fn missing_prober_degrades() {
        let metadata = probe_video_metadata(
            "definitely-not-a-real-ffprobe-binary",
            Path::new("/tmp/clip.mp4"),
        );
        assert_eq!(metadata, MediaMetadata::default());
    }
}
