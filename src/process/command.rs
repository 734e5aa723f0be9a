//! # Recording command lines.
//!
//! [`RecordingCommand`] turns a camera, its output directory and the encoder family of
//! the resource class it holds into a [`CommandSpec`] for the transcoder:
//!
//! ```text
//! ffmpeg -hide_banner -loglevel warning
//!        [hwaccel flags]                        ← EncoderFamily::Nvenc only
//!        -rtsp_transport tcp -i <source>
//!        -map 0:v -map 0:a?
//!        <encoder flags>                        ← per EncoderFamily
//!        -f segment -segment_time <secs> -segment_format <muxer of ext>
//!        -strftime 1 -reset_timestamps 1
//!        <root>/<safe_name>/<safe_name>_%Y%m%d_%H%M%S.<ext>
//!        [-map 0:v -map 0:a? <live flags>       ← only with a live publish URL
//!         -f rtsp -rtsp_transport tcp <url>]
//! ```
//!
//! The live output is a low-latency H.264 copy of the camera pushed to the streaming
//! gateway. It rides on the same process so a camera costs one decoder, not two.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Hardware encoder family selected by a resource class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderFamily {
    /// NVIDIA NVENC (H.265) with CUDA decode.
    Nvenc,
    /// VAAPI (H.264) with software decode and hardware upload.
    Vaapi,
    /// Stream copy, no re-encode.
    Copy,
}

impl EncoderFamily {
    fn input_flags(&self) -> &'static [&'static str] {
        match self {
            EncoderFamily::Nvenc => &["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"],
            EncoderFamily::Vaapi | EncoderFamily::Copy => &[],
        }
    }

    fn encoder_flags(&self) -> &'static [&'static str] {
        match self {
            EncoderFamily::Nvenc => &[
                "-c:v", "hevc_nvenc", "-preset", "p4", "-c:a", "aac", "-b:a", "128k",
            ],
            EncoderFamily::Vaapi => &[
                "-vf",
                "format=nv12,hwupload",
                "-c:v",
                "h264_vaapi",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
            ],
            EncoderFamily::Copy => &["-c:v", "copy", "-c:a", "copy"],
        }
    }

    fn live_flags(&self) -> &'static [&'static str] {
        match self {
            EncoderFamily::Nvenc => &[
                "-c:v", "h264_nvenc", "-preset", "p4", "-tune", "ll", "-b:v", "3M",
                "-maxrate", "3M", "-bufsize", "6M", "-r", "25", "-g", "50", "-c:a", "aac",
                "-b:a", "128k",
            ],
            EncoderFamily::Vaapi => &[
                "-vf",
                "format=nv12,hwupload,scale_vaapi=1920:1080",
                "-c:v",
                "h264_vaapi",
                "-b:v",
                "3M",
                "-maxrate",
                "3M",
                "-bufsize",
                "6M",
                "-r",
                "25",
                "-g",
                "50",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
            ],
            EncoderFamily::Copy => &["-c:v", "copy", "-c:a", "copy"],
        }
    }
}

/// Segment muxer for a recording file extension, `None` when unsupported.
///
/// ```
/// use camvisor::process::segment_format;
///
/// assert_eq!(segment_format("mkv"), Some("matroska"));
/// assert_eq!(segment_format("avi"), None);
/// ```
pub fn segment_format(extension: &str) -> Option<&'static str> {
    match extension {
        "mp4" => Some("mp4"),
        "mov" => Some("mov"),
        "mkv" => Some("matroska"),
        "ts" => Some("mpegts"),
        _ => None,
    }
}

/// Fills `{camera}` in a publish URL template with the camera id.
pub fn live_publish_url(template: &str, camera_id: &str) -> String {
    template.replace("{camera}", camera_id)
}

/// Fully-formed command for the external process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable to run.
    pub program: String,
    /// Arguments (without the program itself).
    pub args: Vec<String>,
    /// Directory the process writes into (created before launch).
    pub output_dir: PathBuf,
    /// File receiving the process' stderr, if any.
    pub log_file: Option<PathBuf>,
}

/// Inputs of one recording command.
#[derive(Clone, Debug)]
pub struct RecordingCommand<'a> {
    /// Camera source address (RTSP URL).
    pub source_address: &'a str,
    /// Camera display name, used for directory and file names.
    pub camera_name: &'a str,
    /// Recording root; the camera directory is created beneath it.
    pub recording_root: &'a Path,
    /// Encoder family of the held resource class.
    pub encoder: EncoderFamily,
    /// Segment length.
    pub segment_time: Duration,
    /// Segment file extension; also selects the muxer.
    pub extension: &'a str,
    /// Gateway URL the live output is published to; `None` records only.
    pub live_publish: Option<&'a str>,
}

impl RecordingCommand<'_> {
    /// Directory receiving this camera's segments.
    pub fn output_dir(&self) -> PathBuf {
        self.recording_root.join(safe_name(self.camera_name))
    }

    /// Builds the command for `program`.
    pub fn build(&self, program: &str) -> CommandSpec {
        let name = safe_name(self.camera_name);
        let output_dir = self.output_dir();
        let ext = self.extension;
        let template = output_dir.join(format!("{name}_%Y%m%d_%H%M%S.{ext}"));

        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "warning"]
            .iter()
            .chain(self.encoder.input_flags())
            .map(|s| s.to_string())
            .collect();
        args.extend(
            ["-rtsp_transport", "tcp", "-i"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(self.source_address.to_string());
        args.extend(
            ["-map", "0:v", "-map", "0:a?"]
                .iter()
                .chain(self.encoder.encoder_flags())
                .map(|s| s.to_string()),
        );
        args.extend(
            ["-f", "segment", "-segment_time"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(self.segment_time.as_secs().max(1).to_string());
        args.push("-segment_format".to_string());
        args.push(segment_format(ext).unwrap_or(ext).to_string());
        args.extend(
            ["-strftime", "1", "-reset_timestamps", "1"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(template.to_string_lossy().into_owned());

        if let Some(url) = self.live_publish {
            args.extend(
                ["-map", "0:v", "-map", "0:a?"]
                    .iter()
                    .chain(self.encoder.live_flags())
                    .chain(&["-f", "rtsp", "-rtsp_transport", "tcp"])
                    .map(|s| s.to_string()),
            );
            args.push(url.to_string());
        }

        CommandSpec {
            program: program.to_string(),
            args,
            log_file: Some(output_dir.join(format!("{name}_ffmpeg.log"))),
            output_dir,
        }
    }
}

/// File-system safe form of a camera name (spaces and separators become `_`).
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(encoder: EncoderFamily) -> RecordingCommand<'static> {
        RecordingCommand {
            source_address: "rtsp://10.0.0.5/stream1",
            camera_name: "Front Door",
            recording_root: Path::new("/data/recordings"),
            encoder,
            segment_time: Duration::from_secs(180),
            extension: "mp4",
            live_publish: None,
        }
    }

    fn cmd(encoder: EncoderFamily) -> CommandSpec {
        recording(encoder).build("ffmpeg")
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("Front Door"), "Front_Door");
        assert_eq!(safe_name("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_nvenc_command() {
        let spec = cmd(EncoderFamily::Nvenc);
        assert_eq!(spec.program, "ffmpeg");
        assert!(has_pair(&spec.args, "-hwaccel", "cuda"));
        assert!(has_pair(&spec.args, "-c:v", "hevc_nvenc"));
        assert!(has_pair(&spec.args, "-i", "rtsp://10.0.0.5/stream1"));
        assert!(has_pair(&spec.args, "-segment_time", "180"));
        assert_eq!(
            spec.args.last().map(String::as_str),
            Some("/data/recordings/Front_Door/Front_Door_%Y%m%d_%H%M%S.mp4")
        );
        assert_eq!(spec.output_dir, PathBuf::from("/data/recordings/Front_Door"));
    }

    #[test]
    fn test_vaapi_command() {
        let spec = cmd(EncoderFamily::Vaapi);
        assert!(!spec.args.iter().any(|a| a == "-hwaccel"));
        assert!(has_pair(&spec.args, "-vf", "format=nv12,hwupload"));
        assert!(has_pair(&spec.args, "-c:v", "h264_vaapi"));
    }

    #[test]
    fn test_copy_command() {
        let spec = cmd(EncoderFamily::Copy);
        assert!(has_pair(&spec.args, "-c:v", "copy"));
        assert!(has_pair(&spec.args, "-c:a", "copy"));
    }

    #[test]
    fn test_input_precedes_output_options() {
        let spec = cmd(EncoderFamily::Nvenc);
        let input = spec.args.iter().position(|a| a == "-i").unwrap();
        let codec = spec.args.iter().position(|a| a == "-c:v").unwrap();
        let hwaccel = spec.args.iter().position(|a| a == "-hwaccel").unwrap();
        assert!(hwaccel < input);
        assert!(input < codec);
    }

    #[test]
    fn test_recording_only_has_a_single_output() {
        let spec = cmd(EncoderFamily::Vaapi);
        assert!(has_pair(&spec.args, "-segment_format", "mp4"));
        assert!(!spec.args.iter().any(|a| a == "rtsp"));
        assert_eq!(spec.args.iter().filter(|a| *a == "-map").count(), 2);
    }

    #[test]
    fn test_extension_selects_template_and_muxer() {
        let spec = RecordingCommand {
            extension: "mkv",
            ..recording(EncoderFamily::Copy)
        }
        .build("ffmpeg");
        assert!(has_pair(&spec.args, "-segment_format", "matroska"));
        assert_eq!(
            spec.args.last().map(String::as_str),
            Some("/data/recordings/Front_Door/Front_Door_%Y%m%d_%H%M%S.mkv")
        );
    }

    #[test]
    fn test_live_output_follows_recording_output() {
        let url = live_publish_url("rtsp://gw:8554/live/{camera}/high", "c7");
        assert_eq!(url, "rtsp://gw:8554/live/c7/high");

        let spec = RecordingCommand {
            live_publish: Some(url.as_str()),
            ..recording(EncoderFamily::Nvenc)
        }
        .build("ffmpeg");
        let template = spec.args.iter().position(|a| a.ends_with(".mp4")).unwrap();
        let live = spec.args.iter().position(|a| a == "rtsp").unwrap();
        assert!(template < live);
        assert_eq!(spec.args.last(), Some(&url));
        assert!(has_pair(&spec.args, "-c:v", "h264_nvenc"));
        assert!(has_pair(&spec.args, "-tune", "ll"));
        assert!(has_pair(&spec.args, "-rtsp_transport", "tcp"));
        assert_eq!(spec.args.iter().filter(|a| *a == "-map").count(), 4);
    }

    #[test]
    fn test_vaapi_live_output_scales_on_gpu() {
        let spec = RecordingCommand {
            live_publish: Some("rtsp://gw:8554/live/c1/high"),
            ..recording(EncoderFamily::Vaapi)
        }
        .build("ffmpeg");
        assert!(has_pair(&spec.args, "-vf", "format=nv12,hwupload,scale_vaapi=1920:1080"));
        assert!(has_pair(&spec.args, "-f", "rtsp"));
    }
}
