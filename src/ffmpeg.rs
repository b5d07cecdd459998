use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::FfmpegConfig;

/// Absolute tolerance applied to the width/height ratio.
const ASPECT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Other => "other",
        }
    }

    pub fn storage_prefix(self) -> &'static str {
        match self {
            Self::Landscape => "landscape/",
            Self::Portrait => "portrait/",
            Self::Other => "other/",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("ffprobe failed: {0}")]
    Failed(String),
    #[error("ffprobe timed out after {0:?}")]
    TimedOut(Duration),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum RemuxError {
    #[error("ffmpeg failed: {0}")]
    Failed(String),
    #[error("ffmpeg timed out after {0:?}")]
    TimedOut(Duration),
}

/// Classify a frame size as 16:9, 9:16 or anything else.
pub fn classify_aspect_ratio(width: u32, height: u32) -> Result<AspectRatio, ProbeError> {
    if width == 0 || height == 0 {
        return Err(ProbeError::InvalidDimensions { width, height });
    }

    let ratio = f64::from(width) / f64::from(height);
    if (ratio - 16.0 / 9.0).abs() < ASPECT_TOLERANCE {
        Ok(AspectRatio::Landscape)
    } else if (ratio - 9.0 / 16.0).abs() < ASPECT_TOLERANCE {
        Ok(AspectRatio::Portrait)
    } else {
        Ok(AspectRatio::Other)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Parse `ffprobe -print_format json -show_streams` output and classify the
/// first video stream.
pub fn aspect_ratio_from_probe(stdout: &[u8]) -> Result<AspectRatio, ProbeError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::Failed(format!("unreadable output: {}", e)))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or(ProbeError::NoVideoStream)?;

    classify_aspect_ratio(stream.width, stream.height)
}

/// Sibling path the fast-start remux writes to.
pub fn fast_start_output_path(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(".processing");
    PathBuf::from(path)
}

/// External media tooling used by the upload pipeline.
#[async_trait]
pub trait MediaTools: Send + Sync {
    async fn probe_aspect_ratio(&self, path: &Path) -> Result<AspectRatio, ProbeError>;

    /// Remux `path` with the index moved to the front into
    /// [`fast_start_output_path`] and return that path. The caller owns (and
    /// removes) both files.
    async fn process_for_fast_start(&self, path: &Path) -> Result<PathBuf, RemuxError>;
}

pub struct FfmpegTools {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
}

impl FfmpegTools {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Run a command to completion, killing it if it outlives `timeout`.
/// `None` means the deadline passed.
async fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Option<std::io::Result<Output>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tokio::time::timeout(timeout, command.output()).await.ok()
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe_aspect_ratio(&self, path: &Path) -> Result<AspectRatio, ProbeError> {
        let mut command = Command::new(&self.ffprobe_path);
        command
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path);

        let output = run_with_timeout(command, self.timeout)
            .await
            .ok_or(ProbeError::TimedOut(self.timeout))?
            .map_err(|e| ProbeError::Failed(format!("failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Failed(stderr.trim().to_string()));
        }

        let aspect = aspect_ratio_from_probe(&output.stdout)?;
        debug!(path = %path.display(), aspect = aspect.as_str(), "probed video");
        Ok(aspect)
    }

    async fn process_for_fast_start(&self, path: &Path) -> Result<PathBuf, RemuxError> {
        let output_path = fast_start_output_path(path);

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .arg("-y")
            .arg("-i")
            .arg(path)
            .arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg("faststart")
            .arg("-f")
            .arg("mp4")
            .arg(&output_path);

        let output = run_with_timeout(command, self.timeout)
            .await
            .ok_or(RemuxError::TimedOut(self.timeout))?
            .map_err(|e| RemuxError::Failed(format!("failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemuxError::Failed(stderr.trim().to_string()));
        }

        Ok(output_path)
    }
}

/// First line of `<binary> -version`, used for startup diagnostics.
pub async fn tool_version(binary: &str, timeout: Duration) -> anyhow::Result<String> {
    let mut command = Command::new(binary);
    command.arg("-version");

    let output = run_with_timeout(command, timeout)
        .await
        .ok_or_else(|| anyhow::anyhow!("{} -version timed out after {:?}", binary, timeout))??;

    if !output.status.success() {
        anyhow::bail!("{} not available", binary);
    }

    let version = String::from_utf8_lossy(&output.stdout);
    Ok(version.lines().next().unwrap_or("unknown").to_string())
}
