use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub assets_root: Option<String>,
    pub temp_dir: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub cf_distribution: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FfmpegConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Per-invocation timeout in seconds, applied to both probe and remux.
    pub timeout_secs: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_thumbnail_size: u64,
    pub max_video_size: u64,
    pub cleanup_interval_seconds: u64,
    pub cleanup_max_age_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_thumbnail_size: 10 * MIB,
            max_video_size: 1024 * MIB,
            cleanup_interval_seconds: 15 * 60,
            cleanup_max_age_seconds: 60 * 60,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub s3: S3Config,
    pub ffmpeg: Option<FfmpegConfig>,
    pub limits: Option<LimitsConfig>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub public_host: String,
    pub assets_root: PathBuf,
    pub temp_dir: PathBuf,
    pub jwt_secret: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_cf_distribution: String,
    pub ffmpeg: FfmpegConfig,
    pub limits: LimitsConfig,
}

fn env_or(name: &str, fallback: Option<String>) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty()).or(fallback)
}

fn resolve_dir(base_dir: &Path, dir: String) -> PathBuf {
    let path = PathBuf::from(dir);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        // Try to load config file
        let config_path = base_dir.join("config.toml");
        let config_file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str::<ConfigFile>(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            ConfigFile::default()
        };
        let ConfigFile {
            server,
            s3,
            ffmpeg,
            limits,
        } = config_file;

        // Env vars override the config file
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .or(server.port)
            .unwrap_or(8091);

        let public_host =
            env_or("PUBLIC_HOST", server.public_host).unwrap_or_else(|| "localhost".to_string());

        let assets_root = resolve_dir(
            &base_dir,
            env_or("ASSETS_ROOT", server.assets_root).unwrap_or_else(|| "assets".to_string()),
        );

        let temp_dir = env_or("TEMP_DIR", server.temp_dir)
            .map(|dir| resolve_dir(&base_dir, dir))
            .unwrap_or_else(std::env::temp_dir);

        let jwt_secret = env_or("JWT_SECRET", None).context("JWT_SECRET must be set")?;

        let s3_bucket = env_or("S3_BUCKET", s3.bucket).context("S3_BUCKET must be set")?;
        let s3_region = env_or("S3_REGION", s3.region).unwrap_or_else(|| "us-east-1".to_string());
        let s3_endpoint = env_or("S3_ENDPOINT", s3.endpoint);
        let s3_cf_distribution = env_or("S3_CF_DISTRIBUTION", s3.cf_distribution)
            .context("S3_CF_DISTRIBUTION must be set")?;

        let mut ffmpeg = ffmpeg.unwrap_or_default();
        if let Some(path) = env_or("FFMPEG_PATH", None) {
            ffmpeg.ffmpeg_path = path;
        }
        if let Some(path) = env_or("FFPROBE_PATH", None) {
            ffmpeg.ffprobe_path = path;
        }
        if let Some(secs) = std::env::var("TOOL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            ffmpeg.timeout_secs = secs;
        }

        let mut limits = limits.unwrap_or_default();
        if let Some(size) = std::env::var("MAX_THUMBNAIL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            limits.max_thumbnail_size = size;
        }
        if let Some(size) = std::env::var("MAX_VIDEO_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            limits.max_video_size = size;
        }

        Ok(Self {
            port,
            public_host,
            assets_root,
            temp_dir,
            jwt_secret,
            s3_bucket,
            s3_region,
            s3_endpoint,
            s3_cf_distribution,
            ffmpeg,
            limits,
        })
    }

    /// Public URL under which a thumbnail written to `assets_root` is served.
    pub fn thumbnail_url(&self, file_name: &str) -> String {
        format!(
            "http://{}:{}/assets/{}",
            self.public_host, self.port, file_name
        )
    }

    pub fn video_url(&self, key: &str) -> String {
        format!("https://{}/{}", self.s3_cf_distribution, key)
    }
}

impl Default for Config {
    fn default() -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            port: 8091,
            public_host: "localhost".to_string(),
            assets_root: base_dir.join("assets"),
            temp_dir: std::env::temp_dir(),
            jwt_secret: String::new(),
            s3_bucket: String::new(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_cf_distribution: String::new(),
            ffmpeg: FfmpegConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_sections_are_optional() {
        let parsed: ConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000
            assets_root = "/srv/assets"

            [limits]
            max_thumbnail_size = 1024
            max_video_size = 2048
            cleanup_interval_seconds = 60
            cleanup_max_age_seconds = 120
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, Some(9000));
        assert_eq!(parsed.server.assets_root.as_deref(), Some("/srv/assets"));
        assert!(parsed.s3.bucket.is_none());
        assert!(parsed.ffmpeg.is_none());
        assert_eq!(parsed.limits.unwrap().max_video_size, 2048);
    }

    #[test]
    fn default_limits_match_upload_caps() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.max_thumbnail_size, 10 << 20);
        assert_eq!(limits.max_video_size, 1 << 30);
    }

    #[test]
    fn public_urls() {
        let config = Config {
            port: 8091,
            s3_cf_distribution: "d111.cloudfront.net".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.thumbnail_url("abc.png"),
            "http://localhost:8091/assets/abc.png"
        );
        assert_eq!(
            config.video_url("landscape/abc.mp4"),
            "https://d111.cloudfront.net/landscape/abc.mp4"
        );
    }

    #[test]
    fn relative_dirs_resolve_against_base() {
        let base = PathBuf::from("/srv/tubely");
        assert_eq!(
            resolve_dir(&base, "assets".to_string()),
            PathBuf::from("/srv/tubely/assets")
        );
        assert_eq!(
            resolve_dir(&base, "/var/assets".to_string()),
            PathBuf::from("/var/assets")
        );
    }
}
