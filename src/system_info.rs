use crate::config::Config;
use crate::ffmpeg;
use serde::Serialize;
use std::time::Duration;
use sysinfo::System;
use tracing::warn;

#[derive(Serialize, Debug)]
pub struct SystemInfo {
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub cpus: usize,
    pub cpu_model: String,
    pub memory_total_gb: f64,
    pub memory_free_gb: f64,
    pub ffmpeg: String,
    pub ffprobe: String,
}

/// Upper bound on `-version` at startup.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

async fn describe_tool(binary: &str) -> String {
    match ffmpeg::tool_version(binary, VERSION_CHECK_TIMEOUT).await {
        Ok(version) => version,
        Err(e) => {
            warn!("⚠️  {} is not usable, uploads will fail: {}", binary, e);
            "not available".to_string()
        }
    }
}

pub async fn get_system_info(config: &Config) -> SystemInfo {
    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let memory_total = system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0;
    let memory_free = system.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0;

    let cpu_model = system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpus: system.cpus().len(),
        cpu_model,
        memory_total_gb: memory_total,
        memory_free_gb: memory_free,
        ffmpeg: describe_tool(&config.ffmpeg.ffmpeg_path).await,
        ffprobe: describe_tool(&config.ffmpeg.ffprobe_path).await,
    }
}

pub fn print_startup_info(config: &Config, sys_info: &SystemInfo) {
    println!("{}", "=".repeat(60));
    println!("🚀 Tubely v{} starting...", sys_info.version);
    println!("{}", "=".repeat(60));
    println!("📊 System Information:");
    println!("  Platform: {} ({})", sys_info.platform, sys_info.arch);
    println!("  CPUs: {} ({})", sys_info.cpus, sys_info.cpu_model);
    println!(
        "  Memory: {:.2} GB total, {:.2} GB available",
        sys_info.memory_total_gb, sys_info.memory_free_gb
    );
    println!("  FFmpeg: {}", sys_info.ffmpeg);
    println!("  FFprobe: {}", sys_info.ffprobe);
    println!("  Assets Dir: {:?}", config.assets_root);
    println!("  Temp Dir: {:?}", config.temp_dir);
    println!(
        "  Bucket: {} (served from https://{})",
        config.s3_bucket, config.s3_cf_distribution
    );
    println!(
        "  Limits: thumbnail {} MB, video {} MB",
        config.limits.max_thumbnail_size / 1024 / 1024,
        config.limits.max_video_size / 1024 / 1024
    );
    println!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FfmpegConfig;

    #[tokio::test]
    async fn missing_tools_are_reported_not_fatal() {
        let config = Config {
            ffmpeg: FfmpegConfig {
                ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
                ffprobe_path: "/nonexistent/ffprobe".to_string(),
                timeout_secs: 1,
            },
            ..Config::default()
        };

        let info = get_system_info(&config).await;
        assert_eq!(info.ffmpeg, "not available");
        assert_eq!(info.ffprobe, "not available");
        assert_eq!(info.platform, std::env::consts::OS);
    }
}
