use crate::config::Config;
use crate::handlers::UPLOAD_PREFIX;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub deleted: usize,
    pub bytes_freed: u64,
}

/// Remove upload scratch files older than `max_age` from the temp dir.
///
/// Requests remove their own scratch files; anything matching the upload
/// prefix that is still around after `max_age` was left by a crash.
pub async fn cleanup_stale_uploads(
    temp_dir: &Path,
    max_age: Duration,
) -> anyhow::Result<CleanupStats> {
    let now = SystemTime::now();
    let mut stats = CleanupStats::default();

    if !temp_dir.exists() {
        return Ok(stats);
    }

    let mut entries = fs::read_dir(temp_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(UPLOAD_PREFIX) {
            continue;
        }
        let path = entry.path();

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!("[cleanup] Failed to get metadata for {:?}: {}", path, e);
                continue;
            }
        };

        let age = match metadata.modified().map(|m| now.duration_since(m)) {
            Ok(Ok(age)) => age,
            // Unsupported mtime or a timestamp in the future
            _ => continue,
        };

        if age >= max_age {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    stats.deleted += 1;
                    stats.bytes_freed += metadata.len();
                    info!(
                        "[cleanup] Deleted stale upload: {:?} (age: {:.1} min, size: {:.2} MB)",
                        path,
                        age.as_secs_f64() / 60.0,
                        metadata.len() as f64 / 1024.0 / 1024.0
                    );
                }
                Err(e) => {
                    error!("[cleanup] Failed to delete {:?}: {}", path, e);
                }
            }
        }
    }

    Ok(stats)
}

/// Start a background task that periodically sweeps the temp dir
pub fn start_cleanup_task(config: Arc<Config>) -> tokio::task::JoinHandle<()> {
    let max_age = Duration::from_secs(config.limits.cleanup_max_age_seconds);
    let cleanup_interval = Duration::from_secs(config.limits.cleanup_interval_seconds.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "[cleanup] 🧹 Starting periodic cleanup task (interval: {:.1} min, max age: {:.1} min)",
            cleanup_interval.as_secs_f64() / 60.0,
            max_age.as_secs_f64() / 60.0
        );

        loop {
            interval.tick().await;

            match cleanup_stale_uploads(&config.temp_dir, max_age).await {
                Ok(stats) if stats.deleted > 0 => info!(
                    "[cleanup] ✅ Cleanup complete: {} files deleted, {:.2} MB freed",
                    stats.deleted,
                    stats.bytes_freed as f64 / 1024.0 / 1024.0
                ),
                Ok(_) => {}
                Err(e) => error!("[cleanup] Periodic cleanup error: {}", e),
            }
        }
    })
}
