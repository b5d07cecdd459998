use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Video;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("video {0} does not exist")]
    Missing(Uuid),
    #[error("video {0} already exists")]
    Duplicate(Uuid),
}

/// Video record persistence.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create_video(&self, video: Video) -> Result<Video, StoreError>;

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    /// Set only the thumbnail URL and return the record as stored.
    async fn set_thumbnail_url(&self, id: Uuid, url: String) -> Result<Video, StoreError>;

    /// Set only the video URL and return the record as stored.
    async fn set_video_url(&self, id: Uuid, url: String) -> Result<Video, StoreError>;
}

/// Process-local record store.
#[derive(Default)]
pub struct MemoryVideoStore {
    videos: RwLock<HashMap<Uuid, Video>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `change` to the stored record while holding the write lock.
    async fn modify(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut Video),
    ) -> Result<Video, StoreError> {
        let mut videos = self.videos.write().await;
        let stored = videos.get_mut(&id).ok_or(StoreError::Missing(id))?;
        change(stored);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create_video(&self, video: Video) -> Result<Video, StoreError> {
        let mut videos = self.videos.write().await;
        if videos.contains_key(&video.id) {
            return Err(StoreError::Duplicate(video.id));
        }
        videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn set_thumbnail_url(&self, id: Uuid, url: String) -> Result<Video, StoreError> {
        self.modify(id, |video| video.thumbnail_url = Some(url)).await
    }

    async fn set_video_url(&self, id: Uuid, url: String) -> Result<Video, StoreError> {
        self.modify(id, |video| video.video_url = Some(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_is_visible_to_the_next_read() {
        let store = MemoryVideoStore::new();
        let video = store
            .create_video(Video::new(Uuid::new_v4(), "Boots".into(), String::new()))
            .await
            .unwrap();

        let url = "http://localhost:8091/assets/a.png".to_string();
        let returned = store.set_thumbnail_url(video.id, url.clone()).await.unwrap();

        let fetched = store.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(fetched, returned);
        assert_eq!(fetched.thumbnail_url, Some(url));
        assert!(fetched.updated_at >= video.updated_at);
        assert_eq!(fetched.created_at, video.created_at);
    }

    #[tokio::test]
    async fn url_updates_leave_other_fields_alone() {
        let store = MemoryVideoStore::new();
        let video = store
            .create_video(Video::new(Uuid::new_v4(), "Boots".into(), String::new()))
            .await
            .unwrap();

        let thumb = "http://localhost:8091/assets/t.png".to_string();
        let clip = "https://d111.cloudfront.net/landscape/k.mp4".to_string();
        store.set_thumbnail_url(video.id, thumb.clone()).await.unwrap();
        let stored = store.set_video_url(video.id, clip.clone()).await.unwrap();

        assert_eq!(stored.thumbnail_url, Some(thumb));
        assert_eq!(stored.video_url, Some(clip));
        assert_eq!(stored.title, video.title);
        assert_eq!(stored.user_id, video.user_id);
    }

    #[tokio::test]
    async fn unknown_ids() {
        let store = MemoryVideoStore::new();
        assert!(store.get_video(Uuid::new_v4()).await.unwrap().is_none());

        assert!(matches!(
            store.set_video_url(Uuid::new_v4(), "https://d/x.mp4".into()).await,
            Err(StoreError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = MemoryVideoStore::new();
        let video = Video::new(Uuid::new_v4(), "once".into(), String::new());
        store.create_video(video.clone()).await.unwrap();
        assert!(matches!(
            store.create_video(video).await,
            Err(StoreError::Duplicate(_))
        ));
    }
}
