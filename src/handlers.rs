use crate::{
    auth,
    config::Config,
    error::ApiError,
    ffmpeg, keys,
    models::{AppState, CreateVideoRequest, Video},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::Json,
};
use multer::{Constraints, Field, Multipart, SizeLimit};
use std::{sync::Arc, time::Instant};
use tempfile::TempPath;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

/// Name prefix of every scratch file an upload creates in the temp dir.
pub const UPLOAD_PREFIX: &str = "tubely-upload";

/// Room for multipart headers and small form fields around the thumbnail.
const THUMBNAIL_FORM_OVERHEAD: u64 = 1024 * 1024;

const THUMBNAIL_FIELD: &str = "thumbnail";
const VIDEO_FIELD: &str = "video";

fn parse_video_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid ID".to_string()))
}

fn authenticate(headers: &HeaderMap, config: &Config) -> Result<Uuid, ApiError> {
    let token = auth::get_bearer_token(headers)?;
    Ok(auth::validate_jwt(token, &config.jwt_secret)?)
}

/// Make sure the video exists and `user_id` owns it.
async fn check_owner(state: &AppState, video_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    let video = state
        .videos
        .get_video(video_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Couldn't get video".to_string()))?;

    if video.user_id != user_id {
        return Err(ApiError::Unauthorized(
            "You can't update this video".to_string(),
        ));
    }
    Ok(())
}

fn multipart_error(err: multer::Error) -> ApiError {
    match err {
        multer::Error::StreamSizeExceeded { limit } => {
            ApiError::PayloadTooLarge(format!("Request body exceeds {} bytes", limit))
        }
        multer::Error::FieldSizeExceeded { limit, .. } => {
            ApiError::PayloadTooLarge(format!("File exceeds {} bytes", limit))
        }
        other => ApiError::BadRequest(format!("Error parsing multipart request: {}", other)),
    }
}

fn multipart_reader(
    headers: &HeaderMap,
    body: Body,
    constraints: Constraints,
) -> Result<Multipart<'static>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Content-Type header".to_string()))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart request: {}", e)))?;

    Ok(Multipart::with_constraints(
        body.into_data_stream(),
        boundary,
        constraints,
    ))
}

/// Advance to the field called `name`, draining everything before it.
async fn find_field(
    multipart: &mut Multipart<'static>,
    name: &str,
) -> Result<Field<'static>, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(name) {
            return Ok(field);
        }
        while field.chunk().await.map_err(multipart_error)?.is_some() {
            // Drain the field
        }
    }
    Err(ApiError::BadRequest(format!("Couldn't retrieve {}", name)))
}

/// Declared media type of a field, parameters stripped.
fn declared_media_type(field: &Field<'_>) -> Result<String, ApiError> {
    field
        .content_type()
        .map(|mime| mime.essence_str().to_string())
        .ok_or_else(|| ApiError::BadRequest("Invalid content type".to_string()))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Create an empty video record owned by the caller
pub async fn create_video_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<Video>), ApiError> {
    let user_id = authenticate(&headers, &state.config)?;

    let video = state
        .videos
        .create_video(Video::new(user_id, request.title, request.description))
        .await?;

    info!("[POST /api/videos] ✅ Created video {} for user {}", video.id, user_id);
    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn get_video_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    let video = state
        .videos
        .get_video(video_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Couldn't get video".to_string()))?;
    Ok(Json(video))
}

/// Upload a PNG or JPEG thumbnail and link it from the video record
pub async fn thumbnail_upload_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;

    let max_size = state.config.limits.max_thumbnail_size;
    let constraints = Constraints::new().size_limit(
        SizeLimit::new()
            .per_field(max_size)
            .whole_stream(max_size.saturating_add(THUMBNAIL_FORM_OVERHEAD)),
    );
    let mut multipart = multipart_reader(&headers, body, constraints)?;
    let field = find_field(&mut multipart, THUMBNAIL_FIELD).await?;

    let media_type = declared_media_type(&field)?;
    let ext = match media_type.as_str() {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        other => {
            return Err(ApiError::UnsupportedMediaType(format!(
                "Unsupported thumbnail type: {}",
                other
            )))
        }
    };
    let data = field.bytes().await.map_err(multipart_error)?;

    let user_id = authenticate(&headers, &state.config)?;
    check_owner(&state, video_id, user_id).await?;

    let file_name = format!("{}{}", keys::random_key()?, ext);
    let file_path = state.config.assets_root.join(&file_name);
    tokio::fs::write(&file_path, &data)
        .await
        .map_err(ApiError::io("write thumbnail to disk"))?;

    let thumbnail_url = state.config.thumbnail_url(&file_name);
    let updated = match state.videos.set_thumbnail_url(video_id, thumbnail_url).await {
        Ok(video) => video,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&file_path).await {
                warn!(
                    "[POST /api/thumbnail_upload] Failed to remove orphaned {:?}: {}",
                    file_path, rm
                );
            }
            return Err(e.into());
        }
    };

    info!(
        "[POST /api/thumbnail_upload] ✅ {} ({} bytes) for video {} by user {}",
        file_name,
        data.len(),
        video_id,
        user_id
    );
    Ok(Json(updated))
}

/// Upload an MP4, remux it for fast start and push it to object storage
pub async fn video_upload_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Video>, ApiError> {
    let start_time = Instant::now();
    let max_size = state.config.limits.max_video_size;

    let length = declared_length(&headers).ok_or_else(|| {
        ApiError::LengthRequired("Content-Length is required for video uploads".to_string())
    })?;
    if length > max_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "File too big. Maximum upload size is {}MB",
            max_size / 1024 / 1024
        )));
    }

    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(max_size));
    let mut multipart = multipart_reader(&headers, body, constraints)?;
    let mut field = find_field(&mut multipart, VIDEO_FIELD).await?;

    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(&headers, &state.config)?;
    check_owner(&state, video_id, user_id).await?;

    let media_type = declared_media_type(&field)?;
    if media_type != "video/mp4" {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Unsupported video type: {}",
            media_type
        )));
    }

    // Both scratch files are removed when these guards drop, on every path.
    let upload = tempfile::Builder::new()
        .prefix(UPLOAD_PREFIX)
        .suffix(".mp4")
        .tempfile_in(&state.config.temp_dir)
        .map_err(ApiError::io("create temp file"))?;
    let _processed = TempPath::from_path(ffmpeg::fast_start_output_path(upload.path()));

    let handle = upload
        .as_file()
        .try_clone()
        .map_err(ApiError::io("open temp file"))?;
    let mut file = tokio::fs::File::from_std(handle);
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk)
            .await
            .map_err(ApiError::io("write to temp file"))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(ApiError::io("write to temp file"))?;
    file.rewind().await.map_err(ApiError::io("seek in temp file"))?;

    info!(
        "[POST /api/video_upload] 📦 Received {:.2} MB for video {}",
        written as f64 / 1024.0 / 1024.0,
        video_id
    );

    let name = keys::random_key()?;
    let aspect = state.media.probe_aspect_ratio(upload.path()).await?;
    let key = format!("{}{}.mp4", aspect.storage_prefix(), name);

    let processed_path = state.media.process_for_fast_start(upload.path()).await?;
    state
        .storage
        .put_object(&key, &processed_path, "video/mp4")
        .await?;

    let video_url = state.config.video_url(&key);
    let updated = match state.videos.set_video_url(video_id, video_url).await {
        Ok(video) => video,
        Err(e) => {
            if let Err(del) = state.storage.delete_object(&key).await {
                warn!(
                    "[POST /api/video_upload] Failed to remove orphaned object {}: {}",
                    key, del
                );
            }
            return Err(e.into());
        }
    };

    info!(
        "[POST /api/video_upload] ✅ {} ({}) for video {} in {:.2}s",
        key,
        aspect.as_str(),
        video_id,
        start_time.elapsed().as_secs_f64()
    );
    Ok(Json(updated))
}
