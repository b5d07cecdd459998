use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers::{
    create_video_handler, get_video_handler, thumbnail_upload_handler, video_upload_handler,
};
use crate::models::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.config.assets_root);

    Router::new()
        .route("/api/videos", post(create_video_handler))
        .route("/api/videos/:video_id", get(get_video_handler))
        .route(
            "/api/thumbnail_upload/:video_id",
            post(thumbnail_upload_handler),
        )
        // Size caps for uploads are enforced by the handlers themselves.
        .route(
            "/api/video_upload/:video_id",
            post(video_upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .nest_service("/assets", assets)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
