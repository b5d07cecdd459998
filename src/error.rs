use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::{
    auth::AuthError,
    ffmpeg::{ProbeError, RemuxError},
    keys::KeyError,
    models::ErrorResponse,
    storage::StorageError,
    store::StoreError,
};

/// Every failure a handler can surface. Client errors carry the message that
/// is returned to the caller; internal errors keep their detail for the logs
/// and answer with a generic message and a diagnostic code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    LengthRequired(String),

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Remux(#[from] RemuxError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] StoreError),

    #[error(transparent)]
    RandomSource(#[from] KeyError),
}

impl ApiError {
    pub fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::LengthRequired(_) => StatusCode::LENGTH_REQUIRED,
            Self::Io { .. }
            | Self::Probe(_)
            | Self::Remux(_)
            | Self::Storage(_)
            | Self::Database(_)
            | Self::RandomSource(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::LengthRequired(_) => "LENGTH_REQUIRED",
            Self::Io { .. } => "IO_ERROR",
            Self::Probe(_) => "PROBE_FAILED",
            Self::Remux(_) => "REMUX_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::RandomSource(_) => "RANDOM_SOURCE_UNAVAILABLE",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Io { context, .. } => format!("Couldn't {context}"),
            Self::Probe(_) => "Couldn't get video aspect ratio".to_string(),
            Self::Remux(_) => "Couldn't process video for fast start".to_string(),
            Self::Storage(_) => "Couldn't store media".to_string(),
            Self::Database(_) => "Couldn't update video".to_string(),
            Self::RandomSource(_) => "Couldn't generate asset name".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        } else {
            warn!(code = self.code(), error = %self, "request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.client_message(),
            code: self.code().to_string(),
        });
        (status, body).into_response()
    }
}
