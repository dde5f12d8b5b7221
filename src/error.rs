use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::{ErrorResponse, MISSING_IMAGE_MESSAGE, UPLOAD_FAILED_MESSAGE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Failures while handling `POST /api/upload`.
///
/// Everything except `MissingImage` is a receiver fault and is reported to
/// the caller as an opaque 500.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("multipart stream error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected file field {0:?}")]
    UnexpectedField(String),
    #[error("could not allocate a unique file name")]
    NameExhausted,
    #[error("request carried no image field")]
    MissingImage,
}

impl ReceiveError {
    pub fn status(&self) -> StatusCode {
        match self {
            ReceiveError::MissingImage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ReceiveError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ReceiveError::MissingImage => ErrorResponse::new(MISSING_IMAGE_MESSAGE),
            other => {
                error!(error = %other, "Error uploading file");
                ErrorResponse::new(UPLOAD_FAILED_MESSAGE)
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_image_is_a_client_error() {
        assert_eq!(ReceiveError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ReceiveError::UnexpectedField("avatar".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "uploads/");
        assert_eq!(
            ReceiveError::from(io).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
