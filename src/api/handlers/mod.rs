//! API handlers and the error mapping they share.
//!
//! Every error body is `{ "message": ... }`. Storage failures are logged with
//! their cause and surfaced as a generic `500`.

pub mod auth;
pub mod health;
pub mod notes;
pub mod photos;

use crate::api::{storage::StorageError, uploads::UploadError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorMessage {
    pub message: String,
}

pub(crate) fn message(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorMessage {
            message: message.to_string(),
        }),
    )
        .into_response()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        source: StorageError,
    },
}

impl ApiError {
    /// Attach the user-facing failure message to a storage error.
    pub(crate) fn storage(context: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| Self::Storage { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(text) => message(StatusCode::BAD_REQUEST, text),
            Self::NotFound(text) => message(StatusCode::NOT_FOUND, text),
            Self::Upload(UploadError::Io(err)) => {
                error!("Failed to store upload: {err}");
                message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to upload photo")
            }
            Self::Upload(err) => message(StatusCode::BAD_REQUEST, &err.to_string()),
            Self::Storage { context, source } => {
                error!("{context}: {source}");
                message(StatusCode::INTERNAL_SERVER_ERROR, context)
            }
        }
    }
}

/// Ids arrive as raw path segments; anything non-numeric simply matches nothing.
pub(crate) fn parse_id(raw: &str) -> Option<i32> {
    raw.parse::<i32>().ok()
}
