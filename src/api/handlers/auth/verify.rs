use super::types::{VerifyRequest, VerifyResponse};
use crate::credential::Credential;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{debug, warn};

#[utoipa::path(
    post,
    path = "/api/auth/verify",
    request_body = VerifyRequest,
    responses (
        (status = 200, description = "PIN accepted", body = VerifyResponse),
        (status = 401, description = "PIN rejected", body = VerifyResponse),
    ),
    tag = "auth"
)]
// Checks a PIN without granting anything; the caller decides what to persist.
pub async fn verify_pin(
    Extension(credential): Extension<Arc<Credential>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let accepted = payload.is_some_and(|Json(request)| credential.is_valid(&request.pin));

    if accepted {
        debug!("PIN verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                message: None,
            }),
        )
    } else {
        warn!("PIN verification failed");
        (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse {
                success: false,
                message: Some("Invalid PIN".to_string()),
            }),
        )
    }
}
