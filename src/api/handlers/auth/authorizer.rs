//! Stateless header check run in front of every protected handler.

use crate::{api::handlers::message, credential::Credential};
use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: Invalid PIN";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header on the request.
    Missing,
    /// Header present but not exactly the credential (or not valid text).
    Invalid,
}

/// Accept iff the header value is exactly the credential.
///
/// # Errors
/// Returns the reason the request must be rejected
pub fn authorize(credential: &Credential, header: Option<&HeaderValue>) -> Result<(), AuthFailure> {
    let header = header.ok_or(AuthFailure::Missing)?;
    let candidate = header.to_str().map_err(|_| AuthFailure::Invalid)?;

    if credential.is_valid(candidate) {
        Ok(())
    } else {
        Err(AuthFailure::Invalid)
    }
}

/// Middleware: short-circuits with `401 {"message": "Unauthorized: Invalid PIN"}`
/// so the wrapped handler never runs for a bad or missing PIN.
pub async fn require_pin(
    Extension(credential): Extension<Arc<Credential>>,
    request: Request,
    next: Next,
) -> Response {
    match authorize(&credential, request.headers().get(AUTHORIZATION)) {
        Ok(()) => next.run(request).await,
        Err(failure) => {
            warn!(
                reason = ?failure,
                path = request.uri().path(),
                "Rejected request"
            );
            message(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::Request as HttpRequest,
        middleware,
        routing::get,
        Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn credential() -> Credential {
        Credential::from("4079")
    }

    #[test]
    fn authorize_accepts_exact_header() {
        let header = HeaderValue::from_static("4079");
        assert_eq!(authorize(&credential(), Some(&header)), Ok(()));
    }

    #[test]
    fn authorize_rejects_wrong_or_missing_header() {
        let wrong = HeaderValue::from_static("0000");
        assert_eq!(
            authorize(&credential(), Some(&wrong)),
            Err(AuthFailure::Invalid)
        );
        assert_eq!(authorize(&credential(), None), Err(AuthFailure::Missing));
    }

    #[test]
    fn authorize_does_not_trim_or_strip_schemes() {
        for value in ["Bearer 4079", "4079 ", " 4079", "40790"] {
            let header = HeaderValue::from_str(value).ok();
            assert_eq!(
                authorize(&credential(), header.as_ref()),
                Err(AuthFailure::Invalid),
                "{value:?} must be rejected"
            );
        }
    }

    #[test]
    fn authorize_rejects_non_text_header() -> Result<()> {
        let header = HeaderValue::from_bytes(&[0x34, 0x30, 0xff, 0x39])?;
        assert_eq!(
            authorize(&credential(), Some(&header)),
            Err(AuthFailure::Invalid)
        );
        Ok(())
    }

    fn app(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/protected",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "ok"
                    }
                }),
            )
            .route_layer(middleware::from_fn(require_pin))
            .layer(Extension(Arc::new(credential())))
    }

    async fn call(app: Router, pin: Option<&str>) -> Result<(StatusCode, serde_json::Value)> {
        let mut builder = HttpRequest::builder().uri("/protected");
        if let Some(pin) = pin {
            builder = builder.header(AUTHORIZATION, pin);
        }
        let response = app.oneshot(builder.body(Body::empty())?).await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        Ok((status, json))
    }

    #[tokio::test]
    async fn middleware_passes_valid_pin_through() -> Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let (status, _) = call(app(hits.clone()), Some("4079")).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn middleware_short_circuits_wrong_and_missing_pin() -> Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));

        for pin in [Some("0000"), None] {
            let (status, body) = call(app(hits.clone()), pin).await?;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, serde_json::json!({ "message": UNAUTHORIZED_MESSAGE }));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        Ok(())
    }
}
