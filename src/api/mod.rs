use crate::credential::Credential;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use handlers::{auth, health, notes, photos};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use storage::{NewUser, PgStorage, Storage, DEFAULT_USERNAME};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use uploads::{UploadStore, MAX_UPLOAD_BYTES};
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
pub mod storage;
pub mod uploads;

mod openapi;
pub use openapi::openapi;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

// Room for the multipart framing around a maximum-size image.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Build the application router.
///
/// Everything under `/api/photos` and `/api/notes` requires the PIN in the
/// `Authorization` header. Stored files under `/api/uploads` are served
/// without it.
pub fn router(
    credential: Arc<Credential>,
    storage: Arc<dyn Storage>,
    uploads: Arc<UploadStore>,
) -> Router {
    let protected = Router::new()
        .route(
            "/api/photos",
            get(photos::list_photos).post(photos::upload_photo),
        )
        .route(
            "/api/photos/:id",
            get(photos::get_photo).delete(photos::delete_photo),
        )
        .route("/api/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/api/notes/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route_layer(middleware::from_fn(auth::require_pin))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/api/auth/verify", post(auth::verify::verify_pin))
        .merge(protected)
        .nest_service("/api/uploads", ServeDir::new(uploads.dir()))
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(credential))
                .layer(Extension(storage))
                .layer(Extension(uploads)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, credential: Credential, uploads_dir: PathBuf) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let storage = PgStorage::new(pool);
    storage
        .ensure_schema(&NewUser {
            username: DEFAULT_USERNAME.to_string(),
            password: credential.secret().expose_secret().to_string(),
        })
        .await
        .context("Failed to prepare database schema")?;

    let uploads = UploadStore::open(&uploads_dir)
        .await
        .with_context(|| format!("Failed to open uploads dir {}", uploads_dir.display()))?;

    let app = router(Arc::new(credential), Arc::new(storage), Arc::new(uploads));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
