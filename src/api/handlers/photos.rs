use super::{parse_id, ApiError, ErrorMessage};
use crate::api::{
    storage::{NewPhoto, Photo, Storage},
    uploads::{UploadError, UploadStore},
};
use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring to look for.
    pub search: Option<String>,
}

/// Multipart form accepted by `POST /api/photos`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadPhotoForm {
    #[schema(value_type = String, format = Binary)]
    photo: Vec<u8>,
    caption: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/photos",
    params(SearchQuery),
    responses (
        (status = 200, description = "Photos, newest first", body = [Photo]),
        (status = 401, description = "Missing or invalid PIN", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "photos"
)]
#[instrument(skip(storage))]
pub async fn list_photos(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Photo>>, ApiError> {
    let photos = match query.search.as_deref() {
        Some(search) if !search.is_empty() => storage.search_photos(search).await,
        _ => storage.get_photos().await,
    }
    .map_err(ApiError::storage("Failed to fetch photos"))?;

    Ok(Json(photos))
}

#[utoipa::path(
    get,
    path = "/api/photos/{id}",
    params(("id" = String, Path, description = "Photo id")),
    responses (
        (status = 200, description = "Photo", body = Photo),
        (status = 404, description = "Photo not found", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "photos"
)]
#[instrument(skip(storage))]
pub async fn get_photo(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Path(id): Path<String>,
) -> Result<Json<Photo>, ApiError> {
    let Some(id) = parse_id(&id) else {
        return Err(ApiError::NotFound("Photo not found"));
    };

    storage
        .get_photo(id)
        .await
        .map_err(ApiError::storage("Failed to fetch photo"))?
        .map(Json)
        .ok_or(ApiError::NotFound("Photo not found"))
}

#[utoipa::path(
    post,
    path = "/api/photos",
    request_body(content = UploadPhotoForm, content_type = "multipart/form-data"),
    responses (
        (status = 201, description = "Photo stored", body = Photo),
        (status = 400, description = "No file, or not an image", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "photos"
)]
#[instrument(skip_all)]
pub async fn upload_photo(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Extension(uploads): Extension<Arc<UploadStore>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::BadRequest("No file uploaded"));
    };

    let mut file = None;
    let mut caption = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                debug!("Malformed multipart body: {err}");
                return Err(ApiError::BadRequest("No file uploaded"));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("photo") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    debug!("Failed to read photo field: {err}");
                    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiError::Upload(UploadError::TooLarge)
                    } else {
                        ApiError::BadRequest("No file uploaded")
                    }
                })?;
                file = Some((original_name, content_type, bytes));
            }
            Some("caption") => {
                caption = field.text().await.ok().filter(|text| !text.is_empty());
            }
            _ => {}
        }
    }

    let Some((original_name, content_type, bytes)) = file else {
        return Err(ApiError::BadRequest("No file uploaded"));
    };

    let filename = uploads
        .save(&original_name, content_type.as_deref(), &bytes)
        .await
        .map_err(ApiError::Upload)?;

    let photo = storage
        .create_photo(NewPhoto {
            filename: filename.clone(),
            caption,
        })
        .await;

    match photo {
        Ok(photo) => Ok((StatusCode::CREATED, Json(photo))),
        Err(err) => {
            // keep the uploads directory in step with the table
            if let Err(cleanup) = uploads.remove(&filename).await {
                error!("Failed to remove orphaned upload {filename}: {cleanup}");
            }
            Err(ApiError::storage("Failed to upload photo")(err))
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/photos/{id}",
    params(("id" = String, Path, description = "Photo id")),
    responses (
        (status = 204, description = "Photo removed (or never existed)"),
    ),
    security(("pin" = [])),
    tag = "photos"
)]
#[instrument(skip(storage, uploads))]
pub async fn delete_photo(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Extension(uploads): Extension<Arc<UploadStore>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let Some(id) = parse_id(&id) else {
        return Ok(StatusCode::NO_CONTENT);
    };

    let removed = storage
        .delete_photo(id)
        .await
        .map_err(ApiError::storage("Failed to delete photo"))?;

    if let Some(photo) = removed {
        if let Err(err) = uploads.remove(&photo.filename).await {
            error!("Failed to remove file {}: {err}", photo.filename);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
