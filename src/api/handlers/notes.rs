use super::{parse_id, photos::SearchQuery, ApiError, ErrorMessage};
use crate::api::storage::{NewNote, Note, NotePatch, Storage};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    get,
    path = "/api/notes",
    params(SearchQuery),
    responses (
        (status = 200, description = "Notes, newest first", body = [Note]),
        (status = 401, description = "Missing or invalid PIN", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "notes"
)]
#[instrument(skip(storage))]
pub async fn list_notes(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = match query.search.as_deref() {
        Some(search) if !search.is_empty() => storage.search_notes(search).await,
        _ => storage.get_notes().await,
    }
    .map_err(ApiError::storage("Failed to fetch notes"))?;

    Ok(Json(notes))
}

#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses (
        (status = 200, description = "Note", body = Note),
        (status = 404, description = "Note not found", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "notes"
)]
#[instrument(skip(storage))]
pub async fn get_note(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let Some(id) = parse_id(&id) else {
        return Err(ApiError::NotFound("Note not found"));
    };

    storage
        .get_note(id)
        .await
        .map_err(ApiError::storage("Failed to fetch note"))?
        .map(Json)
        .ok_or(ApiError::NotFound("Note not found"))
}

#[utoipa::path(
    post,
    path = "/api/notes",
    request_body = NewNote,
    responses (
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Invalid note data", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "notes"
)]
#[instrument(skip_all)]
pub async fn create_note(
    Extension(storage): Extension<Arc<dyn Storage>>,
    payload: Result<Json<NewNote>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(note) = payload.map_err(|rejection| {
        debug!("Rejected note body: {rejection}");
        ApiError::BadRequest("Invalid note data")
    })?;

    let note = storage
        .create_note(note)
        .await
        .map_err(ApiError::storage("Failed to create note"))?;

    Ok((StatusCode::CREATED, Json(note)))
}

#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    request_body = NotePatch,
    responses (
        (status = 200, description = "Note updated", body = Note),
        (status = 400, description = "Invalid note data", body = ErrorMessage),
        (status = 404, description = "Note not found", body = ErrorMessage),
    ),
    security(("pin" = [])),
    tag = "notes"
)]
#[instrument(skip(storage, payload))]
pub async fn update_note(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Path(id): Path<String>,
    payload: Result<Json<NotePatch>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let Json(patch) = payload.map_err(|rejection| {
        debug!("Rejected note patch: {rejection}");
        ApiError::BadRequest("Invalid note data")
    })?;

    let Some(id) = parse_id(&id) else {
        return Err(ApiError::NotFound("Note not found"));
    };

    storage
        .update_note(id, patch)
        .await
        .map_err(ApiError::storage("Failed to update note"))?
        .map(Json)
        .ok_or(ApiError::NotFound("Note not found"))
}

#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses (
        (status = 204, description = "Note removed (or never existed)"),
    ),
    security(("pin" = [])),
    tag = "notes"
)]
#[instrument(skip(storage))]
pub async fn delete_note(
    Extension(storage): Extension<Arc<dyn Storage>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Some(id) = parse_id(&id) {
        storage
            .delete_note(id)
            .await
            .map_err(ApiError::storage("Failed to delete note"))?;
    }

    Ok(StatusCode::NO_CONTENT)
}
