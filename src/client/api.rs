//! Typed calls against the photos and notes API.
//!
//! Generic over [`Dispatch`] so the same code runs with or without the PIN
//! header; the gate decides which client a caller gets.

use super::{http::Dispatch, ClientError};
use crate::api::{
    handlers::ErrorMessage,
    storage::{NewNote, Note, NotePatch, Photo},
};
use reqwest::{
    multipart::{Form, Part},
    Method, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::instrument;

/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

pub struct MemoriesClient<'a, D> {
    dispatch: &'a D,
}

impl<'a, D: Dispatch> MemoriesClient<'a, D> {
    pub fn new(dispatch: &'a D) -> Self {
        Self { dispatch }
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    #[instrument(skip(self))]
    pub async fn photos(&self, search: Option<&str>) -> Result<Vec<Photo>, ClientError> {
        let request = with_search(self.dispatch.request(Method::GET, "/api/photos"), search);
        self.json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    pub async fn photo(&self, id: i32) -> Result<Photo, ClientError> {
        let request = self
            .dispatch
            .request(Method::GET, &format!("/api/photos/{id}"));
        self.json(request).await
    }

    /// Upload an image file with an optional caption.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the server rejects it
    #[instrument(skip(self))]
    pub async fn upload_photo(
        &self,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<Photo, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("photo")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(guess_mime(&file_name))?;

        let mut form = Form::new().part("photo", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let request = self
            .dispatch
            .request(Method::POST, "/api/photos")
            .multipart(form);
        self.json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    pub async fn delete_photo(&self, id: i32) -> Result<(), ClientError> {
        let request = self
            .dispatch
            .request(Method::DELETE, &format!("/api/photos/{id}"));
        self.empty(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    #[instrument(skip(self))]
    pub async fn notes(&self, search: Option<&str>) -> Result<Vec<Note>, ClientError> {
        let request = with_search(self.dispatch.request(Method::GET, "/api/notes"), search);
        self.json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    pub async fn note(&self, id: i32) -> Result<Note, ClientError> {
        let request = self
            .dispatch
            .request(Method::GET, &format!("/api/notes/{id}"));
        self.json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    pub async fn add_note(&self, note: &NewNote) -> Result<Note, ClientError> {
        let request = self.dispatch.request(Method::POST, "/api/notes").json(note);
        self.json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    pub async fn edit_note(&self, id: i32, patch: &NotePatch) -> Result<Note, ClientError> {
        let request = self
            .dispatch
            .request(Method::PUT, &format!("/api/notes/{id}"))
            .json(patch);
        self.json(request).await
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects it
    pub async fn delete_note(&self, id: i32) -> Result<(), ClientError> {
        let request = self
            .dispatch
            .request(Method::DELETE, &format!("/api/notes/{id}"));
        self.empty(request).await
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = check_status(self.dispatch.send(request).await?).await?;
        Ok(response.json().await?)
    }

    async fn empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        check_status(self.dispatch.send(request).await?).await?;
        Ok(())
    }
}

fn with_search(request: RequestBuilder, search: Option<&str>) -> RequestBuilder {
    match search {
        Some(search) if !search.is_empty() => request.query(&[("search", search)]),
        _ => request,
    }
}

/// Turn non-2xx responses into [`ClientError::Http`] with the server message.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorMessage>(&body)
        .map(|error| error.message)
        .unwrap_or_else(|_| sanitize_body(&body));

    Err(ClientError::Http { status, message })
}

/// Trims and truncates error bodies to avoid noisy output.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "Empty response body".to_string();
    }

    let mut sanitized: String = trimmed.chars().take(MAX_ERROR_CHARS).collect();
    if trimmed.chars().count() > MAX_ERROR_CHARS {
        sanitized.push_str("...");
    }
    sanitized
}

fn guess_mime(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
