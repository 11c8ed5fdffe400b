//! Persistence for users, photos and notes.
//!
//! Handlers only see the [`Storage`] trait. Lists are always ordered newest
//! first (ties broken by id, newest first) and searches are case-insensitive
//! substring matches on the photo caption and the note title.

mod memory;
mod postgres;

pub use memory::MemStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// Account seeded at startup; its password is the configured PIN.
pub const DEFAULT_USERNAME: &str = "keepsake";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for User {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub struct NewUser {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: i32,
    pub filename: String,
    pub caption: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub filename: String,
    pub caption: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

/// Partial note update; absent fields keep their stored value.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Cheap liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StorageError>;

    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    async fn get_photos(&self) -> Result<Vec<Photo>, StorageError>;
    async fn get_photo(&self, id: i32) -> Result<Option<Photo>, StorageError>;
    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo, StorageError>;
    /// Removes the row and returns it so the caller can unlink the file.
    async fn delete_photo(&self, id: i32) -> Result<Option<Photo>, StorageError>;
    async fn search_photos(&self, query: &str) -> Result<Vec<Photo>, StorageError>;

    async fn get_notes(&self) -> Result<Vec<Note>, StorageError>;
    async fn get_note(&self, id: i32) -> Result<Option<Note>, StorageError>;
    async fn create_note(&self, note: NewNote) -> Result<Note, StorageError>;
    /// Applies the patch and bumps the note date to now.
    async fn update_note(&self, id: i32, patch: NotePatch) -> Result<Option<Note>, StorageError>;
    async fn delete_note(&self, id: i32) -> Result<(), StorageError>;
    async fn search_notes(&self, query: &str) -> Result<Vec<Note>, StorageError>;
}

/// Case-insensitive substring match shared by the in-memory search.
pub(crate) fn matches_query(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(&query.to_lowercase())
}
