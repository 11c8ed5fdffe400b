use super::{
    matches_query, NewNote, NewPhoto, NewUser, Note, NotePatch, Photo, Storage, StorageError,
    User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    photos: BTreeMap<i32, Photo>,
    notes: BTreeMap<i32, Note>,
    next_user_id: i32,
    next_photo_id: i32,
    next_note_id: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

fn newest_first_photos(mut photos: Vec<Photo>) -> Vec<Photo> {
    photos.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    photos
}

fn newest_first_notes(mut notes: Vec<Note>) -> Vec<Note> {
    notes.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    notes
}

/// Process-local storage, used by tests and local runs without Postgres.
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_user_id);
        let user = User {
            id,
            username: user.username,
            password: user.password,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_photos(&self) -> Result<Vec<Photo>, StorageError> {
        let tables = self.tables.read().await;
        Ok(newest_first_photos(tables.photos.values().cloned().collect()))
    }

    async fn get_photo(&self, id: i32) -> Result<Option<Photo>, StorageError> {
        Ok(self.tables.read().await.photos.get(&id).cloned())
    }

    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo, StorageError> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_photo_id);
        let photo = Photo {
            id,
            filename: photo.filename,
            caption: photo.caption,
            date: Utc::now(),
        };
        tables.photos.insert(id, photo.clone());
        Ok(photo)
    }

    async fn delete_photo(&self, id: i32) -> Result<Option<Photo>, StorageError> {
        Ok(self.tables.write().await.photos.remove(&id))
    }

    async fn search_photos(&self, query: &str) -> Result<Vec<Photo>, StorageError> {
        if query.is_empty() {
            return self.get_photos().await;
        }
        let tables = self.tables.read().await;
        let found = tables
            .photos
            .values()
            .filter(|photo| {
                photo
                    .caption
                    .as_deref()
                    .is_some_and(|caption| matches_query(caption, query))
            })
            .cloned()
            .collect();
        Ok(newest_first_photos(found))
    }

    async fn get_notes(&self) -> Result<Vec<Note>, StorageError> {
        let tables = self.tables.read().await;
        Ok(newest_first_notes(tables.notes.values().cloned().collect()))
    }

    async fn get_note(&self, id: i32) -> Result<Option<Note>, StorageError> {
        Ok(self.tables.read().await.notes.get(&id).cloned())
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StorageError> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_note_id);
        let note = Note {
            id,
            title: note.title,
            content: note.content,
            date: Utc::now(),
        };
        tables.notes.insert(id, note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: i32, patch: NotePatch) -> Result<Option<Note>, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(note) = tables.notes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        note.date = Utc::now();
        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, id: i32) -> Result<(), StorageError> {
        self.tables.write().await.notes.remove(&id);
        Ok(())
    }

    async fn search_notes(&self, query: &str) -> Result<Vec<Note>, StorageError> {
        if query.is_empty() {
            return self.get_notes().await;
        }
        let tables = self.tables.read().await;
        let found = tables
            .notes
            .values()
            .filter(|note| matches_query(&note.title, query))
            .cloned()
            .collect();
        Ok(newest_first_notes(found))
    }
}
