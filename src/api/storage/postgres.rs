use super::{
    NewNote, NewPhoto, NewUser, Note, NotePatch, Photo, Storage, StorageError, User,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{debug, info_span, Instrument};

const SCHEMA: [&str; 3] = [
    r"
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS photos (
        id SERIAL PRIMARY KEY,
        filename TEXT NOT NULL,
        caption TEXT,
        date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS notes (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    ",
];

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password: row.try_get("password")?,
    })
}

fn photo_from_row(row: &PgRow) -> Result<Photo, sqlx::Error> {
    Ok(Photo {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        caption: row.try_get("caption")?,
        date: row.try_get("date")?,
    })
}

fn note_from_row(row: &PgRow) -> Result<Note, sqlx::Error> {
    Ok(Note {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        date: row.try_get("date")?,
    })
}

/// Postgres-backed storage.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables when missing and seeds the default account.
    /// Existing rows are left untouched.
    ///
    /// # Errors
    /// Returns an error if any statement fails
    pub async fn ensure_schema(&self, default_user: &NewUser) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        let seeded = sqlx::query(
            r"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
            ",
        )
        .bind(&default_user.username)
        .bind(&default_user.password)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if seeded.rows_affected() > 0 {
            debug!("Created default user {}", default_user.username);
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, username, password FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, username, password FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password
            ",
        )
        .bind(user.username)
        .bind(user.password)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(&row)?)
    }

    async fn get_photos(&self) -> Result<Vec<Photo>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, filename, caption, date FROM photos ORDER BY date DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(photo_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_photo(&self, id: i32) -> Result<Option<Photo>, StorageError> {
        let row = sqlx::query("SELECT id, filename, caption, date FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(photo_from_row).transpose()?)
    }

    async fn create_photo(&self, photo: NewPhoto) -> Result<Photo, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO photos (filename, caption, date)
            VALUES ($1, $2, NOW())
            RETURNING id, filename, caption, date
            ",
        )
        .bind(photo.filename)
        .bind(photo.caption)
        .fetch_one(&self.pool)
        .await?;
        Ok(photo_from_row(&row)?)
    }

    async fn delete_photo(&self, id: i32) -> Result<Option<Photo>, StorageError> {
        let row = sqlx::query(
            "DELETE FROM photos WHERE id = $1 RETURNING id, filename, caption, date",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(photo_from_row).transpose()?)
    }

    async fn search_photos(&self, query: &str) -> Result<Vec<Photo>, StorageError> {
        if query.is_empty() {
            return self.get_photos().await;
        }
        // position() instead of LIKE so `%` and `_` in the query stay literal.
        let rows = sqlx::query(
            r"
            SELECT id, filename, caption, date
            FROM photos
            WHERE position(lower($1) IN lower(COALESCE(caption, ''))) > 0
            ORDER BY date DESC, id DESC
            ",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(photo_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_notes(&self) -> Result<Vec<Note>, StorageError> {
        let rows =
            sqlx::query("SELECT id, title, content, date FROM notes ORDER BY date DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(note_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_note(&self, id: i32) -> Result<Option<Note>, StorageError> {
        let row = sqlx::query("SELECT id, title, content, date FROM notes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(note_from_row).transpose()?)
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO notes (title, content, date)
            VALUES ($1, $2, NOW())
            RETURNING id, title, content, date
            ",
        )
        .bind(note.title)
        .bind(note.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(note_from_row(&row)?)
    }

    async fn update_note(&self, id: i32, patch: NotePatch) -> Result<Option<Note>, StorageError> {
        let row = sqlx::query(
            r"
            UPDATE notes
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                date = NOW()
            WHERE id = $1
            RETURNING id, title, content, date
            ",
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(note_from_row).transpose()?)
    }

    async fn delete_note(&self, id: i32) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_notes(&self, query: &str) -> Result<Vec<Note>, StorageError> {
        if query.is_empty() {
            return self.get_notes().await;
        }
        let rows = sqlx::query(
            r"
            SELECT id, title, content, date
            FROM notes
            WHERE position(lower($1) IN lower(title)) > 0
            ORDER BY date DESC, id DESC
            ",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(note_from_row).collect::<Result<_, _>>()?)
    }
}
