//! SQLite-backed album repository.

use super::{AlbumRepository, RepoError};
use crate::domain::{Album, Price};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_ALL_LIVE: &str = r#"
    SELECT id, title, artist, price, created_at, updated_at, deleted_at
    FROM albums
    WHERE deleted_at IS NULL
    ORDER BY id ASC
"#;

const SELECT_ONE_LIVE: &str = r#"
    SELECT id, title, artist, price, created_at, updated_at, deleted_at
    FROM albums
    WHERE id = ? AND deleted_at IS NULL
"#;

/// Album repository over a shared connection pool.
///
/// Every operation is bounded by `timeout`; a caller dropping the returned
/// future cancels the statement as well.
#[derive(Debug, Clone)]
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_timeout(pool, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(pool: SqlitePool, timeout: Duration) -> Self {
        SqliteAlbumRepository { pool, timeout }
    }

    async fn within_deadline<T, F>(&self, op: &'static str, fut: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout = ?self.timeout, "Album repository operation timed out");
                Err(RepoError::Timeout(self.timeout))
            }
        }
    }

    async fn select_all(&self) -> Result<Vec<Album>, RepoError> {
        let rows = sqlx::query(SELECT_ALL_LIVE)
            .fetch_all(&self.pool)
            .await?;

        let albums = rows
            .iter()
            .map(album_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(albums)
    }

    async fn select_one(&self, id: i64) -> Result<Album, RepoError> {
        let row = sqlx::query(SELECT_ONE_LIVE)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(album_from_row(&row)?)
    }

    async fn insert(&self, album: &mut Album) -> Result<(), RepoError> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO albums (title, artist, price, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(album.title.as_str())
        .bind(album.artist.as_str())
        .bind(album.price.to_canonical_string())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        // A missing RETURNING row is not "not found" for an insert.
        .map_err(RepoError::Storage)?;

        album.id = row.try_get("id").map_err(RepoError::Storage)?;
        album.created_at = now;
        album.updated_at = now;
        album.deleted_at = None;
        debug!(id = album.id, "Created album");
        Ok(())
    }

    async fn overwrite(&self, album: &mut Album) -> Result<(), RepoError> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE albums
            SET title = ?, artist = ?, price = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            RETURNING created_at
            "#,
        )
        .bind(album.title.as_str())
        .bind(album.artist.as_str())
        .bind(album.price.to_canonical_string())
        .bind(now)
        .bind(album.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)?;

        album.created_at = row.try_get("created_at").map_err(RepoError::Storage)?;
        album.updated_at = now;
        album.deleted_at = None;
        debug!(id = album.id, "Updated album");
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE albums
            SET deleted_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        debug!(id, "Soft-deleted album");
        Ok(())
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_all(&self) -> Result<Vec<Album>, RepoError> {
        self.within_deadline("find_all", self.select_all()).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Album, RepoError> {
        self.within_deadline("find_by_id", self.select_one(id)).await
    }

    async fn create(&self, album: &mut Album) -> Result<(), RepoError> {
        self.within_deadline("create", self.insert(album)).await
    }

    async fn update(&self, album: &mut Album) -> Result<(), RepoError> {
        self.within_deadline("update", self.overwrite(album)).await
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        self.within_deadline("delete", self.soft_delete(id)).await
    }
}

fn album_from_row(row: &SqliteRow) -> Result<Album, sqlx::Error> {
    let price_str: String = row.try_get("price")?;
    let price = Price::from_str_canonical(&price_str).map_err(|e| sqlx::Error::ColumnDecode {
        index: "price".to_string(),
        source: Box::new(e),
    })?;

    Ok(Album {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        price,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}
