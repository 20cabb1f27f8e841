//! Album repository.
//!
//! `AlbumRepository` is the storage seam the HTTP handlers and chat tools work
//! against. Implementations:
//! - `sqlite.rs` - the production store over a `SqlitePool`
//! - `memory.rs` - an in-process fake with the same contract
//!
//! Contract shared by every implementation:
//! - Soft-deleted rows are invisible to `find_all`, `find_by_id`, `update` and
//!   `delete`; the latter two report `RepoError::NotFound` for them.
//! - `find_all` returns live albums ordered by id ascending.
//! - `create` and `update` write the server-assigned fields back into the
//!   album they were given.

mod memory;
mod sqlite;

pub use memory::InMemoryAlbumRepository;
pub use sqlite::SqliteAlbumRepository;

use crate::domain::Album;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound)
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Storage(other),
        }
    }
}

#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// All live albums, ordered by id. An empty catalog is `Ok(vec![])`.
    async fn find_all(&self) -> Result<Vec<Album>, RepoError>;

    /// The live album with this id.
    ///
    /// # Errors
    /// `NotFound` if the id never existed or was soft-deleted.
    async fn find_by_id(&self, id: i64) -> Result<Album, RepoError>;

    /// Insert a new album. Assigns `id`, `created_at` and `updated_at` (equal
    /// on creation) on `album`; caller-supplied values for those fields and
    /// for `deleted_at` are ignored.
    async fn create(&self, album: &mut Album) -> Result<(), RepoError>;

    /// Overwrite title, artist and price of the live album `album.id` and
    /// refresh `updated_at`. `created_at` is left untouched in storage and
    /// written back into `album`.
    ///
    /// # Errors
    /// `NotFound` if no live album has this id.
    async fn update(&self, album: &mut Album) -> Result<(), RepoError>;

    /// Soft-delete the live album with this id.
    ///
    /// # Errors
    /// `NotFound` if no live album has this id, including one already deleted.
    async fn delete(&self, id: i64) -> Result<(), RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(RepoError::from(sqlx::Error::RowNotFound).is_not_found());
        assert!(matches!(
            RepoError::from(sqlx::Error::PoolTimedOut),
            RepoError::Storage(_)
        ));
    }
}
