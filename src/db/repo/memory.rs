//! In-memory album repository for tests and local experiments.

use super::{AlbumRepository, RepoError};
use crate::domain::Album;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    rows: BTreeMap<i64, Album>,
    failing: bool,
}

/// Album repository that keeps every row, deleted or not, in a `BTreeMap`.
#[derive(Debug, Default)]
pub struct InMemoryAlbumRepository {
    state: Mutex<State>,
}

impl InMemoryAlbumRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a storage error.
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    /// Rows including soft-deleted ones, ordered by id.
    pub async fn all_rows(&self) -> Vec<Album> {
        self.state.lock().await.rows.values().cloned().collect()
    }
}

impl State {
    fn check(&self) -> Result<(), RepoError> {
        if self.failing {
            return Err(RepoError::Storage(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    fn live_mut(&mut self, id: i64) -> Result<&mut Album, RepoError> {
        self.rows
            .get_mut(&id)
            .filter(|a| !a.is_deleted())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl AlbumRepository for InMemoryAlbumRepository {
    async fn find_all(&self) -> Result<Vec<Album>, RepoError> {
        let state = self.state.lock().await;
        state.check()?;
        Ok(state
            .rows
            .values()
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Album, RepoError> {
        let mut state = self.state.lock().await;
        state.check()?;
        state.live_mut(id).map(|a| a.clone())
    }

    async fn create(&self, album: &mut Album) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.check()?;

        let now = Utc::now();
        state.last_id += 1;
        album.id = state.last_id;
        album.created_at = now;
        album.updated_at = now;
        album.deleted_at = None;
        state.rows.insert(album.id, album.clone());
        Ok(())
    }

    async fn update(&self, album: &mut Album) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.check()?;

        let row = state.live_mut(album.id)?;
        row.title = album.title.clone();
        row.artist = album.artist.clone();
        row.price = album.price;
        row.updated_at = Utc::now();

        album.created_at = row.created_at;
        album.updated_at = row.updated_at;
        album.deleted_at = None;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.check()?;

        state.live_mut(id)?.deleted_at = Some(Utc::now());
        Ok(())
    }
}
