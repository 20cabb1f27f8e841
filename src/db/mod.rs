//! Database module for SQLite operations.
//!
//! This module provides:
//! - Connection pool construction and SQLite pragma configuration
//! - Versioned schema migrations
//! - The album repository and its implementations

pub mod migrations;
pub mod repo;

pub use migrations::{Migration, MigrationError, Migrator};
pub use repo::{AlbumRepository, InMemoryAlbumRepository, RepoError, SqliteAlbumRepository};

use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database: {0}")]
    Connect(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] MigrationError),
}

/// Open a connection pool for the configured database.
///
/// Does not touch the schema; run a [`Migrator`] before serving traffic.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    if let Some(path) = sqlite_file_path(&config.url) {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(path = %parent.display(), error = %e, "Failed to create database directory");
                }
            }
        }
    }

    let busy_timeout = config.timeout;
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move { configure_pragmas_conn(conn, busy_timeout).await })
        })
        .connect(&config.url)
        .await?;

    info!(url = %config.url, "Database pool ready");
    Ok(pool)
}

/// Open a pool on a SQLite file with default pool settings.
pub async fn connect_path(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    connect(&DatabaseConfig::for_path(db_path)).await
}

/// Open a SQLite file and bring its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, DbError> {
    let pool = connect_path(db_path).await?;
    Migrator::default().run(&pool).await?;
    Ok(pool)
}

/// Extract the file path from a `sqlite:` URL, if it names a file.
fn sqlite_file_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}

async fn configure_pragmas_conn(
    conn: &mut SqliteConnection,
    busy_timeout: Duration,
) -> Result<(), sqlx::Error> {
    use sqlx::Row;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the mode actually in effect
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    tracing::debug!(journal_mode = %journal_mode, "SQLite connection configured");

    let busy_timeout = format!("PRAGMA busy_timeout = {}", busy_timeout.as_millis());
    sqlx::query(&busy_timeout).execute(&mut *conn).await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
