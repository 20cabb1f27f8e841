//! Versioned schema migrations.
//!
//! Migrations are an append-only list compiled into the binary. Each one runs
//! in its own transaction together with the `schema_migrations` row that
//! records it, so a version is either fully applied and tracked or not at all.
//! Never edit a shipped entry: the tracking table maps a version number to the
//! statements it ran.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Row;
use thiserror::Error;
use tracing::{info, warn};

/// A single schema change.
#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

/// A row of `schema_migrations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create albums table",
        statements: &[r#"
            CREATE TABLE albums (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                artist TEXT NOT NULL CHECK (length(trim(artist)) > 0),
                price TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )
            "#],
    },
    Migration {
        version: 2,
        description: "index albums on deleted_at",
        statements: &["CREATE INDEX idx_albums_deleted_at ON albums(deleted_at)"],
    },
];

const CREATE_TRACKING_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at TEXT NOT NULL
    )
"#;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration list is not strictly ascending at version {0}")]
    InvalidOrder(i64),
    #[error("failed to prepare schema_migrations: {0}")]
    Tracking(#[source] sqlx::Error),
    #[error("migration {version} ({description}) failed: {source}")]
    Apply {
        version: i64,
        description: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Applies pending migrations in ascending version order.
#[derive(Debug, Clone, Copy)]
pub struct Migrator {
    migrations: &'static [Migration],
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(MIGRATIONS)
    }
}

impl Migrator {
    pub fn new(migrations: &'static [Migration]) -> Self {
        Self { migrations }
    }

    /// Highest version this binary knows about, 0 for an empty list.
    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// Bring the schema up to date. Safe to call on every startup.
    ///
    /// Returns how many migrations were applied; zero means the schema was
    /// already current.
    ///
    /// # Errors
    /// Any database error aborts the run. The failing migration is rolled back
    /// and later ones are not attempted.
    pub async fn run(&self, pool: &SqlitePool) -> Result<usize, MigrationError> {
        self.check_order()?;

        sqlx::query(CREATE_TRACKING_TABLE)
            .execute(pool)
            .await
            .map_err(MigrationError::Tracking)?;

        let current = current_version(pool)
            .await
            .map_err(MigrationError::Tracking)?;

        if current > self.latest_version() {
            warn!(
                current,
                latest = self.latest_version(),
                "Database schema is newer than this binary, applying nothing"
            );
            return Ok(0);
        }

        let mut applied = 0usize;
        for migration in self.migrations.iter().filter(|m| m.version > current) {
            apply(pool, migration)
                .await
                .map_err(|source| MigrationError::Apply {
                    version: migration.version,
                    description: migration.description,
                    source,
                })?;
            info!(
                version = migration.version,
                description = migration.description,
                "Applied migration"
            );
            applied += 1;
        }

        if applied == 0 {
            info!(version = current, "Schema is up to date");
        } else {
            info!(applied, version = self.latest_version(), "Migrations completed");
        }
        Ok(applied)
    }

    fn check_order(&self) -> Result<(), MigrationError> {
        let mut previous = 0;
        for migration in self.migrations {
            if migration.version <= previous {
                return Err(MigrationError::InvalidOrder(migration.version));
            }
            previous = migration.version;
        }
        Ok(())
    }
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    match execute_body(&mut *tx, migration).await {
        Ok(()) => tx.commit().await,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    version = migration.version,
                    error = %rollback_err,
                    "Rollback after failed migration also failed"
                );
            }
            Err(err)
        }
    }
}

async fn execute_body(conn: &mut SqliteConnection, migration: &Migration) -> Result<(), sqlx::Error> {
    for statement in migration.statements {
        sqlx::query(*statement).execute(&mut *conn).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO schema_migrations (version, description, applied_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(migration.version)
    .bind(migration.description)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Highest applied version, 0 when nothing has been applied yet.
///
/// # Errors
/// Fails if `schema_migrations` does not exist or cannot be read.
pub async fn current_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT MAX(version) AS version FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(row.try_get::<Option<i64>, _>("version")?.unwrap_or(0))
}

/// All tracking rows, ordered by version.
///
/// # Errors
/// Fails if `schema_migrations` does not exist or cannot be read.
pub async fn applied(pool: &SqlitePool) -> Result<Vec<AppliedMigration>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT version, description, applied_at
        FROM schema_migrations
        ORDER BY version ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(AppliedMigration {
                version: row.try_get("version")?,
                description: row.try_get("description")?,
                applied_at: row.try_get("applied_at")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_path;
    use tempfile::TempDir;

    async fn fresh_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = connect_path(&db_path).await.expect("connect failed");
        (pool, temp_dir)
    }

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap();
        row.0 == 1
    }

    #[tokio::test]
    async fn test_fresh_database_applies_everything() {
        let (pool, _temp) = fresh_pool().await;

        let applied_count = Migrator::default().run(&pool).await.unwrap();
        assert_eq!(applied_count, MIGRATIONS.len());
        assert!(table_exists(&pool, "albums").await);
        assert_eq!(current_version(&pool).await.unwrap(), 2);

        let records = applied(&pool).await.unwrap();
        let versions: Vec<i64> = records.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(records[0].description, "create albums table");
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let (pool, _temp) = fresh_pool().await;
        let migrator = Migrator::default();

        migrator.run(&pool).await.unwrap();
        let before = applied(&pool).await.unwrap();

        assert_eq!(migrator.run(&pool).await.unwrap(), 0);
        assert_eq!(applied(&pool).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_only_pending_versions_run() {
        static FIRST: &[Migration] = &[Migration {
            version: 1,
            description: "one",
            statements: &["CREATE TABLE one (id INTEGER)"],
        }];
        static BOTH: &[Migration] = &[
            Migration {
                version: 1,
                description: "one",
                statements: &["CREATE TABLE one (id INTEGER)"],
            },
            Migration {
                version: 3,
                description: "three",
                statements: &["CREATE TABLE three (id INTEGER)"],
            },
        ];
        let (pool, _temp) = fresh_pool().await;

        assert_eq!(Migrator::new(FIRST).run(&pool).await.unwrap(), 1);
        // Re-running version 1 would fail on the existing table.
        assert_eq!(Migrator::new(BOTH).run(&pool).await.unwrap(), 1);
        assert!(table_exists(&pool, "three").await);
        assert_eq!(current_version(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_migration_rolls_back_and_stops() {
        static BROKEN: &[Migration] = &[
            Migration {
                version: 1,
                description: "good",
                statements: &["CREATE TABLE good (id INTEGER)"],
            },
            Migration {
                version: 2,
                description: "half applied",
                statements: &["CREATE TABLE partial (id INTEGER)", "THIS IS NOT SQL"],
            },
            Migration {
                version: 3,
                description: "never reached",
                statements: &["CREATE TABLE later (id INTEGER)"],
            },
        ];
        let (pool, _temp) = fresh_pool().await;

        let err = Migrator::new(BROKEN).run(&pool).await.unwrap_err();
        match err {
            MigrationError::Apply { version, .. } => assert_eq!(version, 2),
            other => panic!("expected Apply error, got {other:?}"),
        }

        assert!(table_exists(&pool, "good").await);
        assert!(!table_exists(&pool, "partial").await);
        assert!(!table_exists(&pool, "later").await);
        assert_eq!(current_version(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_list_is_rejected_before_touching_db() {
        static UNORDERED: &[Migration] = &[
            Migration {
                version: 2,
                description: "two",
                statements: &["CREATE TABLE two (id INTEGER)"],
            },
            Migration {
                version: 2,
                description: "duplicate",
                statements: &["CREATE TABLE dup (id INTEGER)"],
            },
        ];
        let (pool, _temp) = fresh_pool().await;

        let err = Migrator::new(UNORDERED).run(&pool).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidOrder(2)));
        assert!(!table_exists(&pool, "schema_migrations").await);
    }

    #[tokio::test]
    async fn test_newer_database_applies_nothing() {
        static EMPTY: &[Migration] = &[];
        let (pool, _temp) = fresh_pool().await;
        Migrator::default().run(&pool).await.unwrap();

        assert_eq!(Migrator::new(EMPTY).run(&pool).await.unwrap(), 0);
        assert_eq!(current_version(&pool).await.unwrap(), 2);
    }
}
