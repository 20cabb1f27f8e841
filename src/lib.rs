pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;

pub use api::{create_router, AppState};
pub use chat::{ChatService, LlmClient, OpenAiClient, ScriptedLlmClient};
pub use config::Config;
pub use db::{init_db, AlbumRepository, InMemoryAlbumRepository, Migrator, SqliteAlbumRepository};
pub use domain::{Album, AlbumInput, Price};
pub use error::AppError;
