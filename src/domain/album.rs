//! Album record and its client-supplied input.

use crate::domain::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length, in characters, of `title` and `artist`.
pub const MAX_TEXT_LEN: usize = 255;

/// An album row.
///
/// `id`, `created_at`, `updated_at` and `deleted_at` are owned by storage:
/// whatever a caller puts there before `create` is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` while the album is live; set once by a soft delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Album {
    /// Build an unsaved album. Server-assigned fields hold placeholders until
    /// the repository fills them in.
    pub fn new(title: impl Into<String>, artist: impl Into<String>, price: Price) -> Self {
        Self {
            id: 0,
            title: title.into(),
            artist: artist.into(),
            price,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Overwrite the mutable fields from validated input.
    pub fn apply(&mut self, input: AlbumInput) {
        self.title = input.title;
        self.artist = input.artist;
        self.price = input.price;
    }
}

/// Body of `POST /albums` and `PUT /albums/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInput {
    pub title: String,
    pub artist: String,
    pub price: Price,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Empty(&'static str),
    #[error("{0} must be at most 255 characters")]
    TooLong(&'static str),
    #[error("price must not be negative")]
    NegativePrice,
    #[error("invalid album id: {0}")]
    InvalidId(String),
}

impl AlbumInput {
    /// Trim text fields and check the album invariants.
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.title = check_text("title", &self.title)?;
        self.artist = check_text("artist", &self.artist)?;
        if self.price.is_negative() {
            return Err(ValidationError::NegativePrice);
        }
        Ok(self)
    }

    pub fn into_album(self) -> Album {
        Album::new(self.title, self.artist, self.price)
    }
}

impl From<&Album> for AlbumInput {
    fn from(album: &Album) -> Self {
        Self {
            title: album.title.clone(),
            artist: album.artist.clone(),
            price: album.price,
        }
    }
}

fn check_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong(field));
    }
    Ok(trimmed.to_string())
}

/// Parse a path or tool id. Only positive integers name an album.
///
/// # Errors
/// Returns `ValidationError::InvalidId` for anything else.
pub fn parse_album_id(raw: &str) -> Result<i64, ValidationError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::InvalidId(raw.to_string())),
    }
}
