//! Domain types for the album catalog.
//!
//! - `Album` rows and the validated `AlbumInput` clients send
//! - `Price`, a lossless decimal amount

pub mod album;
pub mod price;

pub use album::{parse_album_id, Album, AlbumInput, ValidationError, MAX_TEXT_LEN};
pub use price::Price;
