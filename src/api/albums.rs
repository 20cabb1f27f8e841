use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use super::AppState;
use crate::domain::{parse_album_id, Album, AlbumInput};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn list_albums(State(state): State<AppState>) -> Result<Json<Vec<Album>>, AppError> {
    let albums = state.albums.find_all().await?;
    Ok(Json(albums))
}

pub async fn get_album(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Album>, AppError> {
    let id = parse_album_id(&id)?;
    let album = state.albums.find_by_id(id).await?;
    Ok(Json(album))
}

pub async fn create_album(
    State(state): State<AppState>,
    payload: Result<Json<AlbumInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Album>), AppError> {
    let Json(input) = payload?;
    let mut album = input.validate()?.into_album();
    state.albums.create(&mut album).await?;

    info!(id = album.id, title = %album.title, "Album created");
    Ok((StatusCode::CREATED, Json(album)))
}

pub async fn update_album(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<AlbumInput>, JsonRejection>,
) -> Result<Json<Album>, AppError> {
    let id = parse_album_id(&id)?;
    let Json(input) = payload?;

    let mut album = input.validate()?.into_album();
    album.id = id;
    state.albums.update(&mut album).await?;

    info!(id, "Album updated");
    Ok(Json(album))
}

pub async fn delete_album(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_album_id(&id)?;
    state.albums.delete(id).await?;

    info!(id, "Album deleted");
    Ok(Json(MessageResponse {
        message: "Album deleted successfully".to_string(),
    }))
}
