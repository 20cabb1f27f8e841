//! Album tools the chat model may call.
//!
//! Each tool is one variant of [`AlbumTool`]; arguments are decoded into that
//! variant's typed fields before anything touches the repository.

use crate::chat::llm::{ToolCall, ToolDefinition};
use crate::db::{AlbumRepository, RepoError};
use crate::domain::{parse_album_id, AlbumInput, Price, ValidationError};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

pub const TOOL_NAMES: [&str; 5] = [
    "get_albums",
    "get_album_by_id",
    "create_album",
    "update_album",
    "delete_album",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum AlbumTool {
    GetAlbums {},
    GetAlbumById {
        #[serde(deserialize_with = "album_id")]
        id: i64,
    },
    CreateAlbum {
        title: String,
        artist: String,
        price: Price,
    },
    UpdateAlbum {
        #[serde(deserialize_with = "album_id")]
        id: i64,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        artist: Option<String>,
        #[serde(default)]
        price: Option<Price>,
    },
    DeleteAlbum {
        #[serde(deserialize_with = "album_id")]
        id: i64,
    },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Album with ID {0} not found")]
    NotFound(i64),
    #[error("storage failure")]
    Storage(#[source] RepoError),
}

/// Output of one executed tool call, echoed back to the model and the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    /// JSON text handed to the model as the tool message content.
    pub output: String,
}

impl AlbumTool {
    /// Decode a tool call. Empty `arguments` count as `{}`.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        if !TOOL_NAMES.contains(&name) {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        let arguments: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?
        };
        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlbumTool::GetAlbums {} => "get_albums",
            AlbumTool::GetAlbumById { .. } => "get_album_by_id",
            AlbumTool::CreateAlbum { .. } => "create_album",
            AlbumTool::UpdateAlbum { .. } => "update_album",
            AlbumTool::DeleteAlbum { .. } => "delete_album",
        }
    }

    /// Run the tool against the repository and return its JSON payload.
    pub async fn execute(self, repo: &dyn AlbumRepository) -> Result<Value, ToolError> {
        match self {
            AlbumTool::GetAlbums {} => {
                let albums = repo.find_all().await.map_err(ToolError::Storage)?;
                Ok(json!({ "count": albums.len(), "albums": albums }))
            }
            AlbumTool::GetAlbumById { id } => {
                let album = repo.find_by_id(id).await.map_err(|e| not_found_or(id, e))?;
                Ok(json!({ "album": album }))
            }
            AlbumTool::CreateAlbum {
                title,
                artist,
                price,
            } => {
                let input = AlbumInput {
                    title,
                    artist,
                    price,
                }
                .validate()?;
                let mut album = input.into_album();
                repo.create(&mut album).await.map_err(ToolError::Storage)?;
                Ok(json!({ "album": album, "message": "Album created successfully" }))
            }
            AlbumTool::UpdateAlbum {
                id,
                title,
                artist,
                price,
            } => {
                let mut album = repo.find_by_id(id).await.map_err(|e| not_found_or(id, e))?;
                let mut input = AlbumInput::from(&album);
                if let Some(title) = title {
                    input.title = title;
                }
                if let Some(artist) = artist {
                    input.artist = artist;
                }
                if let Some(price) = price {
                    input.price = price;
                }
                album.apply(input.validate()?);
                repo.update(&mut album)
                    .await
                    .map_err(|e| not_found_or(id, e))?;
                Ok(json!({ "album": album, "message": "Album updated successfully" }))
            }
            AlbumTool::DeleteAlbum { id } => {
                repo.delete(id).await.map_err(|e| not_found_or(id, e))?;
                Ok(json!({ "message": format!("Album {} deleted successfully", id) }))
            }
        }
    }
}

fn not_found_or(id: i64, err: RepoError) -> ToolError {
    if err.is_not_found() {
        ToolError::NotFound(id)
    } else {
        ToolError::Storage(err)
    }
}

/// Accepts `7`, `7.0` or `"7"`; rejects anything that is not a positive
/// whole number.
fn album_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let id = match &value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // i64::MAX as f64 rounds up to 2^63, hence the strict bound
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_album_id(s).ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .ok_or_else(|| de::Error::custom(format!("id must be a positive integer, got {}", value)))
}

/// Execute one model tool call. Failures become `{"error": ...}` outputs so
/// the model can explain them; they never abort the conversation.
pub async fn run_tool_call(repo: &dyn AlbumRepository, call: &ToolCall) -> ToolResult {
    let outcome = match AlbumTool::parse(&call.function.name, &call.function.arguments) {
        Ok(tool) => {
            debug!(tool = tool.name(), call_id = %call.id, "Executing tool call");
            tool.execute(repo).await
        }
        Err(e) => Err(e),
    };

    let output = match outcome {
        Ok(value) => value,
        Err(ToolError::Storage(e)) => {
            error!(tool = %call.function.name, error = %e, "Tool call failed in storage");
            json!({ "error": "storage failure, try again later" })
        }
        Err(e) => json!({ "error": e.to_string() }),
    };

    ToolResult {
        tool_call_id: call.id.clone(),
        output: output.to_string(),
    }
}

/// The fixed catalog advertised to the model.
pub fn catalog() -> Vec<ToolDefinition> {
    let id_schema = |description: &str| json!({ "type": "integer", "description": description });

    vec![
        ToolDefinition {
            name: "get_albums".to_string(),
            description: "Get all albums in the catalog".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "get_album_by_id".to_string(),
            description: "Get a specific album by its ID".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "id": id_schema("The ID of the album to retrieve") },
                "required": ["id"]
            }),
        },
        ToolDefinition {
            name: "create_album".to_string(),
            description: "Create a new album".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Title of the album" },
                    "artist": { "type": "string", "description": "Artist name" },
                    "price": { "type": "number", "description": "Price of the album" }
                },
                "required": ["title", "artist", "price"]
            }),
        },
        ToolDefinition {
            name: "update_album".to_string(),
            description: "Update an existing album by ID; omitted fields keep their value"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": id_schema("ID of the album to update"),
                    "title": { "type": "string", "description": "Title of the album" },
                    "artist": { "type": "string", "description": "Artist name" },
                    "price": { "type": "number", "description": "Price of the album" }
                },
                "required": ["id"]
            }),
        },
        ToolDefinition {
            name: "delete_album".to_string(),
            description: "Delete an album by ID".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "id": id_schema("ID of the album to delete") },
                "required": ["id"]
            }),
        },
    ]
}
