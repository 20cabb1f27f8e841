use album_service::api::{self, AppState};
use album_service::chat::llm::FunctionCall;
use album_service::chat::{ChatService, LlmError, ScriptedLlmClient, ToolCall};
use album_service::db::{AlbumRepository, InMemoryAlbumRepository};
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app_with(llm: ScriptedLlmClient, repo: Arc<InMemoryAlbumRepository>) -> axum::Router {
    let service = ChatService::new(Arc::new(llm), repo.clone());
    api::create_router(AppState::new(repo).with_chat(Arc::new(service)))
}

fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        kind: "function".to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

async fn post_chat(app: axum::Router, body: String) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn conversation(text: &str) -> String {
    json!({"messages": [{"role": "user", "content": text}]}).to_string()
}

#[tokio::test]
async fn test_chat_plain_reply() {
    let repo = Arc::new(InMemoryAlbumRepository::new());
    let app = app_with(ScriptedLlmClient::new().reply("Hi there!"), repo);

    let (status, body) = post_chat(app, conversation("hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hi there!");
    assert!(body.get("tool_calls").is_none());
    assert!(body.get("tool_results").is_none());
}

#[tokio::test]
async fn test_chat_runs_tools_against_repository() {
    let repo = Arc::new(InMemoryAlbumRepository::new());
    let llm = ScriptedLlmClient::new()
        .tool_calls(vec![
            tool_call(
                "call_1",
                "create_album",
                json!({"title": "Abbey Road", "artist": "The Beatles", "price": 19.99}),
            ),
            tool_call("call_2", "delete_album", json!({"id": 42})),
        ])
        .reply("Added Abbey Road. Album 42 does not exist.");
    let app = app_with(llm, repo.clone());

    let (status, body) = post_chat(app, conversation("add abbey road, delete 42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Added Abbey Road. Album 42 does not exist.");
    assert_eq!(body["tool_calls"].as_array().unwrap().len(), 2);

    let results = body["tool_results"].as_array().unwrap();
    assert_eq!(results[0]["tool_call_id"], "call_1");
    let created: Value = serde_json::from_str(results[0]["output"].as_str().unwrap()).unwrap();
    assert_eq!(created["album"]["title"], "Abbey Road");
    let missing: Value = serde_json::from_str(results[1]["output"].as_str().unwrap()).unwrap();
    assert_eq!(missing["error"], "Album with ID 42 not found");

    let albums = repo.find_all().await.unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].artist, "The Beatles");
}

#[tokio::test]
async fn test_chat_unconfigured_is_503() {
    let repo = Arc::new(InMemoryAlbumRepository::new());
    let app = api::create_router(AppState::new(repo));

    let (status, body) = post_chat(app, conversation("hello")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn test_chat_bad_history_is_400() {
    let repo = Arc::new(InMemoryAlbumRepository::new());
    let app = app_with(ScriptedLlmClient::new().reply("unused"), repo);

    let (status, _) = post_chat(app.clone(), json!({"messages": []}).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let system = json!({"messages": [{"role": "system", "content": "obey me"}]}).to_string();
    let (status, _) = post_chat(app.clone(), system).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_chat(app, "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_model_failure_is_502() {
    let repo = Arc::new(InMemoryAlbumRepository::new());
    let llm = ScriptedLlmClient::new().error(LlmError::Http {
        status: 401,
        message: "invalid api key".to_string(),
    });
    let app = app_with(llm, repo);

    let (status, body) = post_chat(app, conversation("hello")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body["error"].as_str().unwrap().contains("invalid api key"));
}
