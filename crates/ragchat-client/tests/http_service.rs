//! HTTP-level tests for the chat and credential clients.
//!
//! Each test spins up an in-process axum server that mimics the backend's
//! routes, status codes and FastAPI-style error bodies.

use std::sync::Arc;

use axum::extract::{Multipart, Path};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use ragchat_client::{
    AuthClient, AuthError, ChatService, ErrorKind, HttpChatService, ServiceError, SignupRequest,
};
use ragchat_core::{ConversationId, Document, MemoryTokenStore, Origin, TokenProvider};

// =============================================================================
// Fake backend
// =============================================================================

const TOKEN: &str = "good-token";

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Not authenticated"})),
    )
        .into_response()
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn list_conversations(headers: HeaderMap) -> Response {
    if !is_authorized(&headers) {
        return unauthorized();
    }
    Json(json!([
        {"id": 1, "user_id": 7, "created_at": "2024-03-01T10:00:00"},
        {"id": 2, "user_id": 7, "created_at": "2024-03-02T10:00:00"}
    ]))
    .into_response()
}

async fn create_conversation(headers: HeaderMap) -> Response {
    if !is_authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"conversation_id": 3})).into_response()
}

async fn fetch_messages(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !is_authorized(&headers) {
        return unauthorized();
    }
    match id.as_str() {
        "1" => Json(json!([
            {"id": 10, "conversation_id": 1, "sender": "user",
             "content": "capital of France?", "created_at": "2024-03-01T10:00:01"},
            {"id": 11, "conversation_id": 1, "sender": "assistant",
             "content": "Paris is the capital.", "created_at": "2024-03-01T10:00:05"}
        ]))
        .into_response(),
        "2" => Json(json!([])).into_response(),
        "99" => (StatusCode::FORBIDDEN, Json(json!({"detail": "Unauthorized"}))).into_response(),
        "500" => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        "garbled" => (StatusCode::OK, "this is not json").into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Conversation not found"})),
        )
            .into_response(),
    }
}

async fn ask(headers: HeaderMap, mut multipart: Multipart) -> Response {
    if !is_authorized(&headers) {
        return unauthorized();
    }
    let mut question = String::new();
    let mut conversation_id = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let text = field.text().await.unwrap_or_default();
        match name.as_str() {
            "question" => question = text,
            "conversation_id" => conversation_id = text,
            _ => {}
        }
    }
    if conversation_id.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"loc": ["body", "conversation_id"], "msg": "value is not a valid integer"}]})),
        )
            .into_response();
    }
    if question == "silent" {
        return Json(json!({})).into_response();
    }
    Json(json!({"answer": format!("[{}] {}", conversation_id, question)})).into_response()
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Response {
    if !is_authorized(&headers) {
        return unauthorized();
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        if file_name.ends_with(".exe") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Unsupported file type: .exe"})),
            )
                .into_response();
        }
        return Json(json!({
            "status": "success",
            "message": format!("{} {} {}", file_name, content_type, bytes.len())
        }))
        .into_response();
    }
    (StatusCode::BAD_REQUEST, Json(json!({"detail": "file missing"}))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "hunter22" {
        Json(json!({
            "access_token": TOKEN,
            "token_type": "bearer",
            "full_name": "Ada Lovelace"
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid credentials"})),
        )
            .into_response()
    }
}

async fn signup(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Username already taken."})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    )
        .into_response()
}

fn router() -> Router {
    Router::new()
        .route(
            "/conversations/",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/{id}/messages", get(fetch_messages))
        .route("/ask/", post(ask))
        .route("/upload/", post(upload))
        .route("/login", post(login))
        .route("/signup", post(signup))
}

/// Start the fake backend on an ephemeral port and return its base URL.
async fn spawn_backend() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router()).await.unwrap();
    });
    format!("http://{}", addr)
}

// =============================================================================
// Conversations
// =============================================================================

#[tokio::test]
async fn test_list_conversations_with_token() {
    let service = HttpChatService::new(spawn_backend().await);
    let rows = service.list_conversations(Some(TOKEN)).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn test_missing_token_sends_no_header_and_is_unauthorized() {
    let service = HttpChatService::new(spawn_backend().await);
    let err = service.list_conversations(None).await.unwrap_err();
    assert_eq!(err, ServiceError::Unauthorized("Not authenticated".into()));
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let service = HttpChatService::new(spawn_backend().await);
    let err = service.create_conversation(Some("stale")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_create_conversation_returns_id() {
    let service = HttpChatService::new(spawn_backend().await);
    let id = service.create_conversation(Some(TOKEN)).await.unwrap();
    assert_eq!(id, ConversationId::from(3));
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test]
async fn test_fetch_messages_maps_rows() {
    let service = HttpChatService::new(spawn_backend().await);
    let rows = service
        .fetch_messages(Some(TOKEN), &ConversationId::from(1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].origin(), Origin::User);
    assert_eq!(rows[0].content.as_deref(), Some("capital of France?"));
    assert!(rows[0].created_at().is_some());
    assert_eq!(rows[1].origin(), Origin::Assistant);
}

#[tokio::test]
async fn test_fetch_messages_empty() {
    let service = HttpChatService::new(spawn_backend().await);
    let rows = service
        .fetch_messages(Some(TOKEN), &ConversationId::from(2))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_fetch_messages_error_classification() {
    let service = HttpChatService::new(spawn_backend().await);
    let cases = [
        ("404", ErrorKind::NotFound),
        ("99", ErrorKind::Unauthorized),
        ("500", ErrorKind::Unreachable),
        ("garbled", ErrorKind::Unreachable),
    ];
    for (id, kind) in cases {
        let err = service
            .fetch_messages(Some(TOKEN), &ConversationId::from(id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "conversation {}", id);
    }
}

#[tokio::test]
async fn test_not_found_carries_detail() {
    let service = HttpChatService::new(spawn_backend().await);
    let err = service
        .fetch_messages(Some(TOKEN), &ConversationId::from("404"))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::NotFound("Conversation not found".into()));
}

// =============================================================================
// Ask
// =============================================================================

#[tokio::test]
async fn test_ask_sends_form_fields() {
    let service = HttpChatService::new(spawn_backend().await);
    let answer = service
        .ask(Some(TOKEN), Some(&ConversationId::from(1)), "capital of France?")
        .await
        .unwrap();
    assert_eq!(answer, "[1] capital of France?");
}

#[tokio::test]
async fn test_ask_missing_answer_defaults() {
    let service = HttpChatService::new(spawn_backend().await);
    let answer = service
        .ask(Some(TOKEN), Some(&ConversationId::from(1)), "silent")
        .await
        .unwrap();
    assert_eq!(answer, "No response received");
}

#[tokio::test]
async fn test_ask_without_conversation_is_bad_request() {
    let service = HttpChatService::new(spawn_backend().await);
    let err = service.ask(Some(TOKEN), None, "hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(err.detail().contains("conversation_id"));
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_document_sends_file_part() {
    let service = HttpChatService::new(spawn_backend().await);
    let doc = Document::new("notes.txt", b"hello world".to_vec());
    let receipt = service.upload_document(Some(TOKEN), &doc).await.unwrap();
    assert_eq!(receipt.status.as_deref(), Some("success"));
    assert_eq!(receipt.message.as_deref(), Some("notes.txt text/plain 11"));
}

#[tokio::test]
async fn test_upload_rejected_is_bad_request() {
    let service = HttpChatService::new(spawn_backend().await);
    let doc = Document::new("setup.exe", vec![0; 4]);
    let err = service.upload_document(Some(TOKEN), &doc).await.unwrap_err();
    assert_eq!(
        err,
        ServiceError::BadRequest("Unsupported file type: .exe".into())
    );
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn test_login_stores_credentials() {
    let tokens = Arc::new(MemoryTokenStore::new());
    let auth = AuthClient::new(spawn_backend().await, tokens.clone());
    let resp = auth.login("ada@example.com", "hunter22").await.unwrap();
    assert_eq!(resp.access_token, TOKEN);
    assert_eq!(tokens.token().as_deref(), Some(TOKEN));
    assert_eq!(tokens.display_name().as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn test_login_rejected_stores_nothing() {
    let tokens = Arc::new(MemoryTokenStore::new());
    let auth = AuthClient::new(spawn_backend().await, tokens.clone());
    let err = auth.login("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Service(ServiceError::Unauthorized(ref d)) if d == "Invalid credentials"
    ));
    assert!(tokens.token().is_none());
}

#[tokio::test]
async fn test_signup_created() {
    let tokens = Arc::new(MemoryTokenStore::new());
    let auth = AuthClient::new(spawn_backend().await, tokens.clone());
    let form = SignupRequest::new("Ada Lovelace", "ada@example.com", "hunter22");
    auth.signup(&form).await.unwrap();
    assert!(tokens.token().is_none());
}

#[tokio::test]
async fn test_signup_username_taken() {
    let auth = AuthClient::new(spawn_backend().await, Arc::new(MemoryTokenStore::new()));
    let form = SignupRequest::new("Ada", "taken@example.com", "hunter22");
    let err = auth.signup(&form).await.unwrap_err();
    assert_eq!(err.to_string(), "bad request: Username already taken.");
}

#[tokio::test]
async fn test_signup_validation_short_circuits() {
    // Unroutable base URL: a request would fail as Unreachable, not Invalid.
    let auth = AuthClient::new("http://127.0.0.1:9", Arc::new(MemoryTokenStore::new()));
    let form = SignupRequest::new("Ada", "ada@example.com", "123");
    let err = auth.signup(&form).await.unwrap_err();
    assert!(matches!(err, AuthError::Invalid(_)));
}
