//! Routes for the chat page and JSON API

pub mod chat;
pub mod ingest;
pub mod page;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Browser-facing routes
pub fn page_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(page::index))
        .route("/chat", post(page::handle_userinput))
        .route(
            "/process",
            post(page::process).layer(DefaultBodyLimit::max(max_upload_size)),
        )
}

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Processing - with larger body limit for file uploads
        .route(
            "/process",
            post(ingest::process_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/chat", post(chat::chat))
        .route("/sessions/:id/history", get(chat::session_history))
        .route("/sessions/:id", axum::routing::delete(chat::delete_session))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    let index = state.vector_store().map(|store| {
        serde_json::json!({
            "chunks": store.len(),
            "dimensions": store.dimensions(),
            "embedding_model": store.embedding_model(),
            "created_at": store.created_at(),
            "documents": store.documents().iter().map(|d| &d.filename).collect::<Vec<_>>(),
        })
    });

    Json(serde_json::json!({
        "name": "pdf-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Chat with your PDFs",
        "provider": {
            "name": state.llm().name(),
            "chat_model": state.llm().model(),
            "embedding_model": state.embedder().model(),
        },
        "retrieval": {
            "top_k": config.retrieval.top_k,
            "chunk_size": config.chunking.chunk_size,
            "chunk_overlap": config.chunking.chunk_overlap,
        },
        "index": index,
        "active_sessions": state.sessions().len(),
        "endpoints": {
            "GET /": "Chat page",
            "POST /chat": "Ask a question from the page (form)",
            "POST /process": "Process PDFs from the page (multipart)",
            "POST /api/process": "Upload PDFs and rebuild the index",
            "POST /api/chat": "Ask a question (JSON)",
            "GET /api/sessions/:id/history": "Conversation of a session",
            "DELETE /api/sessions/:id": "End a session",
            "GET /api/info": "Service information"
        }
    }))
}
