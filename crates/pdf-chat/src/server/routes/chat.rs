//! JSON chat and session endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    response::SessionHistory, ChatRequest, ChatResponse, SourceSnippet,
};

/// POST /api/chat - Ask a question, continuing a session when one is given
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();

    let session_id = match request.session_id {
        Some(id) if state.sessions().touch(&id) => id,
        Some(id) => return Err(Error::SessionNotFound(id.to_string())),
        None => state.sessions().create(),
    };

    tracing::info!("Question in session {}: \"{}\"", session_id, request.question);

    let output = state.ask(&session_id, &request.question).await?;

    let sources = if request.include_sources {
        output
            .sources
            .iter()
            .map(|s| SourceSnippet::from_chunk(&s.chunk, s.similarity))
            .collect()
    } else {
        Vec::new()
    };

    Ok(Json(ChatResponse {
        session_id,
        question: output.question,
        standalone_question: output.standalone_question,
        answer: output.answer,
        chat_history: output.chat_history,
        sources,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// GET /api/sessions/:id/history
pub async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionHistory>> {
    let messages = state.sessions().history(&id).await?;
    Ok(Json(SessionHistory {
        session_id: id,
        messages,
    }))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.sessions().remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::SessionNotFound(id.to_string()))
    }
}
