//! Browser chat page

use axum::{
    extract::{Multipart, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::{AppState, Notice};
use crate::server::templates::{render_page, PageView};
use crate::types::query::{ChatForm, PageQuery};

use super::ingest::read_upload_form;

fn back_to(session: Uuid) -> Redirect {
    Redirect::to(&format!("/?session={}", session))
}

/// GET / - Render the page for a session, creating one if needed
pub async fn index(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Result<Response> {
    let (session_id, created) = state.sessions().get_or_create(query.session_id());
    if created {
        return Ok(back_to(session_id).into_response());
    }

    let messages = state.sessions().history(&session_id).await?;
    let notice = state.sessions().take_notice(&session_id);
    let documents: Vec<String> = state
        .vector_store()
        .map(|store| store.documents().iter().map(|d| d.filename.clone()).collect())
        .unwrap_or_default();

    let html = render_page(&PageView {
        title: &state.config().server.page_title,
        session_id,
        messages: &messages,
        notice: notice.as_ref(),
        documents: &documents,
    });

    Ok(Html(html).into_response())
}

/// POST /chat - Handle a question from the page
pub async fn handle_userinput(State(state): State<AppState>, Form(form): Form<ChatForm>) -> Redirect {
    let (session_id, created) = state.sessions().get_or_create(Some(form.session));
    if created || form.question.trim().is_empty() {
        return back_to(session_id);
    }

    match state.ask(&session_id, &form.question).await {
        Ok(output) => {
            tracing::info!(
                "Answered in session {} using {} chunks",
                session_id,
                output.sources.len()
            );
        }
        Err(e) => {
            tracing::warn!("Chat failed in session {}: {}", session_id, e);
            state.sessions().set_notice(&session_id, Notice::error(e.to_string()));
        }
    }

    back_to(session_id)
}

/// POST /process - Process PDFs uploaded from the sidebar
pub async fn process(State(state): State<AppState>, mut multipart: Multipart) -> Redirect {
    let form = match read_upload_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("Upload failed: {}", e);
            let (session_id, _) = state.sessions().get_or_create(None);
            state.sessions().set_notice(&session_id, Notice::error(e.to_string()));
            return back_to(session_id);
        }
    };

    let (session_id, _) = state.sessions().get_or_create(form.session);

    let notice = match state.process_uploads(form.files).await {
        Ok(response) => Notice::info(response.summary()),
        Err(e) => Notice::error(e.to_string()),
    };
    state.sessions().set_notice(&session_id, notice);

    back_to(session_id)
}
