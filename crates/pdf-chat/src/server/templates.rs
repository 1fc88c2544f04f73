//! HTML templates for the chat page

use uuid::Uuid;

use crate::types::ChatMessage;

use super::state::{Notice, NoticeKind};

/// Placeholder replaced by the message text
pub const MSG_PLACEHOLDER: &str = "{{MSG}}";

pub const CSS: &str = r#"<style>
.chat-message {
    padding: 1.5rem; border-radius: 0.5rem; margin-bottom: 1rem; display: flex
}
.chat-message.user {
    background-color: #2b313e
}
.chat-message.bot {
    background-color: #475063
}
.chat-message .avatar {
  width: 20%;
}
.chat-message .avatar img {
  max-width: 78px;
  max-height: 78px;
  border-radius: 50%;
  object-fit: cover;
}
.chat-message .message {
  width: 80%;
  padding: 0 1.5rem;
  color: #fff;
  white-space: pre-wrap;
}
body { font-family: sans-serif; margin: 0; display: flex; background: #0e1117; color: #fafafa; }
.sidebar { width: 18rem; min-height: 100vh; padding: 2rem 1.5rem; background: #262730; box-sizing: border-box; }
.main { flex: 1; padding: 2rem 3rem; max-width: 50rem; }
.notice { padding: 0.75rem 1rem; border-radius: 0.5rem; margin-bottom: 1rem; }
.notice.info { background: #1c3d5a; }
.notice.error { background: #5a1c1c; }
input[type=text] { width: 100%; padding: 0.6rem; box-sizing: border-box; }
</style>
"#;

pub const BOT_TEMPLATE: &str = r#"
<div class="chat-message bot">
    <div class="avatar">
        <img src="https://i.ibb.co/cN0nmSj/Screenshot-2023-05-28-at-02-37-21.png" style="max-height: 78px; max-width: 78px; border-radius: 50%; object-fit: cover;">
    </div>
    <div class="message">{{MSG}}</div>
</div>
"#;

pub const USER_TEMPLATE: &str = r#"
<div class="chat-message user">
    <div class="avatar">
        <img src="https://i.ibb.co/rdZC7LZ/Photo-logo-1.png">
    </div>
    <div class="message">{{MSG}}</div>
</div>
"#;

/// Substitute escaped message text into a template
pub fn render_message(template: &str, content: &str) -> String {
    template.replace(MSG_PLACEHOLDER, &html_escape::encode_text(content))
}

/// Render messages, alternating user (even index) and bot (odd index) templates
pub fn render_chat_history(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            let template = if i % 2 == 0 { USER_TEMPLATE } else { BOT_TEMPLATE };
            render_message(template, &message.content)
        })
        .collect()
}

/// Everything the page shows
pub struct PageView<'a> {
    pub title: &'a str,
    pub session_id: Uuid,
    pub messages: &'a [ChatMessage],
    pub notice: Option<&'a Notice>,
    /// Filenames in the current index
    pub documents: &'a [String],
}

fn render_notice(notice: &Notice) -> String {
    let class = match notice.kind {
        NoticeKind::Info => "info",
        NoticeKind::Error => "error",
    };
    format!(
        "<div class=\"notice {}\">{}</div>\n",
        class,
        html_escape::encode_text(&notice.message)
    )
}

/// Render the whole chat page
pub fn render_page(view: &PageView<'_>) -> String {
    let title = html_escape::encode_text(view.title);
    let session = view.session_id;

    let notice = view.notice.map(render_notice).unwrap_or_default();

    let documents = if view.documents.is_empty() {
        "<p>No documents processed yet.</p>".to_string()
    } else {
        let items: String = view
            .documents
            .iter()
            .map(|name| format!("<li>{}</li>", html_escape::encode_text(name)))
            .collect();
        format!("<p>Indexed:</p><ul>{}</ul>", items)
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} 📚</title>
{css}</head>
<body>
<div class="sidebar">
<h2>Your documents</h2>
<form action="/process" method="post" enctype="multipart/form-data">
<input type="hidden" name="session" value="{session}">
<p>Upload your PDFs here and click on 'Process'</p>
<input type="file" name="pdf_docs" accept="application/pdf,.pdf" multiple>
<p><button type="submit">Process</button></p>
</form>
{documents}
</div>
<div class="main">
<h1>Chat With Your PDFs 📚</h1>
{notice}<form action="/chat" method="post">
<input type="hidden" name="session" value="{session}">
<label for="question">Ask a question about your documents:</label>
<input type="text" id="question" name="question" autocomplete="off" autofocus>
</form>
{history}</div>
</body>
</html>
"#,
        title = title,
        css = CSS,
        session = session,
        documents = documents,
        notice = notice,
        history = render_chat_history(view.messages),
    )
}
