//! Request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Existing session to continue; a new one is created when absent
    #[serde(default)]
    pub session_id: Option<Uuid>,

    /// The question to answer
    pub question: String,

    /// Include the retrieved chunks in the response (default: true)
    #[serde(default = "default_include_sources")]
    pub include_sources: bool,
}

fn default_include_sources() -> bool {
    true
}

/// Form body posted by the chat page
#[derive(Debug, Clone, Deserialize)]
pub struct ChatForm {
    pub session: Uuid,
    #[serde(default)]
    pub question: String,
}

/// Query string of the chat page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub session: Option<String>,
}

impl PageQuery {
    /// Session id, ignoring malformed values
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_deref().and_then(|s| Uuid::parse_str(s.trim()).ok())
    }
}
