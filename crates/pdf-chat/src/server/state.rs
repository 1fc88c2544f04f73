//! Application state for the PDF chat server

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{ChatConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::generation::{get_conversation_chain, ChainOutput, ConversationMemory, ConversationalRetrievalChain};
use crate::ingestion::{IngestPipeline, UploadedFile};
use crate::providers::{build_providers, ChatModel, EmbeddingProvider};
use crate::retrieval::{get_vectors_from_db, VectorStore};
use crate::types::{ChatMessage, ProcessResponse};

/// Severity of a page notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// One-shot message shown on the next page render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// State of one browser session
#[derive(Clone)]
pub struct Session {
    /// Conversation memory; held across the whole chain call
    pub memory: Arc<tokio::sync::Mutex<ConversationMemory>>,
    pub notice: Option<Notice>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            memory: Arc::new(tokio::sync::Mutex::new(ConversationMemory::new())),
            notice: None,
            last_active: Utc::now(),
        }
    }
}

/// Per-session state with idle expiry and a size cap
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
    idle_ttl: chrono::Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let ttl = Duration::from_secs(config.idle_ttl_secs);
        Self {
            sessions: DashMap::new(),
            idle_ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            max_sessions: config.max_sessions.max(1),
        }
    }

    /// Start a new session, making room if the store is full
    pub fn create(&self) -> Uuid {
        self.prune_expired();

        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_active)
                .map(|entry| *entry.key());
            match oldest {
                Some(id) => {
                    tracing::debug!("Evicting idle session {}", id);
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        self.sessions.insert(id, Session::new());
        tracing::debug!("Created session {}", id);
        id
    }

    /// Return the session id to use and whether it was newly created
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, bool) {
        match id {
            Some(id) if self.touch(&id) => (id, false),
            _ => (self.create(), true),
        }
    }

    /// Mark a session active; false when it does not exist (or has expired)
    pub fn touch(&self, id: &Uuid) -> bool {
        let now = Utc::now();
        match self.sessions.get_mut(id) {
            Some(mut session) if now - session.last_active <= self.idle_ttl => {
                session.last_active = now;
                return true;
            }
            Some(_) => {}
            None => return false,
        }

        self.sessions.remove(id);
        false
    }

    /// Conversation memory of a session
    pub fn memory(&self, id: &Uuid) -> Result<Arc<tokio::sync::Mutex<ConversationMemory>>> {
        if !self.touch(id) {
            return Err(Error::SessionNotFound(id.to_string()));
        }
        self.sessions
            .get(id)
            .map(|s| Arc::clone(&s.memory))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Snapshot of a session's messages
    pub async fn history(&self, id: &Uuid) -> Result<Vec<ChatMessage>> {
        let memory = self.memory(id)?;
        let memory = memory.lock().await;
        Ok(memory.messages().to_vec())
    }

    pub fn set_notice(&self, id: &Uuid, notice: Notice) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.notice = Some(notice);
        }
    }

    pub fn take_notice(&self, id: &Uuid) -> Option<Notice> {
        self.sessions.get_mut(id).and_then(|mut s| s.notice.take())
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop sessions idle for longer than the TTL
    pub fn prune_expired(&self) -> usize {
        let cutoff = Utc::now() - self.idle_ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.last_active >= cutoff);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            tracing::debug!("Pruned {} idle sessions", pruned);
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: ChatConfig,
    /// Embedding provider (OpenAI or Ollama)
    embedder: Arc<dyn EmbeddingProvider>,
    /// Chat model (OpenAI or Ollama)
    llm: Arc<dyn ChatModel>,
    /// Current index; replaced wholesale on processing
    vector_store: RwLock<Option<Arc<VectorStore>>>,
    /// Browser sessions
    sessions: SessionStore,
    /// Ingestion pipeline
    pipeline: IngestPipeline,
    /// Serialises processing runs that write the data directory
    processing: tokio::sync::Mutex<()>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state from configuration, building providers and loading any saved index
    pub async fn new(config: ChatConfig) -> Result<Self> {
        tracing::info!("Initializing PDF chat state (provider: {:?})...", config.provider);

        let (embedder, llm) = build_providers(&config)?;
        tracing::info!(
            "Providers initialized (embeddings: {}/{}, chat: {}/{})",
            embedder.name(),
            embedder.model(),
            llm.name(),
            llm.model()
        );

        let state = Self::with_providers(config, embedder, llm);
        state.reload_vector_store().await;
        state.set_ready(true);

        Ok(state)
    }

    /// Create state around existing providers with no index loaded
    pub fn with_providers(
        config: ChatConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn ChatModel>,
    ) -> Self {
        let sessions = SessionStore::new(&config.sessions);
        let pipeline = IngestPipeline::new(&config.chunking);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                embedder,
                llm,
                vector_store: RwLock::new(None),
                sessions,
                pipeline,
                processing: tokio::sync::Mutex::new(()),
                ready: RwLock::new(false),
            }),
        }
    }

    /// Load the saved index from the data directory; a broken index is logged and ignored
    pub async fn reload_vector_store(&self) {
        let config = &self.inner.config;
        match get_vectors_from_db(&config.vector_store, self.inner.embedder.model()).await {
            Ok(Some(store)) => self.set_vector_store(store),
            Ok(None) => tracing::info!(
                "No saved index in {}; upload PDFs to get started",
                config.vector_store.data_dir.display()
            ),
            Err(e) => tracing::error!("Failed to load saved index: {}", e),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn llm(&self) -> &Arc<dyn ChatModel> {
        &self.inner.llm
    }

    /// Current index, if any documents have been processed
    pub fn vector_store(&self) -> Option<Arc<VectorStore>> {
        self.inner.vector_store.read().clone()
    }

    pub fn set_vector_store(&self, store: Arc<VectorStore>) {
        *self.inner.vector_store.write() = Some(store);
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Chain over the current index
    pub fn conversation_chain(&self) -> Result<ConversationalRetrievalChain> {
        let store = self.vector_store().ok_or(Error::NoDocuments)?;
        Ok(get_conversation_chain(
            store,
            Arc::clone(&self.inner.embedder),
            Arc::clone(&self.inner.llm),
            self.inner.config.retrieval.top_k,
        ))
    }

    /// Ask a question within a session's conversation
    pub async fn ask(&self, session_id: &Uuid, question: &str) -> Result<ChainOutput> {
        let memory = self.inner.sessions.memory(session_id)?;
        let chain = self.conversation_chain()?;

        let mut memory = memory.lock().await;
        chain.ask(&mut memory, question).await
    }

    /// Process uploads into a new index, save it and make it current
    pub async fn process_uploads(&self, files: Vec<UploadedFile>) -> Result<ProcessResponse> {
        let _guard = self.inner.processing.lock().await;

        let batch = self
            .inner
            .pipeline
            .process(files, self.inner.embedder.as_ref(), &self.inner.config.vector_store)
            .await?;

        self.set_vector_store(batch.store);
        Ok(batch.response)
    }
}
