//! HNSW vector store over embedded chunks, persisted as a single JSON file

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::VectorStoreConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, Document};

/// File name of the saved index inside the data directory
pub const INDEX_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;
const MAX_LAYERS: usize = 16;

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Similarity score (1 - cosine distance, higher is better)
    pub similarity: f32,
}

#[derive(Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    version: u32,
    embedding_model: &'a str,
    dimensions: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    documents: &'a [Document],
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct IndexFile {
    version: u32,
    embedding_model: String,
    dimensions: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    documents: Vec<Document>,
    entries: Vec<IndexEntry>,
}

/// In-memory vector index with the chunks it was built from
pub struct VectorStore {
    index: Hnsw<'static, f32, DistCosine>,
    entries: Vec<IndexEntry>,
    documents: Vec<Document>,
    embedding_model: String,
    dimensions: usize,
    ef_search: usize,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl VectorStore {
    /// Build an index from chunks and their embeddings (same order)
    pub fn from_texts(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        embedding_model: &str,
        config: &VectorStoreConfig,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::vector_db(format!(
                "Got {} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Self::build(entries, embedding_model.to_string(), chrono::Utc::now(), config)
    }

    /// Attach the documents the chunks came from
    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    fn build(
        entries: Vec<IndexEntry>,
        embedding_model: String,
        created_at: chrono::DateTime<chrono::Utc>,
        config: &VectorStoreConfig,
    ) -> Result<Self> {
        let dimensions = match entries.first() {
            Some(entry) => entry.embedding.len(),
            None => return Err(Error::vector_db("No texts to index")),
        };
        if dimensions == 0 {
            return Err(Error::vector_db("Embeddings are empty"));
        }
        if let Some(bad) = entries.iter().position(|e| e.embedding.len() != dimensions) {
            return Err(Error::vector_db(format!(
                "Embedding {} has {} dimensions, expected {}",
                bad,
                entries[bad].embedding.len(),
                dimensions
            )));
        }

        let index: Hnsw<'static, f32, DistCosine> = Hnsw::new(
            config.hnsw_m,
            entries.len(),
            MAX_LAYERS,
            config.hnsw_ef_construction,
            DistCosine {},
        );
        for (id, entry) in entries.iter().enumerate() {
            index.insert_slice((entry.embedding.as_slice(), id));
        }

        tracing::debug!(
            "Built HNSW index: {} vectors, {} dimensions",
            entries.len(),
            dimensions
        );

        Ok(Self {
            index,
            entries,
            documents: Vec::new(),
            embedding_model,
            dimensions,
            ef_search: config.hnsw_ef_search,
            created_at,
        })
    }

    /// Return the `k` chunks closest to the query embedding, best first
    pub fn similarity_search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Query has {} dimensions but the index has {}; was it built with another embedding model?",
                query_embedding.len(),
                self.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let mut results: Vec<ScoredChunk> = self
            .index
            .search(query_embedding, k, ef)
            .into_iter()
            .filter_map(|neighbour| {
                let entry = self.entries.get(neighbour.d_id)?;
                let similarity = 1.0 - neighbour.distance;
                similarity.is_finite().then(|| ScoredChunk {
                    chunk: entry.chunk.clone(),
                    similarity,
                })
            })
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);
        Ok(results)
    }

    /// Write the index to `dir/index.json`, replacing any previous one
    pub fn save_local(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));

        let file = IndexFileRef {
            version: FORMAT_VERSION,
            embedding_model: &self.embedding_model,
            dimensions: self.dimensions,
            created_at: self.created_at,
            documents: &self.documents,
            entries: &self.entries,
        };

        let mut writer = std::io::BufWriter::new(std::fs::File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &file)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&tmp, &path)?;

        tracing::info!("Saved {} vectors to {}", self.entries.len(), path.display());
        Ok(path)
    }

    /// Load a saved index from `dir`; `Ok(None)` when nothing has been saved
    pub fn load_local(dir: &Path, config: &VectorStoreConfig) -> Result<Option<Self>> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let reader = std::io::BufReader::new(std::fs::File::open(&path)?);
        let file: IndexFile = serde_json::from_reader(reader)?;

        if file.version != FORMAT_VERSION {
            return Err(Error::vector_db(format!(
                "Unsupported index format version {} in {}",
                file.version,
                path.display()
            )));
        }

        let store = Self::build(file.entries, file.embedding_model, file.created_at, config)?
            .with_documents(file.documents);

        if store.dimensions != file.dimensions {
            return Err(Error::vector_db(format!(
                "Index header says {} dimensions but vectors have {}",
                file.dimensions, store.dimensions
            )));
        }

        tracing::info!(
            "Loaded {} vectors ({}) from {}",
            store.len(),
            store.embedding_model,
            path.display()
        );
        Ok(Some(store))
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model the stored vectors were produced with
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Documents the index was built from
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}

/// Embed chunks, build the index and save it to the data directory
pub async fn store_vectorize_data(
    chunks: Vec<Chunk>,
    documents: Vec<Document>,
    embedder: &dyn EmbeddingProvider,
    config: &VectorStoreConfig,
) -> Result<Arc<VectorStore>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_documents(&texts).await?;

    let store = VectorStore::from_texts(chunks, embeddings, embedder.model(), config)?
        .with_documents(documents);
    let store = Arc::new(store);

    let dir = config.data_dir.clone();
    let to_save = Arc::clone(&store);
    tokio::task::spawn_blocking(move || to_save.save_local(&dir)).await??;

    Ok(store)
}

/// Load the saved index, warning when it was built with a different embedding model
pub async fn get_vectors_from_db(
    config: &VectorStoreConfig,
    embedding_model: &str,
) -> Result<Option<Arc<VectorStore>>> {
    let dir = config.data_dir.clone();
    let config = config.clone();
    let store = tokio::task::spawn_blocking(move || VectorStore::load_local(&dir, &config)).await??;

    if let Some(store) = &store {
        if store.embedding_model() != embedding_model {
            tracing::warn!(
                "Saved index was built with '{}' but '{}' is configured; reprocess your PDFs for accurate results",
                store.embedding_model(),
                embedding_model
            );
        }
    }

    Ok(store.map(Arc::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkSource;

    fn chunk(text: &str, index: u32) -> Chunk {
        Chunk::new(
            text.to_string(),
            ChunkSource {
                filename: "doc.pdf".to_string(),
                page_number: Some(index + 1),
            },
            index,
        )
    }

    fn sample_store() -> VectorStore {
        let chunks = vec![chunk("north", 0), chunk("east", 1), chunk("south", 2)];
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, -1.0]];
        VectorStore::from_texts(chunks, embeddings, "test-model", &VectorStoreConfig::default()).unwrap()
    }

    #[test]
    fn test_similarity_search_orders_by_similarity() {
        let store = sample_store();
        let results = store.similarity_search(&[0.1, 1.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.content, "north");
        assert_eq!(results[2].chunk.content, "south");
        assert!(results[0].similarity > 0.99);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[test]
    fn test_k_limits_results() {
        let store = sample_store();
        assert_eq!(store.similarity_search(&[1.0, 0.0], 1).unwrap().len(), 1);
        assert_eq!(store.similarity_search(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let store = sample_store();
        assert!(store.similarity_search(&[1.0, 0.0, 0.0], 2).is_err());

        let result = VectorStore::from_texts(
            vec![chunk("a", 0), chunk("b", 1)],
            vec![vec![1.0, 0.0], vec![1.0]],
            "m",
            &VectorStoreConfig::default(),
        );
        assert!(matches!(result, Err(Error::VectorDb(_))));
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        let config = VectorStoreConfig::default();
        assert!(VectorStore::from_texts(vec![chunk("a", 0)], vec![], "m", &config).is_err());
        assert!(VectorStore::from_texts(vec![], vec![], "m", &config).is_err());
    }

    #[test]
    fn test_save_and_load_local() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig::default();
        let store = sample_store().with_documents(vec![Document::new(
            "doc.pdf".to_string(),
            "abc".to_string(),
            3,
            14,
            1024,
        )]);

        let path = store.save_local(dir.path()).unwrap();
        assert!(path.ends_with(INDEX_FILE));
        assert!(!dir.path().join("index.json.tmp").exists());

        let loaded = VectorStore::load_local(dir.path(), &config).unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimensions(), 2);
        assert_eq!(loaded.embedding_model(), "test-model");
        assert_eq!(loaded.documents()[0].filename, "doc.pdf");

        let results = loaded.similarity_search(&[1.0, 0.1], 1).unwrap();
        assert_eq!(results[0].chunk.content, "east");
        assert_eq!(results[0].chunk.source.page_number, Some(2));
    }

    #[test]
    fn test_load_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = VectorStore::load_local(&dir.path().join("nothing"), &VectorStoreConfig::default()).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig::default();
        sample_store().save_local(dir.path()).unwrap();

        let replacement =
            VectorStore::from_texts(vec![chunk("only", 0)], vec![vec![0.5, 0.5]], "other", &config).unwrap();
        replacement.save_local(dir.path()).unwrap();

        let loaded = VectorStore::load_local(dir.path(), &config).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.embedding_model(), "other");
    }
}
