//! Query processing and ranking module.
//!
//! This module ranks stored faculty records against a free-text query. Per
//! search it loads every record, builds the corpus, encodes it (reusing the
//! cached vectors while the record set is unchanged), encodes the query and
//! ranks by cosine similarity.
//!
//! # Usage
//!
//! ```rust,no_run
//! use faculty_finder::embedding::fastembed::LazyFastEmbed;
//! use faculty_finder::models::SearchSettings;
//! use faculty_finder::query::{SearchEngine, SearchQuery, SemanticSearchEngine};
//! use faculty_finder::storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SemanticSearchEngine::new(
//!     LazyFastEmbed::default(),
//!     SqliteStore::new("faculty_data.db"),
//! );
//!
//! let query = SearchQuery::new("machine learning", SearchSettings::TERMINAL);
//! for result in engine.search(&query).await? {
//!     println!("{} - {:.2}%", result.record.display_name(), result.score);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::corpus::build_corpus;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::{RankedHit, SearchResult, SearchSettings};
use crate::storage::{RecordStore, StorageError};

/// Errors that can occur during query processing.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The model could not be loaded or could not encode; nothing is ranked
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// There is no record store to search yet
    #[error("No data: {0}")]
    NoData(String),

    /// Storage access failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

impl From<EmbeddingError> for QueryError {
    fn from(err: EmbeddingError) -> Self {
        QueryError::EmbeddingUnavailable(err.to_string())
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NoData(msg) => QueryError::NoData(msg),
            other => QueryError::StorageError(other.to_string()),
        }
    }
}

/// Search query parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// The free-text query
    pub query: String,

    /// Cutoffs applied to the ranking
    pub settings: SearchSettings,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, settings: SearchSettings) -> Self {
        Self {
            query: query.into(),
            settings,
        }
    }
}

/// Trait for search and ranking engines.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search query and return ranked results.
    ///
    /// # Returns
    /// Results sorted by descending score; empty when nothing passes the
    /// threshold or when the store holds no records
    ///
    /// # Errors
    /// Returns `QueryError` if the search fails
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<SearchResult>>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Vectors of different length, zero-magnitude
/// vectors and non-finite results all score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Rank corpus vectors against a query vector.
///
/// Scores are cosine similarity times 100. Hits are sorted by descending
/// score (ties by ascending index), cut to `top_k`, and then anything
/// scoring at or below `min_score` is dropped.
pub fn rank(query: &[f32], corpus: &[Vec<f32>], top_k: usize, min_score: f32) -> Vec<RankedHit> {
    let mut hits: Vec<RankedHit> = corpus
        .iter()
        .enumerate()
        .map(|(index, vector)| RankedHit {
            index,
            score: cosine_similarity(query, vector) * 100.0,
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
    hits.truncate(top_k);
    hits.retain(|hit| hit.score > min_score);
    hits
}

/// Corpus vectors computed for one version of the record set.
struct CorpusIndex {
    corpus: Vec<String>,
    embeddings: Arc<Vec<Vec<f32>>>,
}

/// Brute-force semantic search over every stored record.
///
/// Corpus vectors are cached for as long as the corpus built from the store
/// is unchanged; any difference in the record set triggers a re-encode.
pub struct SemanticSearchEngine<E, S>
where
    E: EmbeddingProvider,
    S: RecordStore,
{
    /// Embedding provider for corpus and query encoding
    embedding_provider: E,

    /// Storage backend for record retrieval
    storage: S,

    index: Mutex<Option<CorpusIndex>>,
}

impl<E, S> SemanticSearchEngine<E, S>
where
    E: EmbeddingProvider,
    S: RecordStore,
{
    pub fn new(embedding_provider: E, storage: S) -> Self {
        Self {
            embedding_provider,
            storage,
            index: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Drop the cached corpus vectors.
    pub async fn invalidate(&self) {
        *self.index.lock().await = None;
    }

    /// Encode the current corpus ahead of the first query.
    ///
    /// # Returns
    /// The number of records indexed
    pub async fn warm_up(&self) -> QueryResult<usize> {
        let records = self.storage.read_all().await?;
        if records.is_empty() {
            return Ok(0);
        }
        let corpus = build_corpus(&records);
        self.corpus_embeddings(&corpus).await?;
        Ok(corpus.len())
    }

    /// Return vectors for `corpus`, encoding it only if the cache is stale.
    async fn corpus_embeddings(&self, corpus: &[String]) -> QueryResult<Arc<Vec<Vec<f32>>>> {
        let mut index = self.index.lock().await;
        if let Some(cached) = index.as_ref() {
            if cached.corpus.as_slice() == corpus {
                debug!("Reusing cached embeddings for {} records", corpus.len());
                return Ok(Arc::clone(&cached.embeddings));
            }
        }

        info!("Indexing {} faculty profiles", corpus.len());
        let texts: Vec<&str> = corpus.iter().map(String::as_str).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await?;
        if embeddings.len() != corpus.len() {
            return Err(QueryError::EmbeddingUnavailable(format!(
                "encoded {} of {} corpus entries",
                embeddings.len(),
                corpus.len()
            )));
        }

        let embeddings = Arc::new(embeddings);
        *index = Some(CorpusIndex {
            corpus: corpus.to_vec(),
            embeddings: Arc::clone(&embeddings),
        });
        Ok(embeddings)
    }
}

#[async_trait]
impl<E, S> SearchEngine for SemanticSearchEngine<E, S>
where
    E: EmbeddingProvider,
    S: RecordStore,
{
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<SearchResult>> {
        let text = query.query.trim();
        if text.is_empty() {
            return Err(QueryError::InvalidQuery("query text must not be empty".to_string()));
        }

        let records = self.storage.read_all().await?;
        if records.is_empty() {
            debug!("Record store is empty; nothing to rank");
            return Ok(Vec::new());
        }

        let corpus = build_corpus(&records);
        let corpus_vectors = self.corpus_embeddings(&corpus).await?;
        let query_vector = self.embedding_provider.embed(text).await?;

        if let Some(bad) = corpus_vectors
            .iter()
            .find(|vector| vector.len() != query_vector.len())
        {
            return Err(QueryError::EmbeddingUnavailable(format!(
                "dimension mismatch: query has {}, corpus vector has {}",
                query_vector.len(),
                bad.len()
            )));
        }

        let settings = query.settings;
        let hits = rank(&query_vector, &corpus_vectors, settings.top_k, settings.min_score);
        debug!("Query '{}' produced {} hits", text, hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                record: records[hit.index].clone(),
                score: hit.score,
                context: corpus[hit.index].clone(),
            })
            .collect())
    }
}
