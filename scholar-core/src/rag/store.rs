//! Vector store abstraction and the in-memory implementation.

use super::types::{Document, MetadataFilter, SearchResult};
use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Ordering;
use tokio::sync::RwLock;

/// Unified interface for vector database operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Adds multiple documents to the store.
    async fn add(&self, documents: Vec<Document>) -> Result<()>;

    /// Searches for the most similar documents that pass `filter`.
    ///
    /// # Returns
    ///
    /// At most `top_k` results, sorted by descending similarity score.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>>;

    /// Returns the total number of documents in the store.
    async fn count(&self) -> Result<usize>;

    /// Removes all documents from the store.
    async fn clear(&self) -> Result<()>;
}

/// An in-memory vector store using cosine similarity.
///
/// Linear scan over every document, so it suits catalogs of a few thousand
/// chunks. Data is lost when the process ends.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, documents: Vec<Document>) -> Result<()> {
        self.documents.write().await.extend(documents);
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        let docs = self.documents.read().await;

        let mut results: Vec<SearchResult> = docs
            .iter()
            .filter(|doc| filter.matches(doc))
            .map(|doc| SearchResult {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(top_k);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.documents.write().await.clear();
        Ok(())
    }
}

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
