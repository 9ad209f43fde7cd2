//! Retrieval over indexed course material.
//!
//! The round loop never talks to a vector database directly. Tools reach the
//! material through the [`SearchBackend`] capability, which answers ranked
//! searches with optional course/lesson filters and hands out course outlines.
//!
//! # Components
//!
//! - [`CourseIndex`]: the bundled backend, holding a course catalog and an
//!   in-memory vector store
//! - [`Embedder`]: converts text to vectors through the LLM provider
//! - [`VectorStore`]: similarity search with metadata filters
//! - [`Catalog`]: pre-chunked course material loaded from JSON
//!
//! # How It Works
//!
//! 1. **Loading**: every lesson chunk of a catalog course is embedded and
//!    stored with `course_title`, `lesson_number` and `lesson_link` metadata.
//! 2. **Filtering**: a course name is resolved to a known title by
//!    case-insensitive partial match; the lesson number filters by metadata.
//! 3. **Retrieval**: the query is embedded and the top matches are returned
//!    in descending similarity order.

mod catalog;
mod embedder;
mod store;
mod types;

pub use catalog::{Catalog, CatalogCourse, CatalogError, CatalogLesson};
pub use embedder::{Embedder, EmbedderError};
pub use store::{MemoryStore, VectorStore};
pub use types::{
    Course, Document, Lesson, MetadataFilter, SearchResult, META_COURSE_TITLE, META_LESSON_LINK,
    META_LESSON_NUMBER,
};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SearchError {
    /// A filter named something the index does not know.
    #[error("{0}")]
    NotFound(String),

    #[error("Search backend error: {0}")]
    Backend(String),

    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// A ranked search over course content.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub course_name: Option<String>,
    pub lesson_number: Option<u32>,
    /// Overrides the backend's default result count.
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            course_name: None,
            lesson_number: None,
            limit: None,
        }
    }

    pub fn in_course(mut self, course_name: impl Into<String>) -> Self {
        self.course_name = Some(course_name.into());
        self
    }

    pub fn in_lesson(mut self, lesson_number: u32) -> Self {
        self.lesson_number = Some(lesson_number);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ranked piece of course text.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub lesson_link: Option<String>,
    pub score: f32,
}

/// Search capability consumed by the course tools.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Ranked search, best match first.
    ///
    /// Fails with [`SearchError::NotFound`] when a course filter matches no
    /// known course.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;

    /// Title, link, instructor and lessons of the course best matching `course_name`.
    async fn course_outline(&self, course_name: &str) -> Result<Course>;
}

/// In-process [`SearchBackend`] over a course catalog.
///
/// # Thread Safety
///
/// All state sits behind async locks, so one index can be shared through an
/// `Arc` by every tool and query.
pub struct CourseIndex {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    courses: RwLock<Vec<Course>>,
    max_results: usize,
}

impl CourseIndex {
    /// Creates an empty index backed by a [`MemoryStore`].
    pub fn new(embedder: Embedder, max_results: usize) -> Self {
        Self::with_store(embedder, Arc::new(MemoryStore::new()), max_results)
    }

    pub fn with_store(embedder: Embedder, store: Arc<dyn VectorStore>, max_results: usize) -> Self {
        Self {
            embedder,
            store,
            courses: RwLock::new(Vec::new()),
            max_results,
        }
    }

    /// Embeds and stores every chunk of a course.
    ///
    /// Courses already present (same title) are skipped. The course list
    /// stays write-locked until the chunks are stored, so concurrent loads
    /// of one course index it once.
    ///
    /// # Returns
    ///
    /// The number of chunks stored.
    pub async fn add_course(&self, entry: &CatalogCourse) -> Result<usize> {
        let mut courses = self.courses.write().await;
        if courses.iter().any(|c| c.title == entry.title) {
            debug!(course = %entry.title, "Course already indexed, skipping");
            return Ok(0);
        }

        let mut documents = Vec::new();
        for lesson in &entry.lessons {
            let texts: Vec<&str> = lesson.chunks.iter().map(String::as_str).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            for (idx, (content, embedding)) in lesson.chunks.iter().zip(embeddings).enumerate() {
                let mut doc = Document::new(
                    format!("{}_{}_{}", entry.title, lesson.number, idx),
                    content.clone(),
                    embedding,
                )
                .with_metadata(META_COURSE_TITLE, entry.title.clone())
                .with_metadata(META_LESSON_NUMBER, lesson.number.to_string());
                if let Some(link) = &lesson.link {
                    doc = doc.with_metadata(META_LESSON_LINK, link.clone());
                }
                documents.push(doc);
            }
        }

        let stored = documents.len();
        self.store
            .add(documents)
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;
        courses.push(entry.course());

        info!(course = %entry.title, chunks = stored, "Indexed course");
        Ok(stored)
    }

    /// Adds every course of a catalog, returning the number of chunks stored.
    pub async fn load_catalog(&self, catalog: &Catalog) -> Result<usize> {
        let mut total = 0;
        for course in &catalog.courses {
            total += self.add_course(course).await?;
        }
        Ok(total)
    }

    pub async fn course_count(&self) -> usize {
        self.courses.read().await.len()
    }

    pub async fn course_titles(&self) -> Vec<String> {
        self.courses
            .read()
            .await
            .iter()
            .map(|course| course.title.clone())
            .collect()
    }

    /// Number of stored chunks.
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store
            .count()
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))
    }

    /// Resolves a user-supplied course name to a known course.
    ///
    /// Exact (case-insensitive) title matches win over partial ones; among
    /// partial matches the first indexed course wins.
    async fn resolve_course(&self, name: &str) -> Result<Course> {
        let needle = name.trim().to_lowercase();
        let courses = self.courses.read().await;

        courses
            .iter()
            .find(|course| course.title.to_lowercase() == needle)
            .or_else(|| {
                courses
                    .iter()
                    .find(|course| !needle.is_empty() && course.title.to_lowercase().contains(&needle))
            })
            .cloned()
            .ok_or_else(|| SearchError::NotFound(format!("No course found matching '{}'", name)))
    }
}

#[async_trait]
impl SearchBackend for CourseIndex {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let mut filter = MetadataFilter::new();
        if let Some(name) = &query.course_name {
            let course = self.resolve_course(name).await?;
            filter = filter.eq(META_COURSE_TITLE, course.title);
        }
        if let Some(lesson) = query.lesson_number {
            filter = filter.eq(META_LESSON_NUMBER, lesson.to_string());
        }

        let embedding = self.embedder.embed(&query.text).await?;
        let limit = query.limit.unwrap_or(self.max_results);

        let results = self
            .store
            .search(&embedding, limit, &filter)
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;

        debug!(query = %query.text, hits = results.len(), "Course search complete");

        Ok(results
            .into_iter()
            .map(|result| {
                let doc = result.document;
                SearchHit {
                    course_title: doc.meta(META_COURSE_TITLE).unwrap_or("unknown").to_string(),
                    lesson_number: doc.meta(META_LESSON_NUMBER).and_then(|n| n.parse().ok()),
                    lesson_link: doc.meta(META_LESSON_LINK).map(str::to_string),
                    content: doc.content,
                    score: result.score,
                }
            })
            .collect())
    }

    async fn course_outline(&self, course_name: &str) -> Result<Course> {
        self.resolve_course(course_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ModelReply, Provider, ProviderError};

    /// Embeds text as keyword counts so similarity is predictable.
    struct KeywordProvider;

    const KEYWORDS: [&str; 4] = ["rust", "python", "data", "graphs"];

    #[async_trait]
    impl Provider for KeywordProvider {
        async fn generate(&self, _request: ChatRequest) -> crate::provider::Result<ModelReply> {
            Err(ProviderError::Other("not used".to_string()))
        }

        async fn embed(&self, text: &str, _model: &str) -> crate::provider::Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(KEYWORDS
                .iter()
                .map(|k| lower.matches(k).count() as f32 + 0.01)
                .collect())
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_json(
            r#"{"courses": [
                {"title": "Rust Fundamentals", "link": "https://c/rust", "instructor": "Ferris",
                 "lessons": [
                    {"number": 1, "title": "Ownership", "link": "https://c/rust/1", "chunks": ["rust ownership rust borrowing"]},
                    {"number": 4, "title": "Data Structures", "link": "https://c/rust/4", "chunks": ["rust data structures data vectors"]}
                 ]},
                {"title": "Python Basics",
                 "lessons": [
                    {"number": 4, "title": "Data Structures", "chunks": ["python data structures data lists"]}
                 ]}
            ]}"#,
        )
        .unwrap()
    }

    async fn index() -> CourseIndex {
        let index = CourseIndex::new(Embedder::new(Arc::new(KeywordProvider), "kw"), 5);
        assert_eq!(index.load_catalog(&catalog()).await.unwrap(), 3);
        index
    }

    #[tokio::test]
    async fn test_reloading_course_is_skipped() {
        let index = index().await;
        assert_eq!(index.load_catalog(&catalog()).await.unwrap(), 0);
        assert_eq!(index.course_count().await, 2);
        assert_eq!(index.chunk_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_loads_index_course_once() {
        let index = CourseIndex::new(Embedder::new(Arc::new(KeywordProvider), "kw"), 5);
        let catalog = catalog();

        let (first, second) = tokio::join!(index.load_catalog(&catalog), index.load_catalog(&catalog));

        assert_eq!(first.unwrap() + second.unwrap(), 3);
        assert_eq!(index.course_count().await, 2);
        assert_eq!(index.chunk_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_search_across_courses() {
        let index = index().await;
        let hits = index.search(&SearchQuery::new("data structures")).await.unwrap();

        assert_eq!(hits.len(), 3);
        let titles: Vec<&str> = hits.iter().map(|h| h.course_title.as_str()).collect();
        assert!(titles.contains(&"Rust Fundamentals"));
        assert!(titles.contains(&"Python Basics"));
    }

    #[tokio::test]
    async fn test_search_with_course_and_lesson_filter() {
        let index = index().await;
        let hits = index
            .search(&SearchQuery::new("data").in_course("rust").in_lesson(4))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].course_title, "Rust Fundamentals");
        assert_eq!(hits[0].lesson_number, Some(4));
        assert_eq!(hits[0].lesson_link.as_deref(), Some("https://c/rust/4"));
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let index = index().await;
        let err = index
            .search(&SearchQuery::new("data").in_course("Haskell"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NotFound(msg) if msg.contains("Haskell")));
    }

    #[tokio::test]
    async fn test_limit_caps_results() {
        let index = index().await;
        let hits = index
            .search(&SearchQuery::new("data").with_limit(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_outline_prefers_exact_title() {
        let index = index().await;
        let course = index.course_outline("python basics").await.unwrap();
        assert_eq!(course.title, "Python Basics");
        assert_eq!(course.lessons.len(), 1);

        let course = index.course_outline("Fundamentals").await.unwrap();
        assert_eq!(course.instructor.as_deref(), Some("Ferris"));
    }
}
