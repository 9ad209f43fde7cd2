use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const META_COURSE_TITLE: &str = "course_title";
pub const META_LESSON_NUMBER: &str = "lesson_number";
pub const META_LESSON_LINK: &str = "lesson_link";

/// A chunk of course text stored in the vector database.
///
/// Each document carries the original text, its embedding for similarity
/// search, and metadata naming the course and lesson it came from.
///
/// # Example
///
/// ```no_run
/// # use scholar_core::rag::Document;
/// let doc = Document::new("intro_0", "Variables hold values", vec![0.1, 0.2, 0.3])
///     .with_metadata("course_title", "Intro to Rust")
///     .with_metadata("lesson_number", "1");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A search result containing a document and its similarity score.
///
/// Returned by vector search operations, ordered by descending similarity score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

/// Equality constraints on document metadata. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: Vec<(String, String)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| document.meta(key) == Some(value.as_str()))
    }
}

/// A course and its lessons, as known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.number == number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_filter() {
        let doc = Document::new("1", "text", vec![])
            .with_metadata(META_COURSE_TITLE, "Course X")
            .with_metadata(META_LESSON_NUMBER, "4");

        assert!(MetadataFilter::new().matches(&doc));
        assert!(MetadataFilter::new().eq(META_COURSE_TITLE, "Course X").matches(&doc));
        assert!(MetadataFilter::new()
            .eq(META_COURSE_TITLE, "Course X")
            .eq(META_LESSON_NUMBER, "4")
            .matches(&doc));
        assert!(!MetadataFilter::new().eq(META_LESSON_NUMBER, "5").matches(&doc));
        assert!(!MetadataFilter::new().eq(META_LESSON_LINK, "x").matches(&doc));
    }
}
