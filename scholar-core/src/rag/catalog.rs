//! Pre-chunked course material, as handed over by the ingestion pipeline.
//!
//! The catalog is a JSON document:
//!
//! ```text
//! { "courses": [ { "title": "...", "link": "...", "instructor": "...",
//!                  "lessons": [ { "number": 1, "title": "...", "link": "...",
//!                                 "chunks": ["...", "..."] } ] } ] }
//! ```

use super::types::{Course, Lesson};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub courses: Vec<CatalogCourse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCourse {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<CatalogLesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLesson {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub chunks: Vec<String>,
}

impl Catalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn chunk_count(&self) -> usize {
        self.courses
            .iter()
            .flat_map(|course| &course.lessons)
            .map(|lesson| lesson.chunks.len())
            .sum()
    }
}

impl CatalogCourse {
    /// The course metadata without its text.
    pub fn course(&self) -> Course {
        Course {
            title: self.title.clone(),
            link: self.link.clone(),
            instructor: self.instructor.clone(),
            lessons: self
                .lessons
                .iter()
                .map(|lesson| Lesson {
                    number: lesson.number,
                    title: lesson.title.clone(),
                    link: lesson.link.clone(),
                })
                .collect(),
        }
    }
}
