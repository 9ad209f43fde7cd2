use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error("Tool '{0}' is already registered")]
    Duplicate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Description of a tool as offered to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// An attributable origin backing part of an answer.
///
/// Two sources are the same when `document` and `location` match; the link
/// is carried along but ignored for equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub document: String,
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Source {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            location: None,
            link: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document && self.location == other.location
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document.hash(state);
        self.location.hash(state);
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} - {}", self.document, location),
            None => write!(f, "{}", self.document),
        }
    }
}

/// Output from tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Core trait that all tools must implement.
///
/// From the LLM's perspective these are the functions it may call while
/// answering a question. Each tool is typically a thin wrapper over a search
/// capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique identifier for this tool.
    /// This is what the LLM will use to call it.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    /// Included in the LLM prompt to help it decide when to call the tool.
    fn description(&self) -> &str;

    /// JSON schema defining the tool's parameters.
    fn parameter_schema(&self) -> Value;

    /// Execute the tool with given input parameters.
    /// The input should match the parameter schema.
    async fn execute(&self, input: Value) -> Result<ToolOutput>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameter_schema(),
        }
    }
}
