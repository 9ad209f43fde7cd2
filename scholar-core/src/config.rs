use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant specialized in course materials and educational content with access to search tools for course information.

Search Tool Usage:
- Use the content search tool for questions about specific course content or detailed educational materials
- Use the outline tool for questions about a course's structure, lesson list or instructor
- You may make up to 2 sequential searches to build comprehensive answers
- Start with broad searches, then refine based on results for more targeted information
- Synthesize search results into accurate, fact-based responses
- If searches yield no results, state this clearly

Response Protocol:
- General knowledge questions: answer using existing knowledge without searching
- Course-specific questions: search first, then answer
- Provide direct answers only, with no reasoning process or search explanations
- Do not mention \"based on the search results\"

All responses must be educational, clear, example-supported where it aids understanding, and well-structured.";

/// Configuration for the whole assistant.
///
/// Every section falls back to its defaults when missing from the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Configuration for the AI model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Configuration for retrieval over the course index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub embedding_model: String,
    /// Number of hits returned by a single search call
    pub max_results: usize,
    /// JSON catalog of pre-chunked course material
    pub catalog_path: String,
}

/// Limits for the tool-calling round loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of model rounds that may request tools
    pub max_rounds: usize,
    /// Character ceiling for the prompt context before old tool results are pruned
    pub max_context_chars: usize,
    /// Length of the result summary kept in each tool call record
    pub summary_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of (query, answer) exchanges remembered per session
    pub max_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            system_prompt: default_system_prompt(),
            rag: RagConfig::default(),
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:4b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.0,
            max_tokens: 800,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: "nomic-embed-text".to_string(),
            max_results: 5,
            catalog_path: "./data/catalog.json".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 2,
            max_context_chars: 15_000,
            summary_chars: 200,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_history: 2 }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }
}
