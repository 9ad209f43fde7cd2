//! scholar - Course assistant with sequential tool calling
//!
//! This is the convenience wrapper crate that re-exports scholar components
//! with optional feature flags for easy usage.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! scholar = "0.1"  # Includes core + course tools by default
//! ```
//!
//! # Features
//!
//! - `std` (default): Include the built-in course tools

// Re-export core
pub use scholar_core::*;
pub use scholar_tool;

// Re-export course tools if feature is enabled
#[cfg(feature = "std")]
pub use scholar_std;

/// Prelude module for convenient imports
pub mod prelude {
    pub use scholar_core::*;
    pub use scholar_tool::{Source, Tool, ToolError, ToolOutput, ToolRegistry, ToolSpec};

    #[cfg(feature = "std")]
    pub use scholar_std::{register_course_tools, CourseOutlineTool, CourseSearchTool};
}
