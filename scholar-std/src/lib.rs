//! Built-in course tools for scholar
//!
//! Tools that work against any [`SearchBackend`](scholar_core::rag::SearchBackend):
//! - Content search with course and lesson filters
//! - Course outlines

mod outline;
mod search;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

use scholar_core::rag::SearchBackend;
use scholar_tool::{ToolError, ToolRegistry};
use std::sync::Arc;

/// Registers every built-in course tool against `backend`.
pub fn register_course_tools(
    registry: &mut ToolRegistry,
    backend: Arc<dyn SearchBackend>,
) -> Result<(), ToolError> {
    registry.register(Arc::new(CourseSearchTool::new(Arc::clone(&backend))))?;
    registry.register(Arc::new(CourseOutlineTool::new(backend)))?;
    Ok(())
}
