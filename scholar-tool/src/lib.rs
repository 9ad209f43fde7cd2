mod registry;
mod tool;

pub use registry::ToolRegistry;
pub use tool::{Result, Source, Tool, ToolError, ToolOutput, ToolSpec};
