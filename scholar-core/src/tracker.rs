//! Per-query execution of tool calls.
//!
//! The [`CallTracker`] sits between the round loop and the [`ToolRegistry`].
//! It runs the calls the model asked for, keeps an ordered record of every
//! call made while answering one query, and gathers the sources those calls
//! produced into a deduplicated, first-seen-ordered list.
//!
//! Failures never escape as `Err`: a missing tool or a failing backend is
//! returned as a [`ToolResult`] whose outcome is the error, and is recorded
//! like any other call.

use crate::provider::ToolCall;
use futures::future::join_all;
use scholar_tool::{Source, ToolError, ToolOutput, ToolRegistry};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

const DEFAULT_SUMMARY_CHARS: usize = 200;

/// The outcome of one tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool: String,
    pub outcome: Result<ToolOutput, ToolError>,
    pub duration: Duration,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Text handed back to the model for this call.
    pub fn content(&self) -> String {
        match &self.outcome {
            Ok(output) => output.content.clone(),
            Err(e) => format!("Error executing tool: {}", e),
        }
    }

    pub fn sources(&self) -> &[Source] {
        match &self.outcome {
            Ok(output) => &output.sources,
            Err(_) => &[],
        }
    }
}

/// What a recorded call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Leading part of the tool's output.
    Success { summary: String },
    Failure { error: String },
}

/// One entry of the per-query call history.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Model round the call belonged to, starting at 1.
    pub round: usize,
    pub tool: String,
    pub parameters: Value,
    pub timestamp: SystemTime,
    pub duration: Duration,
    pub outcome: CallOutcome,
}

impl ToolCallRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success { .. })
    }
}

/// Executes tool calls for a single query and remembers what happened.
///
/// One tracker belongs to one in-flight query. Call [`reset`](Self::reset)
/// before reusing it for another query.
pub struct CallTracker {
    registry: Arc<ToolRegistry>,
    history: Vec<ToolCallRecord>,
    sources: Vec<Source>,
    seen: HashSet<Source>,
    round: usize,
    summary_chars: usize,
}

impl CallTracker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            history: Vec::new(),
            sources: Vec::new(),
            seen: HashSet::new(),
            round: 0,
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }

    pub fn with_summary_chars(mut self, summary_chars: usize) -> Self {
        self.summary_chars = summary_chars;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Clears history, sources and the round counter. Idempotent.
    pub fn reset(&mut self) {
        self.history.clear();
        self.sources.clear();
        self.seen.clear();
        self.round = 0;
    }

    /// Executes a single call as a round of its own.
    pub async fn execute(&mut self, name: &str, parameters: Value) -> ToolResult {
        self.round += 1;
        let result = run_call(&self.registry, name, parameters.clone()).await;
        self.record(name, parameters, &result);
        result
    }

    /// Executes every call the model requested in one round.
    ///
    /// Calls run concurrently; results and records come back in request order.
    pub async fn execute_round(&mut self, calls: &[ToolCall]) -> Vec<ToolResult> {
        self.round += 1;

        let registry = Arc::clone(&self.registry);
        let results = join_all(calls.iter().map(|call| {
            run_call(
                &registry,
                &call.function.name,
                call.function.arguments.clone(),
            )
        }))
        .await;

        for (call, result) in calls.iter().zip(&results) {
            self.record(&call.function.name, call.function.arguments.clone(), result);
        }

        results
    }

    /// Sources gathered so far, deduplicated, in first-seen order.
    pub fn get_all_sources(&self) -> Vec<Source> {
        self.sources.clone()
    }

    pub fn get_call_history(&self) -> Vec<ToolCallRecord> {
        self.history.clone()
    }

    /// Number of rounds executed since the last reset.
    pub fn rounds(&self) -> usize {
        self.round
    }

    fn record(&mut self, name: &str, parameters: Value, result: &ToolResult) {
        let outcome = match &result.outcome {
            Ok(output) => CallOutcome::Success {
                summary: truncate_chars(&output.content, self.summary_chars),
            },
            Err(e) => CallOutcome::Failure {
                error: e.to_string(),
            },
        };

        for source in result.sources() {
            if self.seen.insert(source.clone()) {
                self.sources.push(source.clone());
            }
        }

        self.history.push(ToolCallRecord {
            round: self.round,
            tool: name.to_string(),
            parameters,
            timestamp: SystemTime::now(),
            duration: result.duration,
            outcome,
        });
    }
}

/// Numbered listing of `history`, one line per call, failures flagged.
pub fn summarize_calls(history: &[ToolCallRecord], source_count: usize) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut lines = vec![format!("Executed {} tool call(s):", history.len())];
    for (i, record) in history.iter().enumerate() {
        let mut line = format!("{}. {}", i + 1, record.tool);
        if let Some(query) = record.parameters.get("query").and_then(Value::as_str) {
            line.push_str(&format!(" - '{}'", query));
        }
        if let Some(course) = record.parameters.get("course_name").and_then(Value::as_str) {
            line.push_str(&format!(" (course: {})", course));
        }
        if let Some(lesson) = record.parameters.get("lesson_number") {
            line.push_str(&format!(" (lesson: {})", lesson));
        }
        if let CallOutcome::Failure { error } = &record.outcome {
            line.push_str(&format!(" [failed: {}]", error));
        }
        lines.push(line);
    }
    lines.push(format!("Sources from {} locations", source_count));

    lines.join("\n")
}

async fn run_call(registry: &ToolRegistry, name: &str, parameters: Value) -> ToolResult {
    let started = Instant::now();
    let outcome = registry.invoke(name, parameters).await;
    ToolResult {
        tool: name.to_string(),
        outcome,
        duration: started.elapsed(),
    }
}

/// Cuts `text` to at most `max` characters, marking the cut with "...".
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
