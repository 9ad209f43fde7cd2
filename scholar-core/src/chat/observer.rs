//! Structured events emitted by the round loop.

use super::engine::Termination;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RoundStarted {
        round: usize,
        tools_offered: bool,
    },
    ModelReplied {
        round: usize,
        /// Zero for a final answer.
        tool_calls: usize,
        duration: Duration,
    },
    ModelFailed {
        round: usize,
        error: String,
    },
    ToolCompleted {
        round: usize,
        tool: String,
        duration: Duration,
        success: bool,
    },
    ContextPruned {
        round: usize,
        pruned_turns: usize,
        truncated_turns: usize,
        chars: usize,
    },
    /// Tool rounds stopped early because the context outgrew the ceiling.
    ContextLimitReached {
        round: usize,
        chars: usize,
    },
    Finished {
        termination: Termination,
        rounds: usize,
    },
}

/// Receives engine events. Implementations must be cheap; they run inline.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::RoundStarted { round, tools_offered } => {
                debug!(round, tools_offered, "Starting round");
            }
            EngineEvent::ModelReplied { round, tool_calls, duration } => {
                info!(round, tool_calls, duration_ms = duration.as_millis() as u64, "Model replied");
            }
            EngineEvent::ModelFailed { round, error } => {
                warn!(round, error = %error, "Model invocation failed");
            }
            EngineEvent::ToolCompleted { round, tool, duration, success } => {
                info!(
                    round,
                    tool_name = %tool,
                    duration_ms = duration.as_millis() as u64,
                    success,
                    "Tool call completed"
                );
            }
            EngineEvent::ContextPruned { round, pruned_turns, truncated_turns, chars } => {
                warn!(
                    round,
                    pruned_turns,
                    truncated_turns,
                    chars,
                    "Pruned tool results to fit context"
                );
            }
            EngineEvent::ContextLimitReached { round, chars } => {
                warn!(round, chars, "Context limit reached, answering without more tools");
            }
            EngineEvent::Finished { termination, rounds } => {
                info!(?termination, rounds, "Query finished");
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
