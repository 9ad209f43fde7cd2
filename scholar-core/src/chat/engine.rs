//! The sequential tool-calling round loop.
//!
//! ```text
//!            ┌──────────────── round r < max_rounds ───────────────┐
//!            ▼                                                     │
//!      AwaitingModel ── tool calls ──► ExecutingTools ─────────────┘
//!        │      │                            │
//!        │      └─ final answer ─► Done      └─ r == max_rounds ─► forced final
//!        │                                                         (no tools) ─► Done
//!        └─ model error ─► Done (partial) if results were gathered, else Failed
//! ```
//!
//! Every round sends the system prompt, the session history and the turns
//! accumulated so far. Tool results are folded back as one `tool` turn per
//! call, in the order the model asked for them, failures included.

use super::context::{context_chars, prune_tool_results, PruneReport};
use super::observer::{EngineEvent, Observer, TracingObserver};
use crate::config::Config;
use crate::provider::{ChatRequest, Message, ModelReply, Provider, ProviderError, Tool};
use crate::session::{format_exchanges, Exchange};
use crate::tracker::{CallTracker, ToolCallRecord};
use scholar_tool::Source;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Sent as a user turn before the tools-disabled invocation that closes a
/// query once the round budget is spent.
pub const FINAL_ROUND_PROMPT: &str = "You have reached the limit on searches for this question. \
Answer the original question now, using only the information gathered above. \
Do not request any further searches.";

const PARTIAL_PREFIX: &str = "I encountered an error during my search, but here's what I found:";
const ROUND_LIMIT_PREFIX: &str = "Reached maximum search rounds. Based on my searches:";
const NO_ANSWER: &str = "I completed my searches but was unable to generate a final response.";
const PARTIAL_RESULT_LIMIT: usize = 3;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model invocation failed in round {round}: {source}")]
    ModelInvocation {
        round: usize,
        #[source]
        source: ProviderError,
    },
}

impl EngineError {
    /// Message that is safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ModelInvocation { .. } => {
                "I encountered an error while searching. Please try rephrasing your question."
                    .to_string()
            }
        }
    }
}

/// Why a query stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without asking for (more) tools.
    Answered,
    /// The round budget ran out and the tools-disabled invocation answered.
    RoundLimit,
    /// Synthesized from gathered tool results after the model could not answer.
    Partial,
}

/// Result of a completed query.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub answer: String,
    pub sources: Vec<Source>,
    pub termination: Termination,
    /// Rounds in which tools were executed.
    pub rounds: usize,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl Outcome {
    pub fn is_partial(&self) -> bool {
        self.termination == Termination::Partial
    }
}

/// Model and limit settings used by the [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub max_rounds: usize,
    pub max_context_chars: usize,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            system_prompt: config.system_prompt.clone(),
            max_rounds: config.engine.max_rounds,
            max_context_chars: config.engine.max_context_chars,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Transient state of one query's loop.
struct RoundState {
    round: usize,
    remaining: usize,
    turns: Vec<Message>,
    /// Index of the first turn of the latest tool round.
    latest_round_start: usize,
    /// Full text of every successful tool result, in arrival order.
    gathered: Vec<String>,
}

impl RoundState {
    fn new(query: &str, max_rounds: usize) -> Self {
        Self {
            round: 0,
            remaining: max_rounds,
            turns: vec![Message::user(query)],
            latest_round_start: 1,
            gathered: Vec::new(),
        }
    }

    fn begin_round(&mut self) -> usize {
        self.round += 1;
        self.remaining -= 1;
        self.round
    }

    fn partial_answer(&self, prefix: &str) -> Option<String> {
        if self.gathered.is_empty() {
            return None;
        }
        let found: Vec<&str> = self
            .gathered
            .iter()
            .take(PARTIAL_RESULT_LIMIT)
            .map(String::as_str)
            .collect();
        Some(format!("{} {}", prefix, found.join("\n\n")))
    }
}

/// Drives one query from the user's question to a single attributed answer.
///
/// The engine itself is stateless between queries; everything a query
/// accumulates lives in a [`RoundState`] and in the caller's [`CallTracker`].
pub struct Engine {
    provider: Arc<dyn Provider>,
    observer: Arc<dyn Observer>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(provider: Arc<dyn Provider>, settings: EngineSettings) -> Self {
        Self {
            provider,
            observer: Arc::new(TracingObserver),
            settings,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Answers `query`, calling tools through `tracker` for up to
    /// `max_rounds` rounds.
    ///
    /// The tracker is reset before the loop starts and again once an
    /// answer has been produced.
    ///
    /// # Errors
    ///
    /// [`EngineError::ModelInvocation`] when the model fails before any
    /// tool call succeeded, so there is nothing to fall back on.
    pub async fn run(
        &self,
        query: &str,
        history: &[Exchange],
        tracker: &mut CallTracker,
    ) -> Result<Outcome, EngineError> {
        tracker.reset();

        let system = self.system_message(history);
        let tools: Vec<Tool> = tracker
            .registry()
            .list_specs()
            .into_iter()
            .map(Tool::from)
            .collect();
        let mut state = RoundState::new(query, self.settings.max_rounds);

        while state.remaining > 0 {
            let round = state.begin_round();
            let offered = (!tools.is_empty()).then(|| tools.clone());

            let reply = match self.invoke(&mut state, &system, offered).await {
                Ok(reply) => reply,
                Err(e) => return self.recover(e, round, &state, tracker),
            };

            let (content, calls) = match reply {
                ModelReply::Final(text) => {
                    return Ok(self.finish(text, Termination::Answered, tracker));
                }
                ModelReply::ToolCalls { content, calls } => (content, calls),
            };

            state.latest_round_start = state.turns.len();
            state
                .turns
                .push(Message::assistant_tool_calls(content, calls.clone()));

            let results = tracker.execute_round(&calls).await;
            let mut round_failed = false;
            for (call, result) in calls.iter().zip(results) {
                self.observer.on_event(&EngineEvent::ToolCompleted {
                    round,
                    tool: result.tool.clone(),
                    duration: result.duration,
                    success: result.is_success(),
                });

                let content = result.content();
                if result.is_success() {
                    state.gathered.push(content.clone());
                } else {
                    round_failed = true;
                }
                state.turns.push(Message::tool(&call.function.name, content));
            }

            // A failure after earlier rounds succeeded: answer with what we have.
            if round_failed && round > 1 {
                break;
            }

            let chars = context_chars(system.char_len(), &state.turns);
            if state.remaining > 0 && chars > self.settings.max_context_chars {
                self.observer
                    .on_event(&EngineEvent::ContextLimitReached { round, chars });
                break;
            }
        }

        self.force_final(&mut state, &system, tracker).await
    }

    /// The tools-disabled invocation that ends a query once rounds run out.
    async fn force_final(
        &self,
        state: &mut RoundState,
        system: &Message,
        tracker: &mut CallTracker,
    ) -> Result<Outcome, EngineError> {
        state.round += 1;
        let round = state.round;
        if tracker.rounds() > 0 {
            state.turns.push(Message::user(FINAL_ROUND_PROMPT));
        }

        // With a zero round budget this is the only call, and a plain answer.
        let answered = if tracker.rounds() > 0 {
            Termination::RoundLimit
        } else {
            Termination::Answered
        };

        match self.invoke(state, system, None).await {
            Ok(ModelReply::Final(text)) => Ok(self.finish(text, answered, tracker)),
            Ok(ModelReply::ToolCalls { content, .. }) if !content.trim().is_empty() => {
                Ok(self.finish(content, answered, tracker))
            }
            Ok(ModelReply::ToolCalls { .. }) => {
                let answer = state
                    .partial_answer(ROUND_LIMIT_PREFIX)
                    .unwrap_or_else(|| NO_ANSWER.to_string());
                Ok(self.finish(answer, Termination::Partial, tracker))
            }
            Err(e) => self.recover(e, round, state, tracker),
        }
    }

    /// Prunes the context, then sends one request to the model.
    async fn invoke(
        &self,
        state: &mut RoundState,
        system: &Message,
        tools: Option<Vec<Tool>>,
    ) -> Result<ModelReply, ProviderError> {
        let round = state.round;
        self.observer.on_event(&EngineEvent::RoundStarted {
            round,
            tools_offered: tools.is_some(),
        });

        let PruneReport { pruned, truncated, chars } = prune_tool_results(
            &mut state.turns,
            system.char_len(),
            self.settings.max_context_chars,
            state.latest_round_start,
        );
        if pruned + truncated > 0 {
            self.observer.on_event(&EngineEvent::ContextPruned {
                round,
                pruned_turns: pruned,
                truncated_turns: truncated,
                chars,
            });
        }

        let mut messages = Vec::with_capacity(state.turns.len() + 1);
        messages.push(system.clone());
        messages.extend(state.turns.iter().cloned());

        let mut request = ChatRequest::new(&self.settings.model, messages)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        request.tools = tools;

        let started = Instant::now();
        let reply = self.provider.generate(request).await?;

        let tool_calls = match &reply {
            ModelReply::Final(_) => 0,
            ModelReply::ToolCalls { calls, .. } => calls.len(),
        };
        self.observer.on_event(&EngineEvent::ModelReplied {
            round,
            tool_calls,
            duration: started.elapsed(),
        });

        Ok(reply)
    }

    /// Model failure: degrade to a partial answer if any tool result is
    /// usable, otherwise fail the query.
    fn recover(
        &self,
        error: ProviderError,
        round: usize,
        state: &RoundState,
        tracker: &mut CallTracker,
    ) -> Result<Outcome, EngineError> {
        self.observer.on_event(&EngineEvent::ModelFailed {
            round,
            error: error.to_string(),
        });

        match state.partial_answer(PARTIAL_PREFIX) {
            Some(answer) => Ok(self.finish(answer, Termination::Partial, tracker)),
            None => Err(EngineError::ModelInvocation {
                round,
                source: error,
            }),
        }
    }

    fn finish(&self, answer: String, termination: Termination, tracker: &mut CallTracker) -> Outcome {
        let outcome = Outcome {
            answer,
            sources: tracker.get_all_sources(),
            termination,
            rounds: tracker.rounds(),
            tool_calls: tracker.get_call_history(),
        };
        tracker.reset();

        self.observer.on_event(&EngineEvent::Finished {
            termination,
            rounds: outcome.rounds,
        });
        outcome
    }

    fn system_message(&self, history: &[Exchange]) -> Message {
        match format_exchanges(history) {
            Some(rendered) => Message::system(format!(
                "{}\n\nPrevious conversation:\n{}",
                self.settings.system_prompt, rendered
            )),
            None => Message::system(self.settings.system_prompt.clone()),
        }
    }
}
