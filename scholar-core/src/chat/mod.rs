//! Question answering with tool-augmented LLM rounds.
//!
//! # Architecture
//!
//! - [`Engine`] runs the bounded round loop for one query: it sends the
//!   conversation to the model, executes requested tools through a
//!   [`CallTracker`](crate::tracker::CallTracker), and folds the results
//!   back in until the model answers or the round budget is spent.
//! - [`ChatManager`] wraps the engine with session history and builds a
//!   fresh tracker per query.
//! - [`Observer`] receives structured [`EngineEvent`]s; the default
//!   [`TracingObserver`] forwards them to `tracing`.
//!
//! # Tool Calling Flow
//!
//! ```text
//! User Query → LLM (tools offered) → Tool Calls?
//!                 ↓                      ↓
//!              Answer              Execute all calls
//!                                        ↓
//!                          LLM with results (next round)
//!                                        ↓
//!                   round limit → LLM without tools → Answer
//! ```
//!
//! Old tool results are replaced by a short marker when the conversation
//! grows past the configured character ceiling.

mod context;
mod engine;
mod manager;
mod observer;

pub use engine::{Engine, EngineError, EngineSettings, Outcome, Termination, FINAL_ROUND_PROMPT};
pub use manager::{ChatManager, QueryResponse};
pub use observer::{EngineEvent, Observer, RecordingObserver, TracingObserver};
