//! Inference engine boundary and the background worker that hosts it.
//!
//! The engine itself is opaque: a blocking implementation of
//! [`InferenceEngine`] driven from a single dedicated thread. Everything
//! it has to say travels through the event bridge; nothing crosses the
//! boundary as an exception.

mod scripted;
mod worker;

pub use scripted::ScriptedEngine;
pub use worker::{EngineHandle, EngineWorker};

use murmur_events::{GenerationEvent, ModelState, Role};
use std::path::{Path, PathBuf};

/// Engine-side failure with a stable numeric code.
///
/// Codes travel through the error event channel; zero means success, so
/// every variant maps to a non-zero value.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("model failed to load: {0}")]
    LoadFailed(String),
    #[error("no model is loaded")]
    NoModelLoaded,
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

impl EngineError {
    /// Stable status code for the error event channel.
    pub fn code(&self) -> i32 {
        match self {
            Self::ModelNotFound(_) => 1,
            Self::LoadFailed(_) => 2,
            Self::NoModelLoaded => 3,
            Self::GenerationFailed(_) => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Parameters handed to the engine before loading.
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Resolved path of the model file to load.
    pub model_path: PathBuf,
    /// Separators that close a partial-sentence flush.
    pub partials_separators: Vec<String>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            partials_separators: vec![".".into(), "?".into(), "!".into()],
        }
    }
}

/// A templated prompt insertion.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub text: String,
    pub role: Role,
    /// Append the assistant begin-of-sequence marker after the turn.
    pub add_assistant_bos: bool,
    /// Generate a reply once the prompt is ingested.
    pub generate_reply: bool,
}

impl ChatPrompt {
    /// A user turn that expects a reply.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::User,
            add_assistant_bos: false,
            generate_reply: true,
        }
    }
}

/// Event sink handed to engine operations.
pub type EventSink<'a> = &'a dyn Fn(GenerationEvent);

/// The opaque inference engine, driven from its worker thread.
///
/// Every call arrives on the dedicated engine thread and may block.
/// Generation emits through the supplied sink as it progresses;
/// implementations refresh the state snapshot (`ModelStateChanged`)
/// before the terminal `ResponseGenerated` so the end-of-stream pair
/// carries the speed of the cycle that just finished.
pub trait InferenceEngine: Send {
    /// Load the model at `path`.
    fn load(&mut self, path: &Path, params: &EngineParams) -> Result<()>;

    /// Release the loaded model.
    fn unload(&mut self) -> Result<()>;

    /// Ingest a templated prompt and, when the prompt asks for it,
    /// generate the reply.
    fn insert_prompt(&mut self, prompt: &ChatPrompt, sink: EventSink) -> Result<()>;

    /// Ingest raw text without template wrapping.
    fn insert_raw(&mut self, text: &str, generate_reply: bool, sink: EventSink) -> Result<()>;

    /// Interrupt the current generation cycle.
    fn stop(&mut self);

    /// Continue a previously interrupted cycle.
    fn resume(&mut self, sink: EventSink) -> Result<()>;

    /// Clear the context, optionally keeping the system prompt.
    fn reset_context(&mut self, keep_system_prompt: bool);

    /// Drop the last assistant reply from the history.
    fn remove_last_reply(&mut self);

    /// Drop the last user input and anything it produced.
    fn remove_last_input(&mut self);

    /// Current state snapshot for the bridge.
    fn state(&self) -> ModelState;
}
