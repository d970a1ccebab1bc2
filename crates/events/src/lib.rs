//! Generation event contracts and the engine-to-consumer bridge.
//!
//! The background inference worker is the only producer; consumers
//! register a listener set and receive events synchronously on the
//! worker's thread. Handlers that need another execution context
//! re-dispatch themselves — the bridge never marshals.

mod bridge;
mod text;

pub use bridge::{EventBridge, GenerationListeners, RecordingListeners};
pub use text::{is_sentence_ending, last_sentence};

use serde::{Deserialize, Serialize};

/// Speaker role for a templated chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

/// One committed turn in the structured chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Snapshot of the engine-side model state.
///
/// Replaced wholesale on every `ModelStateChanged`, never mutated field by
/// field, so readers always observe a consistent snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelState {
    pub is_model_loaded: bool,
    /// Raw context text as the engine sees it.
    pub context_history: String,
    /// Structured turn list.
    pub chat_history: Vec<ChatTurn>,
    /// Tokens per second measured during the most recent generation.
    pub last_token_generation_speed: f32,
}

/// Asynchronous notification from the inference worker.
///
/// Fire-and-forget: events are not queued or replayed, and a listener
/// registered after an event fired never sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// A single decoded token.
    TokenGenerated { text: String },
    /// A partial flush up to a sentence separator.
    PartialGenerated { text: String },
    /// Prompt ingestion finished.
    PromptProcessed {
        tokens_processed: u32,
        role: Role,
        speed: f32,
    },
    /// The full response for the generation cycle that just ended.
    ResponseGenerated { text: String },
    /// The retained model state was replaced.
    ModelStateChanged { state: ModelState },
    /// A non-fatal engine failure.
    Error { message: String, code: i32 },
}
