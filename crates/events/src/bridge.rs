//! Synchronous fan-out from the engine worker to registered listeners.

use crate::{GenerationEvent, ModelState, Role};
use std::sync::{Arc, Mutex};

/// Handler set registered by a consumer. Every handler is optional.
///
/// Handlers run on the emitting thread, in registration order.
#[derive(Default)]
pub struct GenerationListeners {
    pub on_token: Option<Box<dyn Fn(&str) + Send + Sync>>,
    pub on_partial: Option<Box<dyn Fn(&str) + Send + Sync>>,
    pub on_prompt_processed: Option<Box<dyn Fn(u32, Role, f32) + Send + Sync>>,
    pub on_response: Option<Box<dyn Fn(&str) + Send + Sync>>,
    pub on_model_state: Option<Box<dyn Fn(&ModelState) + Send + Sync>>,
    pub on_error: Option<Box<dyn Fn(&str, i32) + Send + Sync>>,
    /// Fires immediately after `on_response`, carrying the last recorded
    /// generation speed. The two always arrive as a pair, response first.
    pub on_end_of_stream: Option<Box<dyn Fn(bool, f32) + Send + Sync>>,
}

impl std::fmt::Debug for GenerationListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationListeners")
            .field("on_token", &self.on_token.is_some())
            .field("on_partial", &self.on_partial.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_end_of_stream", &self.on_end_of_stream.is_some())
            .finish_non_exhaustive()
    }
}

/// Single-producer event bridge with a retained model-state snapshot.
///
/// Exactly one producer context (the engine worker) calls [`emit`];
/// listeners register from anywhere. The listener list is snapshotted
/// before each fan-out, so a handler may register further listeners
/// without deadlocking — the new set only sees subsequent events.
///
/// [`emit`]: EventBridge::emit
#[derive(Debug, Default)]
pub struct EventBridge {
    listeners: Mutex<Vec<Arc<GenerationListeners>>>,
    state: Mutex<ModelState>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener set. Delivery follows registration order.
    pub fn register(&self, listeners: GenerationListeners) {
        self.listeners.lock().unwrap().push(Arc::new(listeners));
    }

    /// Number of registered listener sets.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Clone of the retained model-state snapshot.
    pub fn model_state(&self) -> ModelState {
        self.state.lock().unwrap().clone()
    }

    /// Fan an event out to every registered listener.
    ///
    /// `ModelStateChanged` replaces the retained snapshot before any
    /// handler runs, so a handler reading [`model_state`] sees the new
    /// state. `ResponseGenerated` is always followed by the end-of-stream
    /// signal carrying the snapshot's last recorded speed.
    ///
    /// [`model_state`]: EventBridge::model_state
    pub fn emit(&self, event: GenerationEvent) {
        if let GenerationEvent::ModelStateChanged { state } = &event {
            *self.state.lock().unwrap() = state.clone();
        }

        let listeners: Vec<Arc<GenerationListeners>> =
            self.listeners.lock().unwrap().clone();

        match &event {
            GenerationEvent::TokenGenerated { text } => {
                for l in &listeners {
                    if let Some(f) = &l.on_token {
                        f(text);
                    }
                }
            }
            GenerationEvent::PartialGenerated { text } => {
                for l in &listeners {
                    if let Some(f) = &l.on_partial {
                        f(text);
                    }
                }
            }
            GenerationEvent::PromptProcessed {
                tokens_processed,
                role,
                speed,
            } => {
                for l in &listeners {
                    if let Some(f) = &l.on_prompt_processed {
                        f(*tokens_processed, *role, *speed);
                    }
                }
            }
            GenerationEvent::ResponseGenerated { text } => {
                let speed = self.state.lock().unwrap().last_token_generation_speed;
                for l in &listeners {
                    if let Some(f) = &l.on_response {
                        f(text);
                    }
                }
                for l in &listeners {
                    if let Some(f) = &l.on_end_of_stream {
                        f(true, speed);
                    }
                }
            }
            GenerationEvent::ModelStateChanged { state } => {
                for l in &listeners {
                    if let Some(f) = &l.on_model_state {
                        f(state);
                    }
                }
            }
            GenerationEvent::Error { message, code } => {
                tracing::warn!(code, message = %message, "engine error event");
                for l in &listeners {
                    if let Some(f) = &l.on_error {
                        f(message, *code);
                    }
                }
            }
        }
    }
}

/// Captures every delivered event for later inspection.
///
/// Test helper: build the handler set with [`listeners`] and register it,
/// then assert on [`events`] / [`end_of_stream`].
///
/// [`listeners`]: RecordingListeners::listeners
/// [`events`]: RecordingListeners::events
/// [`end_of_stream`]: RecordingListeners::end_of_stream
#[derive(Debug, Clone, Default)]
pub struct RecordingListeners {
    events: Arc<Mutex<Vec<GenerationEvent>>>,
    end_of_stream: Arc<Mutex<Vec<(bool, f32)>>>,
}

impl RecordingListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler set that records every event kind.
    pub fn listeners(&self) -> GenerationListeners {
        let events = &self.events;
        let record = |events: &Arc<Mutex<Vec<GenerationEvent>>>| {
            let events = Arc::clone(events);
            move |event: GenerationEvent| events.lock().unwrap().push(event)
        };

        let on_token = record(events);
        let on_partial = record(events);
        let on_prompt = record(events);
        let on_response = record(events);
        let on_state = record(events);
        let on_error = record(events);
        let eos = Arc::clone(&self.end_of_stream);

        GenerationListeners {
            on_token: Some(Box::new(move |text| {
                on_token(GenerationEvent::TokenGenerated {
                    text: text.to_string(),
                })
            })),
            on_partial: Some(Box::new(move |text| {
                on_partial(GenerationEvent::PartialGenerated {
                    text: text.to_string(),
                })
            })),
            on_prompt_processed: Some(Box::new(move |tokens_processed, role, speed| {
                on_prompt(GenerationEvent::PromptProcessed {
                    tokens_processed,
                    role,
                    speed,
                })
            })),
            on_response: Some(Box::new(move |text| {
                on_response(GenerationEvent::ResponseGenerated {
                    text: text.to_string(),
                })
            })),
            on_model_state: Some(Box::new(move |state| {
                on_state(GenerationEvent::ModelStateChanged {
                    state: state.clone(),
                })
            })),
            on_error: Some(Box::new(move |message, code| {
                on_error(GenerationEvent::Error {
                    message: message.to_string(),
                    code,
                })
            })),
            on_end_of_stream: Some(Box::new(move |success, speed| {
                eos.lock().unwrap().push((success, speed))
            })),
        }
    }

    /// All recorded events, in delivery order.
    pub fn events(&self) -> Vec<GenerationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// All recorded end-of-stream signals.
    pub fn end_of_stream(&self) -> Vec<(bool, f32)> {
        self.end_of_stream.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.end_of_stream.lock().unwrap().clear();
    }
}
