//! Embedding-facing facade over assembly, the engine worker and the
//! event bridge.

use crate::{ModelPreparer, RuntimeConfig};
use murmur_engine::{ChatPrompt, EngineHandle, EngineParams, EngineWorker, InferenceEngine};
use murmur_events::{ChatTurn, EventBridge, GenerationListeners, Role};
use murmur_gates::{CompletionGate, ProcessingGate};
use std::sync::Arc;
use std::time::Duration;

/// Owns the whole subsystem: preparer, gates, bridge and engine worker.
///
/// Consumers register listeners once, kick off preparation, then drive
/// the engine through the non-blocking command methods. The only blocking
/// call is [`wait_for_completion`], and it takes a budget.
///
/// [`wait_for_completion`]: LlmSubsystem::wait_for_completion
pub struct LlmSubsystem {
    config: RuntimeConfig,
    bridge: Arc<EventBridge>,
    completion: Arc<CompletionGate>,
    processing: Arc<ProcessingGate>,
    preparer: ModelPreparer,
    handle: EngineHandle,
    // Joined on drop, after the handle stops feeding it.
    _worker: EngineWorker,
}

impl LlmSubsystem {
    /// Wire the subsystem around an engine implementation.
    pub fn new(config: RuntimeConfig, engine: Box<dyn InferenceEngine>) -> Self {
        let bridge = Arc::new(EventBridge::new());
        let completion = Arc::new(CompletionGate::new());
        let processing = Arc::new(ProcessingGate::new());
        let preparer = ModelPreparer::new(
            config.clone(),
            Arc::clone(&completion),
            Arc::clone(&processing),
        );
        let worker = EngineWorker::spawn(engine, Arc::clone(&bridge), Arc::clone(&processing));
        let handle = worker.handle();

        Self {
            config,
            bridge,
            completion,
            processing,
            preparer,
            handle,
            _worker: worker,
        }
    }

    /// Register a generation listener set.
    pub fn register_listeners(&self, listeners: GenerationListeners) {
        self.bridge.register(listeners);
    }

    /// Shared bridge, for consumers that read the retained snapshot
    /// directly.
    pub fn bridge(&self) -> Arc<EventBridge> {
        Arc::clone(&self.bridge)
    }

    /// Assemble any missing models on the worker pool.
    ///
    /// Must be called within a Tokio runtime. Completion is observable
    /// through [`wait_for_completion`] or [`assembly_counts`].
    ///
    /// [`wait_for_completion`]: LlmSubsystem::wait_for_completion
    /// [`assembly_counts`]: LlmSubsystem::assembly_counts
    pub fn prepare_models(&self) {
        self.preparer.prepare_all();
    }

    /// `(completed, total)` for the current assembly batch.
    pub fn assembly_counts(&self) -> (usize, usize) {
        self.completion.counts()
    }

    /// Load the default (first configured) model into the engine.
    pub fn load_model(&self, force_reload: bool) {
        let Some(first) = self.config.models.first() else {
            tracing::warn!("no models configured; nothing to load");
            return;
        };

        let params = EngineParams {
            model_path: self.config.destination_for(first),
            ..Default::default()
        };
        self.handle.set_params(params);
        self.handle.load_model(force_reload, |path, status| {
            if status != 0 {
                // The error event already fired; nothing more to do here.
                return;
            }
            tracing::info!(model = %path.display(), "model ready");
        });
    }

    /// Unload the engine's model. Failures surface as error events.
    pub fn unload_model(&self) {
        self.handle.unload_model(|status| {
            if status != 0 {
                tracing::warn!(status, "unload returned an error");
            }
        });
    }

    /// Insert a templated chat turn.
    pub fn insert_templated_prompt(
        &self,
        text: impl Into<String>,
        role: Role,
        add_assistant_bos: bool,
        generate_reply: bool,
    ) {
        self.handle.insert_templated_prompt(ChatPrompt {
            text: text.into(),
            role,
            add_assistant_bos,
            generate_reply,
        });
    }

    /// Insert raw text without template wrapping.
    pub fn insert_raw_prompt(&self, text: impl Into<String>, generate_reply: bool) {
        self.handle.insert_raw_prompt(text, generate_reply);
    }

    pub fn stop_generation(&self) {
        self.handle.stop_generation();
    }

    pub fn resume_generation(&self) {
        self.handle.resume_generation();
    }

    pub fn reset_context_history(&self, keep_system_prompt: bool) {
        self.handle.reset_context_history(keep_system_prompt);
    }

    pub fn remove_last_reply(&self) {
        self.handle.remove_last_reply();
    }

    pub fn remove_last_user_input(&self) {
        self.handle.remove_last_user_input();
    }

    /// Whether a model is currently loaded, per the retained snapshot.
    pub fn is_model_loaded(&self) -> bool {
        self.bridge.model_state().is_model_loaded
    }

    /// Raw context text as the engine last reported it.
    pub fn raw_context_history(&self) -> String {
        self.bridge.model_state().context_history
    }

    /// Structured turn list as the engine last reported it.
    pub fn structured_chat_history(&self) -> Vec<ChatTurn> {
        self.bridge.model_state().chat_history
    }

    /// Block until the subsystem is idle, up to `timeout`.
    ///
    /// Returns `true` when idle was reached (immediately when already
    /// idle), `false` when the budget ran out first.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        self.processing.wait(timeout)
    }
}

/// Physical processor cores available to engine threads.
pub fn core_count() -> usize {
    sysinfo::System::new_all().physical_core_count().unwrap_or(1)
}

/// Logical processors, hyperthreads included.
pub fn logical_core_count() -> usize {
    sysinfo::System::new_all().cpus().len().max(1)
}
