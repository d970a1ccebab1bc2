//! Scripted in-memory engine for tests and demos.

use crate::{ChatPrompt, EngineError, EngineParams, EventSink, InferenceEngine, Result};
use murmur_events::{last_sentence, ChatTurn, GenerationEvent, ModelState, Role};
use std::path::Path;

/// Replays a canned reply token by token, the way a real backend would.
///
/// Loading verifies the model file actually exists, so assembly failures
/// surface through the same error-event flow a real engine produces.
/// An optional interrupt point parks the cycle mid-generation to exercise
/// stop/resume handling deterministically.
pub struct ScriptedEngine {
    reply: String,
    speed: f32,
    interrupt_after: Option<usize>,
    loaded: bool,
    stopped: bool,
    separators: Vec<String>,
    context: String,
    chat: Vec<ChatTurn>,
    last_speed: f32,
    pending: Option<Pending>,
}

struct Pending {
    tokens: Vec<String>,
    accumulated: String,
}

impl ScriptedEngine {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            speed: 32.0,
            interrupt_after: None,
            loaded: false,
            stopped: false,
            separators: Vec::new(),
            context: String::new(),
            chat: Vec::new(),
            last_speed: 0.0,
            pending: None,
        }
    }

    /// Tokens-per-second figure reported after each cycle.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Park the next generation cycle after `tokens` tokens, leaving the
    /// remainder for `resume`. One-shot.
    pub fn with_interrupt_after(mut self, tokens: usize) -> Self {
        self.interrupt_after = Some(tokens);
        self
    }

    fn tokens(&self) -> Vec<String> {
        self.reply.split_inclusive(' ').map(String::from).collect()
    }

    fn rebuild_context(&mut self) {
        self.context = self
            .chat
            .iter()
            .map(|turn| turn.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if !self.context.is_empty() {
            self.context.push('\n');
        }
    }

    fn drive(&mut self, tokens: Vec<String>, mut accumulated: String, sink: EventSink) {
        let mut tokens = tokens.into_iter();
        let mut emitted = 0usize;

        while let Some(token) = tokens.next() {
            accumulated.push_str(&token);
            sink(GenerationEvent::TokenGenerated {
                text: token.clone(),
            });
            if self
                .separators
                .iter()
                .any(|sep| token.contains(sep.as_str()))
            {
                sink(GenerationEvent::PartialGenerated {
                    text: last_sentence(&accumulated).to_string(),
                });
            }

            emitted += 1;
            let interrupted = self.stopped
                || match self.interrupt_after {
                    Some(limit) if emitted >= limit => {
                        self.interrupt_after = None;
                        true
                    }
                    _ => false,
                };
            if interrupted {
                let remaining: Vec<String> = tokens.collect();
                if !remaining.is_empty() {
                    self.pending = Some(Pending {
                        tokens: remaining,
                        accumulated,
                    });
                    return;
                }
                break;
            }
        }

        // Terminal pair: snapshot first so the end-of-stream signal
        // carries this cycle's speed.
        self.last_speed = self.speed;
        self.chat
            .push(ChatTurn::new(Role::Assistant, accumulated.clone()));
        self.context.push_str(&accumulated);
        self.context.push('\n');
        sink(GenerationEvent::ModelStateChanged {
            state: self.state(),
        });
        sink(GenerationEvent::ResponseGenerated { text: accumulated });
    }
}

impl InferenceEngine for ScriptedEngine {
    fn load(&mut self, path: &Path, params: &EngineParams) -> Result<()> {
        if !path.is_file() {
            return Err(EngineError::ModelNotFound(path.to_path_buf()));
        }
        self.separators = params.partials_separators.clone();
        self.loaded = true;
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        if !self.loaded {
            return Err(EngineError::NoModelLoaded);
        }
        self.loaded = false;
        Ok(())
    }

    fn insert_prompt(&mut self, prompt: &ChatPrompt, sink: EventSink) -> Result<()> {
        if !self.loaded {
            return Err(EngineError::NoModelLoaded);
        }

        self.chat.push(ChatTurn::new(prompt.role, &prompt.text));
        self.context.push_str(&prompt.text);
        self.context.push('\n');
        sink(GenerationEvent::PromptProcessed {
            tokens_processed: prompt.text.split_whitespace().count() as u32,
            role: prompt.role,
            speed: self.speed,
        });

        if prompt.generate_reply {
            self.drive(self.tokens(), String::new(), sink);
        }
        Ok(())
    }

    fn insert_raw(&mut self, text: &str, generate_reply: bool, sink: EventSink) -> Result<()> {
        if !self.loaded {
            return Err(EngineError::NoModelLoaded);
        }

        self.context.push_str(text);
        self.context.push('\n');
        sink(GenerationEvent::PromptProcessed {
            tokens_processed: text.split_whitespace().count() as u32,
            role: Role::User,
            speed: self.speed,
        });

        if generate_reply {
            self.drive(self.tokens(), String::new(), sink);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn resume(&mut self, sink: EventSink) -> Result<()> {
        self.stopped = false;
        if let Some(pending) = self.pending.take() {
            self.drive(pending.tokens, pending.accumulated, sink);
        }
        Ok(())
    }

    fn reset_context(&mut self, keep_system_prompt: bool) {
        let system = self
            .chat
            .first()
            .filter(|turn| keep_system_prompt && turn.role == Role::System)
            .cloned();
        self.chat.clear();
        if let Some(turn) = system {
            self.chat.push(turn);
        }
        self.pending = None;
        self.rebuild_context();
    }

    fn remove_last_reply(&mut self) {
        if self
            .chat
            .last()
            .is_some_and(|turn| turn.role == Role::Assistant)
        {
            self.chat.pop();
            self.rebuild_context();
        }
    }

    fn remove_last_input(&mut self) {
        if self
            .chat
            .last()
            .is_some_and(|turn| turn.role == Role::Assistant)
        {
            self.chat.pop();
        }
        if self.chat.last().is_some_and(|turn| turn.role == Role::User) {
            self.chat.pop();
        }
        self.rebuild_context();
    }

    fn state(&self) -> ModelState {
        ModelState {
            is_model_loaded: self.loaded,
            context_history: self.context.clone(),
            chat_history: self.chat.clone(),
            last_token_generation_speed: self.last_speed,
        }
    }
}
