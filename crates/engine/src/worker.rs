//! Dedicated engine thread and its command channel.
//!
//! Commands are applied in arrival order on a single thread that owns the
//! engine; results surface through the event bridge and the processing
//! gate. Callers never block here.

use crate::{ChatPrompt, EngineParams, InferenceEngine};
use crossbeam_channel::{unbounded, Receiver, Sender};
use murmur_events::{EventBridge, GenerationEvent};
use murmur_gates::ProcessingGate;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type LoadCallback = Box<dyn FnOnce(PathBuf, i32) + Send>;
type UnloadCallback = Box<dyn FnOnce(i32) + Send>;

enum Command {
    SetParams(EngineParams),
    Load {
        force_reload: bool,
        on_complete: Option<LoadCallback>,
    },
    Unload {
        on_complete: Option<UnloadCallback>,
    },
    InsertPrompt(ChatPrompt),
    InsertRaw {
        text: String,
        generate_reply: bool,
    },
    Stop,
    Resume,
    ResetContext {
        keep_system_prompt: bool,
    },
    RemoveLastReply,
    RemoveLastInput,
    Shutdown,
}

/// Cheap handle for sending commands to the engine thread.
///
/// All methods return immediately; completion is observable through the
/// event bridge, the supplied callbacks, or the processing gate.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<Command>,
}

impl EngineHandle {
    pub fn set_params(&self, params: EngineParams) {
        self.send(Command::SetParams(params));
    }

    /// Load the configured model. `on_complete` receives the model path
    /// and a status code, zero on success; non-zero codes also surface as
    /// an error event before the callback runs.
    pub fn load_model(
        &self,
        force_reload: bool,
        on_complete: impl FnOnce(PathBuf, i32) + Send + 'static,
    ) {
        self.send(Command::Load {
            force_reload,
            on_complete: Some(Box::new(on_complete)),
        });
    }

    /// Unload the model. Non-zero status also surfaces as an error event.
    pub fn unload_model(&self, on_complete: impl FnOnce(i32) + Send + 'static) {
        self.send(Command::Unload {
            on_complete: Some(Box::new(on_complete)),
        });
    }

    pub fn insert_templated_prompt(&self, prompt: ChatPrompt) {
        self.send(Command::InsertPrompt(prompt));
    }

    pub fn insert_raw_prompt(&self, text: impl Into<String>, generate_reply: bool) {
        self.send(Command::InsertRaw {
            text: text.into(),
            generate_reply,
        });
    }

    pub fn stop_generation(&self) {
        self.send(Command::Stop);
    }

    pub fn resume_generation(&self) {
        self.send(Command::Resume);
    }

    pub fn reset_context_history(&self, keep_system_prompt: bool) {
        self.send(Command::ResetContext { keep_system_prompt });
    }

    pub fn remove_last_reply(&self) {
        self.send(Command::RemoveLastReply);
    }

    pub fn remove_last_user_input(&self) {
        self.send(Command::RemoveLastInput);
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("engine worker is gone; command dropped");
        }
    }
}

/// Owns the engine thread; joins it on drop.
pub struct EngineWorker {
    handle: EngineHandle,
    thread: Option<JoinHandle<()>>,
}

impl EngineWorker {
    /// Spawn the worker thread around `engine`.
    pub fn spawn(
        engine: Box<dyn InferenceEngine>,
        bridge: Arc<EventBridge>,
        gate: Arc<ProcessingGate>,
    ) -> Self {
        let (tx, rx) = unbounded();
        let thread = thread::spawn(move || run(engine, bridge, gate, rx));
        Self {
            handle: EngineHandle { tx },
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(
    mut engine: Box<dyn InferenceEngine>,
    bridge: Arc<EventBridge>,
    gate: Arc<ProcessingGate>,
    rx: Receiver<Command>,
) {
    let mut params = EngineParams::default();

    while let Ok(command) = rx.recv() {
        let sink = |event: GenerationEvent| bridge.emit(event);
        match command {
            Command::SetParams(p) => params = p,

            Command::Load {
                force_reload,
                on_complete,
            } => {
                gate.reset();
                let path = params.model_path.clone();
                let already_loaded = bridge.model_state().is_model_loaded;
                let status = if already_loaded && !force_reload {
                    0
                } else {
                    match engine.load(&path, &params) {
                        Ok(()) => {
                            tracing::info!(model = %path.display(), "model loaded");
                            0
                        }
                        Err(e) => {
                            bridge.emit(GenerationEvent::Error {
                                message: e.to_string(),
                                code: e.code(),
                            });
                            e.code()
                        }
                    }
                };
                if status == 0 {
                    bridge.emit(GenerationEvent::ModelStateChanged {
                        state: engine.state(),
                    });
                }
                if let Some(cb) = on_complete {
                    cb(path, status);
                }
                gate.trigger();
            }

            Command::Unload { on_complete } => {
                let status = match engine.unload() {
                    Ok(()) => 0,
                    Err(e) => {
                        bridge.emit(GenerationEvent::Error {
                            message: e.to_string(),
                            code: e.code(),
                        });
                        e.code()
                    }
                };
                if status == 0 {
                    bridge.emit(GenerationEvent::ModelStateChanged {
                        state: engine.state(),
                    });
                }
                if let Some(cb) = on_complete {
                    cb(status);
                }
            }

            Command::InsertPrompt(prompt) => {
                gate.reset();
                if let Err(e) = engine.insert_prompt(&prompt, &sink) {
                    bridge.emit(GenerationEvent::Error {
                        message: e.to_string(),
                        code: e.code(),
                    });
                }
                gate.trigger();
            }

            Command::InsertRaw {
                text,
                generate_reply,
            } => {
                gate.reset();
                if let Err(e) = engine.insert_raw(&text, generate_reply, &sink) {
                    bridge.emit(GenerationEvent::Error {
                        message: e.to_string(),
                        code: e.code(),
                    });
                }
                gate.trigger();
            }

            Command::Stop => engine.stop(),

            Command::Resume => {
                gate.reset();
                if let Err(e) = engine.resume(&sink) {
                    bridge.emit(GenerationEvent::Error {
                        message: e.to_string(),
                        code: e.code(),
                    });
                }
                gate.trigger();
            }

            Command::ResetContext { keep_system_prompt } => {
                engine.reset_context(keep_system_prompt);
                bridge.emit(GenerationEvent::ModelStateChanged {
                    state: engine.state(),
                });
            }

            Command::RemoveLastReply => {
                engine.remove_last_reply();
                bridge.emit(GenerationEvent::ModelStateChanged {
                    state: engine.state(),
                });
            }

            Command::RemoveLastInput => {
                engine.remove_last_input();
                bridge.emit(GenerationEvent::ModelStateChanged {
                    state: engine.state(),
                });
            }

            Command::Shutdown => break,
        }
    }

    tracing::debug!("engine worker stopped");
}
