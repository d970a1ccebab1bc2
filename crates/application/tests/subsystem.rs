//! End-to-end subsystem tests: assemble, load, generate, query.

use murmur_application::{LlmSubsystem, RuntimeConfig};
use murmur_engine::ScriptedEngine;
use murmur_events::{GenerationEvent, RecordingListeners, Role};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn write_parts(root: &Path, file_name: &str, parts: &[&[u8]]) {
    for (i, data) in parts.iter().enumerate() {
        fs::write(root.join(format!("{file_name}.part{}", i + 1)), data).unwrap();
    }
}

fn wait_until(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prepare_load_generate_query() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write_parts(src.path(), "model.gguf", &[b"GGUF", b"body"]);

    let mut config = RuntimeConfig::with_models(["model.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());
    config.parts_root = Some(src.path().to_path_buf());

    let subsystem = LlmSubsystem::new(
        config,
        Box::new(ScriptedEngine::new("Hello back. Bye").with_speed(50.0)),
    );
    let recording = RecordingListeners::new();
    subsystem.register_listeners(recording.listeners());

    // Assemble, then wait for the batch.
    subsystem.prepare_models();
    assert!(subsystem.wait_for_completion(Duration::from_secs(10)));
    assert_eq!(subsystem.assembly_counts(), (1, 1));
    assert_eq!(fs::read(dst.path().join("model.gguf")).unwrap(), b"GGUFbody");

    // Load and query.
    assert!(!subsystem.is_model_loaded());
    subsystem.load_model(false);
    assert!(wait_until(
        || subsystem.is_model_loaded(),
        Duration::from_secs(5)
    ));

    // Generate and observe the full event flow.
    subsystem.insert_templated_prompt("hi there", Role::User, false, true);
    assert!(wait_until(
        || !recording.end_of_stream().is_empty(),
        Duration::from_secs(5)
    ));

    assert_eq!(recording.end_of_stream(), vec![(true, 50.0)]);
    let events = recording.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, GenerationEvent::PromptProcessed { role: Role::User, .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        GenerationEvent::ResponseGenerated { text } if text == "Hello back. Bye"
    )));

    let history = subsystem.structured_chat_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert!(subsystem.raw_context_history().contains("hi there"));

    // Generation settled; the gate is open again.
    assert!(subsystem.wait_for_completion(Duration::from_secs(5)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loading_a_missing_model_surfaces_an_error_event() {
    let dst = tempdir().unwrap();

    // Nothing to assemble the model from: the destination stays absent
    // and the load flows forward into an engine error.
    let mut config = RuntimeConfig::with_models(["ghost.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());
    config.parts_root = Some(dst.path().to_path_buf());

    let subsystem = LlmSubsystem::new(config, Box::new(ScriptedEngine::new("unused")));
    let recording = RecordingListeners::new();
    subsystem.register_listeners(recording.listeners());

    subsystem.prepare_models();
    assert!(subsystem.wait_for_completion(Duration::from_secs(10)));
    assert!(!dst.path().join("ghost.gguf").exists());

    subsystem.load_model(false);
    assert!(wait_until(
        || recording
            .events()
            .iter()
            .any(|e| matches!(e, GenerationEvent::Error { .. })),
        Duration::from_secs(5)
    ));
    assert!(!subsystem.is_model_loaded());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reset_context_clears_the_queries() {
    let dst = tempdir().unwrap();
    fs::write(dst.path().join("model.gguf"), b"prebuilt").unwrap();

    let mut config = RuntimeConfig::with_models(["model.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());

    let subsystem = LlmSubsystem::new(config, Box::new(ScriptedEngine::new("reply.")));
    subsystem.prepare_models();
    subsystem.load_model(false);
    assert!(wait_until(
        || subsystem.is_model_loaded(),
        Duration::from_secs(5)
    ));

    subsystem.insert_templated_prompt("question", Role::User, false, true);
    assert!(wait_until(
        || subsystem.structured_chat_history().len() == 2,
        Duration::from_secs(5)
    ));

    subsystem.reset_context_history(false);
    assert!(wait_until(
        || subsystem.structured_chat_history().is_empty(),
        Duration::from_secs(5)
    ));
    assert!(subsystem.raw_context_history().is_empty());
}
