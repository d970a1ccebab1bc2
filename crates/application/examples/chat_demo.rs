//! End-to-end walkthrough against the scripted engine.
//!
//! Builds a split model in a temp directory, assembles it, loads it and
//! streams one generation cycle to stdout.
//!
//! ```sh
//! cargo run -p murmur-application --example chat_demo
//! ```

use anyhow::Result;
use murmur_application::{LlmSubsystem, RuntimeConfig};
use murmur_engine::ScriptedEngine;
use murmur_events::{GenerationListeners, Role};
use std::fs;
use std::io::Write;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let workspace = tempfile::tempdir()?;
    let parts = workspace.path().join("parts");
    let models = workspace.path().join("models");
    fs::create_dir_all(&parts)?;

    // A split "model": two numbered parts that concatenate into one file.
    fs::write(parts.join("demo.gguf.part1"), b"GGUF")?;
    fs::write(parts.join("demo.gguf.part2"), b"demo payload")?;

    let mut config = RuntimeConfig::with_models(["demo.gguf"]);
    config.models_root = Some(models.clone());
    config.parts_root = Some(parts);

    let engine = ScriptedEngine::new("Nice to meet you. What shall we build today?")
        .with_speed(48.0);
    let subsystem = LlmSubsystem::new(config, Box::new(engine));

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    subsystem.register_listeners(GenerationListeners {
        on_token: Some(Box::new(|token| {
            print!("{token}");
            let _ = std::io::stdout().flush();
        })),
        on_response: Some(Box::new(|_| println!())),
        on_end_of_stream: Some(Box::new(move |_, speed| {
            println!("[end of stream @ {speed:.1} tok/s]");
            let _ = done_tx.send(());
        })),
        on_error: Some(Box::new(|message, code| {
            eprintln!("engine error {code}: {message}");
        })),
        ..Default::default()
    });

    subsystem.prepare_models();
    if !subsystem.wait_for_completion(Duration::from_secs(30)) {
        anyhow::bail!("model assembly did not finish in time");
    }
    tracing::info!(model = %models.join("demo.gguf").display(), "assembled");

    subsystem.load_model(false);
    subsystem.insert_templated_prompt("Hello!", Role::User, false, true);

    if done_rx.recv_timeout(Duration::from_secs(30)).is_err() {
        anyhow::bail!("generation did not finish in time");
    }

    println!("turns in history: {}", subsystem.structured_chat_history().len());
    Ok(())
}
