//! Integration tests for the assembly scheduler.

use murmur_application::{ModelPreparer, RuntimeConfig};
use murmur_gates::{CompletionGate, ProcessingGate};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn write_parts(root: &Path, file_name: &str, parts: &[&[u8]]) {
    for (i, data) in parts.iter().enumerate() {
        fs::write(root.join(format!("{file_name}.part{}", i + 1)), data).unwrap();
    }
}

fn preparer_for(config: RuntimeConfig) -> (ModelPreparer, Arc<CompletionGate>, Arc<ProcessingGate>) {
    let completion = Arc::new(CompletionGate::new());
    let processing = Arc::new(ProcessingGate::new());
    let preparer = ModelPreparer::new(config, Arc::clone(&completion), Arc::clone(&processing));
    (preparer, completion, processing)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_batch_of_two_assembles_both() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write_parts(src.path(), "a.gguf", &[b"aa", b"AA"]);
    write_parts(src.path(), "b.gguf", &[b"bb"]);

    let mut config = RuntimeConfig::with_models(["a.gguf", "b.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());
    config.parts_root = Some(src.path().to_path_buf());

    let (preparer, completion, processing) = preparer_for(config);
    preparer.prepare_all();

    assert!(completion.wait(Duration::from_secs(10)));
    assert_eq!(completion.counts(), (2, 2));
    assert!(processing.wait(Duration::from_secs(10)));

    assert_eq!(fs::read(dst.path().join("a.gguf")).unwrap(), b"aaAA");
    assert_eq!(fs::read(dst.path().join("b.gguf")).unwrap(), b"bb");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_batch_opens_the_gate_immediately() {
    let dst = tempdir().unwrap();
    fs::write(dst.path().join("a.gguf"), b"already here").unwrap();

    let mut config = RuntimeConfig::with_models(["a.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());

    let (preparer, completion, processing) = preparer_for(config);
    processing.reset();
    preparer.prepare_all();

    // No tasks were launched; both gates settle synchronously.
    assert!(completion.is_satisfied());
    assert_eq!(completion.counts(), (0, 0));
    assert!(processing.is_idle());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_sibling_still_satisfies_the_batch() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    // Only "good" has parts; "broken" will fail with NoParts.
    write_parts(src.path(), "good.gguf", &[b"fine"]);

    let mut config = RuntimeConfig::with_models(["good.gguf", "broken.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());
    config.parts_root = Some(src.path().to_path_buf());

    let (preparer, completion, processing) = preparer_for(config);
    preparer.prepare_all();

    assert!(completion.wait(Duration::from_secs(10)));
    assert_eq!(completion.counts(), (2, 2));
    assert!(processing.wait(Duration::from_secs(10)));

    assert!(dst.path().join("good.gguf").is_file());
    assert!(!dst.path().join("broken.gguf").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pack_mode_assembles_from_containers() {
    let dir = tempdir().unwrap();
    let dst = tempdir().unwrap();

    let pack = dir.path().join("base.tar");
    let file = File::create(&pack).unwrap();
    let mut builder = tar::Builder::new(file);
    for (name, data) in [
        ("chunks/model.gguf.part1", b"pack" as &[u8]),
        ("chunks/model.gguf.part2", b"mode"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }
    builder.finish().unwrap();

    let mut config = RuntimeConfig::with_models(["model.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());
    config.packs = vec![pack];

    let (preparer, completion, _processing) = preparer_for(config);
    preparer.prepare_all();

    assert!(completion.wait(Duration::from_secs(10)));
    assert_eq!(fs::read(dst.path().join("model.gguf")).unwrap(), b"packmode");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_assembled_models_are_not_reassembled() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write_parts(src.path(), "a.gguf", &[b"new"]);
    fs::write(dst.path().join("a.gguf"), b"old").unwrap();

    let mut config = RuntimeConfig::with_models(["a.gguf"]);
    config.models_root = Some(dst.path().to_path_buf());
    config.parts_root = Some(src.path().to_path_buf());

    let (preparer, completion, _processing) = preparer_for(config);
    assert!(preparer.missing_assets().is_empty());
    preparer.prepare_all();

    assert!(completion.is_satisfied());
    assert_eq!(fs::read(dst.path().join("a.gguf")).unwrap(), b"old");
}
