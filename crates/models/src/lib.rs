//! Model asset catalog and part assembly.
//!
//! A model may ship as a single file, as loose numbered part files, or as
//! parts packed inside read-only tar containers. This crate locates the
//! parts and reassembles them into the destination file exactly once;
//! presence of the destination is the signal that no work remains.

mod assemble;
mod pack;

use std::path::{Path, PathBuf};

pub use assemble::{assemble_from_dir, assemble_from_packs};
pub use pack::PackIndex;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),
    #[error("no part file found for {0}")]
    NoParts(String),
    #[error("failed to read part {index}: {source}")]
    PartRead { index: u32, source: std::io::Error },
    #[error("failed to write part {index}: {source}")]
    PartWrite { index: u32, source: std::io::Error },
    #[error("destination has no usable filename: {0}")]
    InvalidDestination(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// One target model file that may require assembly from parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    destination: PathBuf,
}

impl ModelAsset {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// Canonical destination path of the assembled file.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Full filename, e.g. `model.gguf`.
    pub fn file_name(&self) -> Option<&str> {
        self.destination.file_name().and_then(|n| n.to_str())
    }

    /// Filename stem, e.g. `model` for `model.gguf`.
    pub fn base_name(&self) -> Option<&str> {
        self.destination.file_stem().and_then(|n| n.to_str())
    }

    /// Whether the destination already exists.
    ///
    /// Presence of the file is the only completion signal; a run that was
    /// killed mid-write looks assembled. Delete the destination to force
    /// reassembly.
    pub fn is_assembled(&self) -> bool {
        self.destination.exists()
    }
}

/// Root directory where assembled models live.
pub fn models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("murmur")
        .join("models")
}

/// Resolve a model path string the way callers write them.
///
/// Strings starting with `.` are taken relative to [`models_dir`];
/// anything else is used as given.
pub fn resolve_model_path(input: &str) -> PathBuf {
    if input.starts_with('.') {
        let rest = input.trim_start_matches('.').trim_start_matches('/');
        models_dir().join(rest)
    } else {
        PathBuf::from(input)
    }
}

/// `<file_name>.part<N>` — the naming convention for split parts.
pub fn part_file_name(file_name: &str, index: u32) -> String {
    format!("{file_name}.part{index}")
}
