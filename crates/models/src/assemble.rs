//! Streaming reassembly of split model files.
//!
//! Parts follow the `<file>.part<N>` convention, 1-based with no gaps; the
//! scan stops at the first missing index. Finding no part at all is an
//! error, a pre-existing destination is refused rather than overwritten,
//! and a failed run leaves its partial destination in place for the caller
//! to delete before retrying.

use crate::{part_file_name, ModelError, PackIndex, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Chunk size for part copies.
const COPY_BUF_LEN: usize = 1 << 20;

/// Copy numbered part files under `read_root` into `destination`.
///
/// A part may sit either directly under `read_root` or nested in a
/// `<base>-part<N>` directory; the nested directory takes precedence when
/// it exists. Returns the number of bytes written.
pub fn assemble_from_dir(read_root: &Path, destination: &Path) -> Result<u64> {
    ensure_missing(destination)?;
    let (file_name, base_name) = target_names(destination)?;

    // Probe before creating the destination so a fruitless scan leaves
    // nothing behind.
    let first = locate_part(read_root, &file_name, &base_name, 1)
        .ok_or_else(|| ModelError::NoParts(part_file_name(&file_name, 1)))?;

    let mut output = create_destination(destination)?;
    let mut written = copy_part(&first, 1, &mut output)?;
    let mut index = 2;
    while let Some(part) = locate_part(read_root, &file_name, &base_name, index) {
        written += copy_part(&part, index, &mut output)?;
        index += 1;
    }

    output
        .flush()
        .map_err(|source| ModelError::PartWrite { index: index - 1, source })?;
    tracing::info!(
        destination = %destination.display(),
        parts = index - 1,
        bytes = written,
        "model assembled from loose parts"
    );
    Ok(written)
}

/// Copy numbered part entries resolved through `index` into `destination`.
///
/// Parts are matched by virtual-path substring; when several packs carry
/// the same part name, which one wins is unspecified. Returns the number
/// of bytes written.
pub fn assemble_from_packs(index: &PackIndex, destination: &Path) -> Result<u64> {
    ensure_missing(destination)?;
    let (file_name, _) = target_names(destination)?;

    if index.lookup(&part_file_name(&file_name, 1)).is_none() {
        return Err(ModelError::NoParts(part_file_name(&file_name, 1)));
    }

    let mut output = create_destination(destination)?;
    let mut written = 0u64;
    let mut part = 1u32;
    while let Some((virtual_path, pack)) = index.lookup(&part_file_name(&file_name, part)) {
        tracing::debug!(
            part = %part_file_name(&file_name, part),
            entry = virtual_path,
            pack = %pack.display(),
            "located pack entry"
        );
        let bytes = index
            .entry_bytes(virtual_path)
            .map_err(|source| ModelError::PartRead { index: part, source })?;
        output
            .write_all(&bytes)
            .map_err(|source| ModelError::PartWrite { index: part, source })?;
        written += bytes.len() as u64;
        part += 1;
    }

    output
        .flush()
        .map_err(|source| ModelError::PartWrite { index: part - 1, source })?;
    tracing::info!(
        destination = %destination.display(),
        parts = part - 1,
        bytes = written,
        "model assembled from packs"
    );
    Ok(written)
}

fn ensure_missing(destination: &Path) -> Result<()> {
    if destination.exists() {
        return Err(ModelError::DestinationExists(destination.to_path_buf()));
    }
    Ok(())
}

fn target_names(destination: &Path) -> Result<(String, String)> {
    let file_name = destination
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ModelError::InvalidDestination(destination.to_path_buf()))?;
    let base_name = destination
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    Ok((file_name.to_string(), base_name.to_string()))
}

fn create_destination(destination: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(destination)?))
}

/// Resolve the on-disk path of one part, nested directory first.
fn locate_part(read_root: &Path, file_name: &str, base_name: &str, index: u32) -> Option<PathBuf> {
    let part_name = part_file_name(file_name, index);
    let nested_dir = read_root.join(format!("{base_name}-part{index}"));
    let candidate = if nested_dir.is_dir() {
        nested_dir.join(&part_name)
    } else {
        read_root.join(&part_name)
    };
    candidate.is_file().then_some(candidate)
}

fn copy_part(path: &Path, index: u32, output: &mut BufWriter<File>) -> Result<u64> {
    let mut part = File::open(path).map_err(|source| ModelError::PartRead { index, source })?;
    let mut buf = vec![0u8; COPY_BUF_LEN];
    let mut copied = 0u64;
    loop {
        let n = part
            .read(&mut buf)
            .map_err(|source| ModelError::PartRead { index, source })?;
        if n == 0 {
            break;
        }
        output
            .write_all(&buf[..n])
            .map_err(|source| ModelError::PartWrite { index, source })?;
        copied += n as u64;
    }
    tracing::debug!(part = %path.display(), bytes = copied, "appended part");
    Ok(copied)
}
