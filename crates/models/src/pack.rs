//! Read-only pack containers holding model parts.
//!
//! A pack is a plain tar archive. Building a [`PackIndex`] scans every
//! container's entry table into a virtual-path map; entry data is read on
//! demand and the whole index is released when dropped, failure paths
//! included.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Index over a set of tar pack containers.
///
/// When two packs carry the same entry path the later scan wins; lookup
/// order across distinct paths is unspecified.
#[derive(Debug, Default)]
pub struct PackIndex {
    entries: HashMap<String, PathBuf>,
}

impl PackIndex {
    /// Scan `packs`, recording every file entry.
    ///
    /// A container that cannot be opened or walked is skipped with a
    /// warning and contributes no entries; this is not fatal.
    pub fn build(packs: &[PathBuf]) -> Self {
        let mut entries = HashMap::new();
        for pack in packs {
            match scan(pack) {
                Ok(paths) => {
                    tracing::debug!(
                        pack = %pack.display(),
                        entries = paths.len(),
                        "indexed pack"
                    );
                    for path in paths {
                        entries.insert(path, pack.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(pack = %pack.display(), error = %e, "skipping unreadable pack");
                }
            }
        }
        Self { entries }
    }

    /// Number of indexed entries across all packs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry whose virtual path contains `fragment`.
    ///
    /// When several packs carry a matching entry the result is whichever
    /// one the map iteration reaches first; precedence across packs is
    /// not guaranteed.
    pub fn lookup(&self, fragment: &str) -> Option<(&str, &Path)> {
        self.entries
            .iter()
            .find(|(path, _)| path.contains(fragment))
            .map(|(path, pack)| (path.as_str(), pack.as_path()))
    }

    /// Read the named entry's bytes out of its container.
    pub fn entry_bytes(&self, virtual_path: &str) -> io::Result<Vec<u8>> {
        let pack = self.entries.get(virtual_path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no pack entry {virtual_path}"),
            )
        })?;

        let file = File::open(pack)?;
        let mut archive = tar::Archive::new(file);
        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.path()?.to_string_lossy() == virtual_path {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                return Ok(bytes);
            }
        }

        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("entry {virtual_path} vanished from {}", pack.display()),
        ))
    }
}

fn scan(pack: &Path) -> io::Result<Vec<String>> {
    let file = File::open(pack)?;
    let mut archive = tar::Archive::new(file);
    let mut paths = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_file() {
            paths.push(entry.path()?.to_string_lossy().into_owned());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pack(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn test_build_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let pack = dir.path().join("models.tar");
        write_pack(&pack, &[("pak/model.gguf.part1", b"abcd")]);

        let index = PackIndex::build(&[pack.clone()]);
        assert_eq!(index.len(), 1);

        let (virtual_path, container) = index.lookup("model.gguf.part1").unwrap();
        assert_eq!(virtual_path, "pak/model.gguf.part1");
        assert_eq!(container, pack.as_path());
        assert!(index.lookup("model.gguf.part2").is_none());
    }

    #[test]
    fn test_entry_bytes_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pack = dir.path().join("models.tar");
        write_pack(&pack, &[("a/one.bin.part1", b"hello"), ("a/one.bin.part2", b"world")]);

        let index = PackIndex::build(&[pack]);
        assert_eq!(index.entry_bytes("a/one.bin.part2").unwrap(), b"world");
    }

    #[test]
    fn test_unreadable_pack_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.tar");
        write_pack(&good, &[("model.gguf.part1", b"abcd")]);

        let bogus = dir.path().join("missing.tar");
        let index = PackIndex::build(&[bogus, good]);
        assert_eq!(index.len(), 1);
        assert!(index.lookup("model.gguf.part1").is_some());
    }

    #[test]
    fn test_garbage_container_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.tar");
        let mut f = File::create(&garbage).unwrap();
        f.write_all(b"this is not a tar archive").unwrap();

        let index = PackIndex::build(&[garbage]);
        assert!(index.is_empty());
    }
}
