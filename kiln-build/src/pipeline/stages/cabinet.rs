//! Cabinets: the store archive holding a compressed package's files.
//!
//! ```text
//! magic    8 bytes   "KILNCAB\0"
//! count    u32
//! entries  per file: u32 name length + name, u64 length + bytes
//! ```
//!
//! Entries keep the order they were given in, so identical input always
//! produces identical bytes.

use std::{
    io,
    path::{Path, PathBuf},
};

use kiln_core::{Fingerprint, write_file};
use tracing::debug;

const MAGIC: &[u8; 8] = b"KILNCAB\0";

/// One file destined for the cabinet.
#[derive(Debug, Clone)]
pub struct CabinetEntry {
    /// Name inside the cabinet (the file record's id).
    pub name: String,
    pub source: PathBuf,
    pub hash: Fingerprint,
}

/// Cache key for a set of entries: same names and content, same key.
pub fn cache_key(entries: &[CabinetEntry]) -> Fingerprint {
    Fingerprint::of_parts(
        entries
            .iter()
            .flat_map(|e| [e.name.as_str(), e.hash.as_str()]),
    )
}

/// Produce the cabinet for `entries`, reusing a cached one when possible.
///
/// Returns the cabinet bytes and whether they came from the cache.
pub fn cabinet(entries: &[CabinetEntry], cache: Option<&Path>) -> io::Result<(Vec<u8>, bool)> {
    let Some(cache) = cache else {
        return Ok((build(entries)?, false));
    };

    let cached = cache.join(format!("{}.cab", cache_key(entries)));
    if cached.is_file() {
        debug!(cabinet = %cached.display(), "reusing cached cabinet");
        return Ok((std::fs::read(&cached)?, true));
    }

    let bytes = build(entries)?;
    write_file(&cached, &bytes)?;
    debug!(cabinet = %cached.display(), "cached cabinet");
    Ok((bytes, false))
}

fn build(entries: &[CabinetEntry]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        let data = std::fs::read(&entry.source)?;
        out.extend_from_slice(&(entry.name.len() as u32).to_le_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        out.extend_from_slice(&data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn entry(temp: &TempDir, name: &str, content: &[u8]) -> CabinetEntry {
        let source = temp.path().join(name);
        std::fs::write(&source, content).unwrap();
        CabinetEntry {
            name: name.to_string(),
            hash: Fingerprint::of_bytes(content),
            source,
        }
    }

    #[test]
    fn test_cabinet_layout() {
        let temp = TempDir::new().unwrap();
        let entries = vec![entry(&temp, "A", b"xy")];

        let (bytes, cached) = cabinet(&entries, None).unwrap();

        assert!(!cached);
        let mut expected = b"KILNCAB\0".to_vec();
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(b"A");
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(b"xy");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_cache_reuse() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let entries = vec![entry(&temp, "A", b"one"), entry(&temp, "B", b"two")];

        let (first, reused) = cabinet(&entries, Some(&cache)).unwrap();
        assert!(!reused);
        assert!(cache.join(format!("{}.cab", cache_key(&entries))).is_file());

        // a cache hit never touches the sources
        std::fs::remove_file(&entries[0].source).unwrap();
        let (second, reused) = cabinet(&entries, Some(&cache)).unwrap();
        assert!(reused);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_key_tracks_content() {
        let temp = TempDir::new().unwrap();
        let before = vec![entry(&temp, "A", b"one")];
        let after = vec![entry(&temp, "A", b"changed")];

        assert_ne!(cache_key(&before), cache_key(&after));
        assert_eq!(cache_key(&before), cache_key(&before.clone()));
    }
}
