//! Persisted intermediate container.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic        8 bytes   "KILNIR\0\0"
//! version      u16 length + UTF-8 "MAJOR.MINOR.PATCH"
//! payload      u64 length + JSON-serialized Intermediate
//! embedded     u32 count, then per file: u32 key length + key, u64 length + bytes
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use kiln_core::{Version, codes};
use thiserror::Error;

use crate::{Intermediate, RecordDefinitions};

/// Format version written by this build of the toolset.
pub const CONTAINER_VERSION: Version = Version::new(1, 0, 0);

const MAGIC: &[u8; 8] = b"KILNIR\0\0";

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to access '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not an intermediate container")]
    NotAContainer,

    #[error("container is truncated")]
    Truncated,

    #[error("container format version '{found}' is not supported (expected {expected})")]
    UnsupportedVersion { found: String, expected: Version },

    #[error("container payload is corrupt")]
    Corrupt(#[from] serde_json::Error),

    #[error("unknown record kind '{kind}' (record '{id}')")]
    UnknownRecordKind { kind: String, id: String },
}

impl ContainerError {
    /// Diagnostic code for this error.
    pub fn number(&self) -> i32 {
        match self {
            ContainerError::Io { .. } => codes::CONTAINER_IO,
            ContainerError::UnsupportedVersion { .. } => codes::UNSUPPORTED_CONTAINER_VERSION,
            ContainerError::NotAContainer
            | ContainerError::Truncated
            | ContainerError::Corrupt(_)
            | ContainerError::UnknownRecordKind { .. } => codes::CORRUPT_CONTAINER,
        }
    }
}

impl Intermediate {
    /// Serialize into the container format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let payload = serde_json::to_vec(self)?;
        let version = CONTAINER_VERSION.to_string();

        let mut out = Vec::with_capacity(payload.len() + 64);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(version.len() as u16).to_le_bytes());
        out.extend_from_slice(version.as_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&(self.embedded_files.len() as u32).to_le_bytes());
        for (key, data) in &self.embedded_files {
            out.extend_from_slice(&(key.len() as u32).to_le_bytes());
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(&(data.len() as u64).to_le_bytes());
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    /// Deserialize from the container format, validating every record kind.
    pub fn from_bytes(
        bytes: &[u8],
        definitions: &RecordDefinitions,
    ) -> Result<Self, ContainerError> {
        let mut reader = Reader::new(bytes);

        if reader.take(MAGIC.len()).ok() != Some(MAGIC.as_slice()) {
            return Err(ContainerError::NotAContainer);
        }

        let version_len = reader.u16()? as usize;
        let found = String::from_utf8_lossy(reader.take(version_len)?).into_owned();
        match found.parse::<Version>() {
            Ok(version) if CONTAINER_VERSION.is_compatible_with(&version) => {}
            _ => {
                return Err(ContainerError::UnsupportedVersion {
                    found,
                    expected: CONTAINER_VERSION,
                });
            }
        }

        let payload_len = reader.u64()? as usize;
        let mut intermediate: Intermediate = serde_json::from_slice(reader.take(payload_len)?)?;

        let count = reader.u32()?;
        let mut embedded = IndexMap::new();
        for _ in 0..count {
            let key_len = reader.u32()? as usize;
            let key = String::from_utf8_lossy(reader.take(key_len)?).into_owned();
            let data_len = reader.u64()? as usize;
            embedded.insert(key, reader.take(data_len)?.to_vec());
        }
        intermediate.embedded_files = embedded;

        if let Some(record) = intermediate
            .records
            .iter()
            .find(|r| !definitions.contains(&r.kind))
        {
            return Err(ContainerError::UnknownRecordKind {
                kind: record.kind.clone(),
                id: record.id.clone(),
            });
        }

        Ok(intermediate)
    }

    /// Save to a container file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ContainerError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        kiln_core::write_file(path, bytes).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a container file.
    pub fn load(
        path: impl AsRef<Path>,
        definitions: &RecordDefinitions,
    ) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, definitions)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ContainerError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ContainerError::Truncated)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ContainerError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u16(&mut self) -> Result<u16, ContainerError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, ContainerError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, ContainerError> {
        self.array().map(u64::from_le_bytes)
    }
}
