//! Distributable package: one manifest and one linked blob.
//!
//! ```text
//! "GRVL" | version u8 | lz4 block, size-prepended:
//!     u32 LE manifest length | manifest JSON | blob
//! ```

use crate::project::Manifest;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"GRVL";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1;

/// Refuse to inflate payloads claiming more than this
const MAX_PAYLOAD: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not a package: bad magic")]
    BadMagic,

    #[error("Unsupported package format version {0}")]
    UnsupportedVersion(u8),

    #[error("Corrupt package: {0}")]
    Corrupt(String),

    #[error("Corrupt package payload: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("Invalid package manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub manifest: Manifest,
    pub blob: Vec<u8>,
}

impl Package {
    pub fn new(manifest: Manifest, blob: Vec<u8>) -> Self {
        Self { manifest, blob }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let manifest = serde_json::to_vec(&self.manifest)?;
        let manifest_len = u32::try_from(manifest.len())
            .map_err(|_| ArchiveError::Corrupt("manifest too large".to_string()))?;

        let mut payload = Vec::with_capacity(4 + manifest.len() + self.blob.len());
        payload.write_u32::<LittleEndian>(manifest_len)?;
        payload.extend_from_slice(&manifest);
        payload.extend_from_slice(&self.blob);

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.write_u8(FORMAT_VERSION)?;
        bytes.extend_from_slice(&lz4_flex::compress_prepend_size(&payload));
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let compressed = &bytes[HEADER_LEN..];
        let mut size_prefix = compressed;
        let declared = size_prefix
            .read_u32::<LittleEndian>()
            .map_err(|_| ArchiveError::Corrupt("missing payload".to_string()))? as usize;
        if declared > MAX_PAYLOAD {
            return Err(ArchiveError::Corrupt(format!("payload of {} bytes is too large", declared)));
        }
        let payload = lz4_flex::decompress_size_prepended(compressed)?;

        let mut rest = &payload[..];
        let manifest_len = rest
            .read_u32::<LittleEndian>()
            .map_err(|_| ArchiveError::Corrupt("missing manifest length".to_string()))? as usize;
        if manifest_len > rest.len() {
            return Err(ArchiveError::Corrupt(format!(
                "manifest length {} overruns payload of {} bytes",
                manifest_len,
                rest.len()
            )));
        }
        let (manifest, blob) = rest.split_at(manifest_len);

        Ok(Self {
            manifest: serde_json::from_slice(manifest)?,
            blob: blob.to_vec(),
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), ArchiveError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, ArchiveError> {
        Self::from_bytes(&fs::read(path)?)
    }
}
