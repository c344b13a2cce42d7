// src/services/blob_cache.rs
//! BlobCache: durable id-keyed storage for image payloads (filesystem only).
//!
//! - Entries are stored under `<root>/<blake3(id)>` so arbitrary ids are
//!   safe on disk.
//! - **No database writes here.** The record store is the only SQLite
//!   writer; stories reference entries by id alone.
//! - Entries are display material, not authoritative data: losing one
//!   degrades a page to a placeholder, it never corrupts a record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::errors::StoreError;

/// One cached image. The only place the full payload lives durably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedImage {
    pub id: String,
    /// Display payload: a data URI or a remote URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Milliseconds since the epoch, set on write.
    pub timestamp: i64,
}

/// Filesystem-backed image store (no DB).
#[derive(Debug, Clone)]
pub struct BlobCache {
    root: PathBuf,
}

impl BlobCache {
    // Per-entry ceiling so a single runaway payload cannot exhaust the disk.
    // Generated images arrive base64-encoded and fall well below this.
    const MAX_ENTRY_BYTES: usize = 24 * 1024 * 1024;

    /// Open the cache root (idempotent). Handles are cheap clones over the
    /// same directory, so concurrent users converge on one logical store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Upsert an entry. Overwrites any existing payload under the same id.
    ///
    /// A failed write is consequential: the caller loses durability for a
    /// freshly generated image and must fall back to a placeholder, so the
    /// error propagates.
    pub fn write(
        &self,
        id: &str,
        url: &str,
        prompt: Option<&str>,
        mime_type: Option<&str>,
    ) -> Result<CachedImage, StoreError> {
        if url.len() > Self::MAX_ENTRY_BYTES {
            return Err(StoreError::Fault(format!(
                "image payload too large: {} bytes (max {})",
                url.len(),
                Self::MAX_ENTRY_BYTES
            )));
        }
        let record = CachedImage {
            id: id.to_string(),
            url: url.to_string(),
            prompt: prompt.map(str::to_string),
            mime_type: mime_type.map(str::to_string),
            timestamp: Utc::now().timestamp_millis(),
        };
        let bytes = serde_json::to_vec(&record)?;
        write_atomic(&self.entry_path(id), &bytes)?;
        tracing::debug!(id, bytes = bytes.len(), "image cached");
        Ok(record)
    }

    /// Fetch an entry by id.
    ///
    /// Returns `Ok(None)` when the id is absent; errors only on a genuine
    /// storage fault (callers treat that as not-found for display purposes).
    pub fn read(&self, id: &str) -> Result<Option<CachedImage>, StoreError> {
        let path = self.entry_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Fault(err.to_string())),
        };
        let record = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Fault(format!("corrupt cache entry {id}: {err}")))?;
        Ok(Some(record))
    }

    /// Remove one entry. Best-effort: a failure is logged, never raised.
    pub fn delete(&self, id: &str) {
        let path = self.entry_path(id);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(id, %err, "failed to delete cached image");
            }
        }
    }

    /// Remove every entry. Best-effort, same as `delete`.
    pub fn clear(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(%err, "failed to list image cache for clear");
                return;
            }
        };
        for entry in entries.flatten() {
            if let Err(err) = fs::remove_file(entry.path()) {
                tracing::warn!(%err, "failed to remove cached image during clear");
            }
        }
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.root.join(blake3::hash(id.as_bytes()).to_hex().to_string())
    }
}

// Write via a sibling temp file then rename, so readers never observe a
// half-written entry.
fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
