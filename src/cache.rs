//! Artifact cache keyed by request fingerprint.

use crate::job::JobRequest;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Stable hash of everything that determines a job's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    pub fn of(request: &JobRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.prompt.trim().as_bytes());
        hasher.update([0u8]);
        for image in &request.images {
            hasher.update(image.as_bytes());
            hasher.update([0u8]);
        }
        // JobParameters serializes with a fixed field order.
        if let Ok(params) = serde_json::to_vec(&request.parameters) {
            hasher.update(&params);
        }
        hasher.update([0u8]);
        hasher.update(request.kind.url_key().as_bytes());

        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Hex form of the fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps request fingerprints to artifacts already on disk.
pub trait ArtifactCache: Send + Sync {
    /// Looks up the artifact for a fingerprint.
    fn get(&self, fingerprint: &Fingerprint) -> Option<PathBuf>;

    /// Records the artifact for a fingerprint, replacing any previous entry.
    fn insert(&self, fingerprint: Fingerprint, path: PathBuf);

    /// Drops an entry, returning its path.
    fn remove(&self, fingerprint: &Fingerprint) -> Option<PathBuf>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns true if the cache holds nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded in-process cache. Entries are never evicted.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Fingerprint, PathBuf>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactCache for MemoryCache {
    fn get(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(fingerprint).cloned()
    }

    fn insert(&self, fingerprint: Fingerprint, path: PathBuf) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(fingerprint, path);
    }

    fn remove(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(fingerprint)
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
