//! Build cache for deferred image builds.
//!
//! Encoding is the expensive part of a build: an AVIF through rav1e can take
//! seconds. Pages reuse the same image (a logo, a hero shot) many times, so
//! each unique transformation should be encoded once per build process.
//!
//! # Design
//!
//! The cache is **content-addressed** by [`Fingerprint`]: the SHA-256 of a
//! descriptor's canonical JSON. Equal descriptors on different pages share an
//! entry; any change in input path, operation order, name or argument is a
//! different key and a different output file.
//!
//! There are two tiers:
//!
//! 1. **Memory**: [`BuildCache`] maps fingerprint → public URL for the
//!    lifetime of the owning [`Processor`](crate::process::Processor). It is
//!    never persisted.
//! 2. **Disk**: because the fingerprint is part of the artifact filename, an
//!    existing file at the output path *is* a cache hit. This makes builds
//!    incremental across processes as long as the output directory survives
//!    (e.g. cached in CI).
//!
//! ## Invalidation
//!
//! [`Processor::clear_output_dir`](crate::process::Processor::clear_output_dir)
//! empties the memory tier and deletes the output directory, so the next
//! build re-encodes everything. Nothing else evicts entries.

use crate::fingerprint::Fingerprint;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// In-memory fingerprint → URL map, shared by concurrent build tasks.
#[derive(Debug, Default)]
pub struct BuildCache {
    entries: Mutex<HashMap<Fingerprint, String>>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Fingerprint, String>> {
        // A panicking build task can't leave the map half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<String> {
        self.entries().get(fingerprint).cloned()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries().contains_key(fingerprint)
    }

    pub fn insert(&self, fingerprint: Fingerprint, url: String) {
        self.entries().insert(fingerprint, url);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary of cache performance for a processor's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Fingerprint already in the memory tier.
    pub hits: u32,
    /// Artifact already on disk from an earlier process.
    pub on_disk: u32,
    /// Engine invocations that succeeded.
    pub built: u32,
    /// Engine invocations that failed.
    pub failed: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn disk_hit(&mut self) {
        self.on_disk += 1;
    }

    pub fn build(&mut self) {
        self.built += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.on_disk + self.built + self.failed
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.on_disk > 0 {
            write!(
                f,
                "{} cached, {} on disk, {} built",
                self.hits, self.on_disk, self.built
            )?;
        } else {
            write!(f, "{} built", self.built)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.total() != self.built {
            write!(f, " ({} total)", self.total())?;
        }
        Ok(())
    }
}
