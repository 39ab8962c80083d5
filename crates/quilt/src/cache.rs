//! Per-instance staleness tracking
//!
//! The marker table is refreshed by every tree walk. Compile cache entries are
//! only trusted while the marker recorded at fill time still matches the one the
//! latest walk observed. There is no content hashing: a file rewritten without
//! its modification time moving is served from the cache.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use log::trace;
use rustc_hash::FxHashMap;

/// Opaque staleness stamp for a path
pub type Marker = SystemTime;

#[derive(Debug, Default)]
pub struct MarkerTable {
    markers: FxHashMap<PathBuf, Marker>,
}

impl MarkerTable {
    pub fn record(&mut self, path: &Path, marker: Marker) {
        self.markers.insert(path.to_path_buf(), marker);
    }

    /// Take over every marker recorded in `other`
    pub fn merge(&mut self, other: Self) {
        self.markers.extend(other.markers);
    }

    pub fn get(&self, path: &Path) -> Option<Marker> {
        self.markers.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    marker: Marker,
    source: String,
}

/// Translated output keyed by path
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: FxHashMap<PathBuf, CacheEntry>,
}

impl CompileCache {
    /// Return the cached translation if its marker matches the current one
    pub fn lookup(&self, path: &Path, markers: &MarkerTable) -> Option<&str> {
        let entry = self.entries.get(path)?;
        match markers.get(path) {
            Some(current) if current == entry.marker => Some(entry.source.as_str()),
            _ => {
                trace!("Stale compile cache entry for {}", path.display());
                None
            }
        }
    }

    pub fn store(&mut self, path: &Path, marker: Marker, source: String) {
        self.entries
            .insert(path.to_path_buf(), CacheEntry { marker, source });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
