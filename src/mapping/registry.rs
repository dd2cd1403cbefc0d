//! Mapping registry.
//!
//! # Responsibilities
//! - Hold `(PathSpec, Creator, persistent)` registrations, one per spec
//! - Resolve a concrete path to the most specific registration
//! - Publish every mutation atomically to concurrent readers
//!
//! # Design Decisions
//! - Copy-on-write: writers rebuild an immutable snapshot and swap it in
//!   with `ArcSwap::rcu`; readers load the snapshot without locking
//! - Lookup indices are rebuilt per write (writes are rare, reads are hot):
//!   hash tables for exact, prefix and suffix specs, and a pre-sorted list
//!   for templates and regexes
//! - Precedence: exact > prefix > suffix > template > regex, then longer
//!   literal, then the most recent insertion
//! - The `/` exact registration doubles as the fallback for unmatched paths

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::mapping::creator::Creator;
use crate::pathspec::PathSpec;

/// A spec bound to the creator responsible for it.
pub struct Registration {
    pub spec: PathSpec,
    pub creator: Arc<dyn Creator>,
    /// Survives a stop of the owning configuration.
    pub persistent: bool,
    /// Publication order; higher is more recent.
    pub seq: u64,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("spec", &self.spec.to_string())
            .field("persistent", &self.persistent)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Immutable, fully indexed view of the registrations.
#[derive(Default)]
struct MappingSnapshot {
    /// Registrations in publication order.
    entries: Vec<Arc<Registration>>,
    by_spec: HashMap<PathSpec, Arc<Registration>>,
    exact: HashMap<String, Arc<Registration>>,
    prefix: HashMap<String, Arc<Registration>>,
    suffix: HashMap<String, Arc<Registration>>,
    /// Templates and regexes, best candidate first.
    patterns: Vec<Arc<Registration>>,
    root: Option<Arc<Registration>>,
    next_seq: u64,
}

impl MappingSnapshot {
    fn build(entries: Vec<Arc<Registration>>, next_seq: u64) -> Self {
        let mut snapshot = MappingSnapshot {
            next_seq,
            ..Default::default()
        };

        for entry in &entries {
            snapshot.by_spec.insert(entry.spec.clone(), entry.clone());
            match &entry.spec {
                PathSpec::Exact(path) => {
                    if entry.spec.is_root() {
                        snapshot.root = Some(entry.clone());
                    }
                    snapshot.exact.insert(path.clone(), entry.clone());
                }
                PathSpec::Prefix(prefix) => {
                    snapshot.prefix.insert(prefix.clone(), entry.clone());
                }
                PathSpec::Suffix(ext) => {
                    snapshot.suffix.insert(ext.clone(), entry.clone());
                }
                PathSpec::Template(_) | PathSpec::Regex(_) => snapshot.patterns.push(entry.clone()),
            }
        }
        snapshot
            .patterns
            .sort_by_key(|entry| Reverse((entry.spec.specificity(), entry.seq)));
        snapshot.entries = entries;
        snapshot
    }

    fn find(&self, path: &str) -> Option<&Arc<Registration>> {
        if let Some(entry) = self.exact.get(path) {
            return Some(entry);
        }
        self.find_prefix(path)
            .or_else(|| self.find_suffix(path))
            .or_else(|| self.patterns.iter().find(|entry| entry.spec.matches(path)))
            .or(self.root.as_ref())
    }

    /// Walks `path` and its ancestors, longest first.
    fn find_prefix(&self, path: &str) -> Option<&Arc<Registration>> {
        if self.prefix.is_empty() {
            return None;
        }
        let mut candidate = path;
        loop {
            if let Some(entry) = self.prefix.get(candidate) {
                return Some(entry);
            }
            candidate = &candidate[..candidate.rfind('/')?];
        }
    }

    /// Tries every extension of the last segment, longest first.
    fn find_suffix(&self, path: &str) -> Option<&Arc<Registration>> {
        if self.suffix.is_empty() {
            return None;
        }
        let last = path.rsplit('/').next().unwrap_or(path);
        last.match_indices('.')
            .map(|(idx, _)| &last[idx + 1..])
            .filter(|ext| !ext.is_empty())
            .find_map(|ext| self.suffix.get(ext))
    }
}

/// Concurrent registry of path mappings.
pub struct MappingRegistry {
    snapshot: ArcSwap<MappingSnapshot>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(MappingSnapshot::default()),
        }
    }

    /// Insert or replace the registration for `spec`.
    ///
    /// Returns the registration that was replaced, if any.
    pub fn insert(
        &self,
        spec: PathSpec,
        creator: Arc<dyn Creator>,
        persistent: bool,
    ) -> Option<Arc<Registration>> {
        let mut replaced = None;
        self.snapshot.rcu(|current| {
            let registration = Arc::new(Registration {
                spec: spec.clone(),
                creator: creator.clone(),
                persistent,
                seq: current.next_seq,
            });
            replaced = current.by_spec.get(&spec).cloned();
            let entries = current
                .entries
                .iter()
                .filter(|entry| entry.spec != spec)
                .cloned()
                .chain(std::iter::once(registration))
                .collect();
            MappingSnapshot::build(entries, current.next_seq + 1)
        });

        tracing::debug!(
            spec = %spec,
            persistent,
            replaced = replaced.is_some(),
            "Mapping registered"
        );
        replaced
    }

    /// Remove the registration for `spec`. Returns false if there was none.
    pub fn remove(&self, spec: &PathSpec) -> bool {
        let removed = !self.retain(|entry| entry.spec != *spec).is_empty();
        if removed {
            tracing::debug!(spec = %spec, "Mapping removed");
        }
        removed
    }

    /// Keep only registrations satisfying `keep`; returns the dropped ones.
    pub fn retain<F>(&self, keep: F) -> Vec<Arc<Registration>>
    where
        F: Fn(&Registration) -> bool,
    {
        let mut dropped = Vec::new();
        self.snapshot.rcu(|current| {
            let (kept, gone): (Vec<_>, Vec<_>) =
                current.entries.iter().cloned().partition(|entry| keep(entry.as_ref()));
            dropped = gone;
            if dropped.is_empty() {
                return Arc::clone(current);
            }
            Arc::new(MappingSnapshot::build(kept, current.next_seq))
        });
        dropped
    }

    /// Exact structural lookup, no path resolution.
    pub fn get(&self, spec: &PathSpec) -> Option<Arc<Registration>> {
        self.snapshot.load().by_spec.get(spec).cloned()
    }

    /// Best registration for a concrete request path.
    pub fn find(&self, path: &str) -> Option<Arc<Registration>> {
        let snapshot = self.snapshot.load();
        let found = snapshot.find(path).cloned();
        tracing::trace!(
            path = %path,
            spec = ?found.as_ref().map(|entry| entry.spec.to_string()),
            "Mapping lookup"
        );
        found
    }

    /// All registrations in publication order.
    pub fn entries(&self) -> Vec<Arc<Registration>> {
        self.snapshot.load().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}
