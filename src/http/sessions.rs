//! Live session tracking.
//!
//! # Responsibilities
//! - Admit upgrades up to the configured session cap
//! - Keep a registry of open sessions (ID, path, open time)
//! - Release the slot when the session ends, however it ends
//!
//! # Design Decisions
//! - Admission is a CAS loop on one counter; the map is bookkeeping only
//! - Slots are held by an RAII guard moved into the session task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use uuid::Uuid;

use crate::observability::metrics;

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub path: String,
    pub opened_at: Instant,
}

#[derive(Debug)]
pub struct SessionTracker {
    sessions: DashMap<Uuid, SessionEntry>,
    active: AtomicUsize,
    max_sessions: AtomicUsize,
}

impl SessionTracker {
    pub fn new(max_sessions: usize) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            active: AtomicUsize::new(0),
            max_sessions: AtomicUsize::new(max_sessions),
        })
    }

    /// Reserve a slot, or `None` when the cap is reached.
    pub fn try_open(self: &Arc<Self>, path: &str) -> Option<SessionGuard> {
        let max = self.max_sessions.load(Ordering::Relaxed);
        let mut prev = self.active.load(Ordering::Relaxed);
        loop {
            if prev >= max {
                return None;
            }
            match self.active.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => prev = current,
            }
        }

        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            SessionEntry {
                path: path.to_string(),
                opened_at: Instant::now(),
            },
        );
        metrics::record_active_sessions(prev + 1);

        Some(SessionGuard {
            id,
            tracker: Arc::clone(self),
        })
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions.load(Ordering::Relaxed)
    }

    /// Applies to future admissions; open sessions are never evicted.
    pub fn set_max_sessions(&self, max_sessions: usize) {
        self.max_sessions.store(max_sessions, Ordering::Relaxed);
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionEntry> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    fn release(&self, id: &Uuid) {
        self.sessions.remove(id);
        let remaining = self.active.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_active_sessions(remaining);
    }
}

/// An admitted session. Dropping it frees the slot.
#[derive(Debug)]
pub struct SessionGuard {
    id: Uuid,
    tracker: Arc<SessionTracker>,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.id);
    }
}
