//! Bijective translation table between renderer ids and stable screen ids.
//!
//! The table owns the monotonic counter that hands out [`ScreenId`]s.  Screen
//! groups share the same numbering space but have no renderer counterpart, so
//! the table also tracks the set of live stable ids independently of the two
//! direction maps.
//!
//! The table itself is not synchronised; the topology manager only touches it
//! while holding its own lock.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::ids::{RsScreenId, ScreenId};

/// Renderer id ↔ stable id translation table.
///
/// # Examples
///
/// ```rust
/// use dms_core::domain::id_table::ScreenIdTable;
/// use dms_core::domain::ids::RsScreenId;
///
/// let mut table = ScreenIdTable::new();
/// let screen = table.allocate(Some(RsScreenId(7)));
/// assert_eq!(table.to_renderer(screen), Some(RsScreenId(7)));
/// assert_eq!(table.to_stable(RsScreenId(7)), Some(screen));
/// ```
#[derive(Debug, Default)]
pub struct ScreenIdTable {
    next: u64,
    rs_to_stable: HashMap<RsScreenId, ScreenId>,
    stable_to_rs: HashMap<ScreenId, RsScreenId>,
    live: HashSet<ScreenId>,
}

impl ScreenIdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a fresh stable id, optionally bound to a renderer id.
    ///
    /// A renderer id that is already mapped keeps its existing stable id, so
    /// the two maps stay mutual inverses.  Ids are never reused while live.
    pub fn allocate(&mut self, rs_id: Option<RsScreenId>) -> ScreenId {
        if let Some(rs_id) = rs_id {
            if let Some(&existing) = self.rs_to_stable.get(&rs_id) {
                warn!(%rs_id, screen_id = %existing, "renderer id already mapped");
                return existing;
            }
        }

        let id = loop {
            let candidate = ScreenId(self.next);
            self.next = self.next.wrapping_add(1);
            if !self.live.contains(&candidate) {
                break candidate;
            }
        };

        self.live.insert(id);
        if let Some(rs_id) = rs_id {
            self.rs_to_stable.insert(rs_id, id);
            self.stable_to_rs.insert(id, rs_id);
        }
        debug!(screen_id = %id, ?rs_id, "allocated stable screen id");
        id
    }

    /// Releases a stable id and its renderer mapping, if any.
    ///
    /// Returns `false` when the id was not live.
    pub fn release(&mut self, id: ScreenId) -> bool {
        if !self.live.remove(&id) {
            return false;
        }
        if let Some(rs_id) = self.stable_to_rs.remove(&id) {
            self.rs_to_stable.remove(&rs_id);
        }
        debug!(screen_id = %id, "released stable screen id");
        true
    }

    pub fn to_renderer(&self, id: ScreenId) -> Option<RsScreenId> {
        self.stable_to_rs.get(&id).copied()
    }

    pub fn to_stable(&self, rs_id: RsScreenId) -> Option<ScreenId> {
        self.rs_to_stable.get(&rs_id).copied()
    }

    pub fn has_renderer_id(&self, rs_id: RsScreenId) -> bool {
        self.rs_to_stable.contains_key(&rs_id)
    }

    pub fn has_stable_id(&self, id: ScreenId) -> bool {
        self.live.contains(&id)
    }

    /// Number of live stable ids, groups included.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Iterates over every live renderer ↔ stable pair.
    pub fn mappings(&self) -> impl Iterator<Item = (RsScreenId, ScreenId)> + '_ {
        self.rs_to_stable.iter().map(|(rs, id)| (*rs, *id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
