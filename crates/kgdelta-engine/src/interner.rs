//! Entity interning: terms stored once, referenced by dense u32 id.
//!
//! Correspondence facts and union-find parents are kept on ids, not terms;
//! the id is the stable internal identity the comparison logic relies on,
//! independent of any external string form.

use dashmap::DashMap;
use kgdelta_model::EntityTerm;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Interned entity id (4 bytes instead of a heap-allocated term).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Entity interner: maps terms to compact ids and back.
pub struct EntityInterner {
    term_to_id: DashMap<EntityTerm, EntityId>,
    id_to_term: DashMap<EntityId, EntityTerm>,
    next_id: AtomicU32,
}

impl EntityInterner {
    pub fn new() -> Self {
        Self {
            term_to_id: DashMap::new(),
            id_to_term: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a term, returning its id. Concurrent calls for the same term
    /// agree on one id; the entry shard lock makes minting atomic.
    pub fn intern(&self, term: &EntityTerm) -> EntityId {
        if let Some(id) = self.term_to_id.get(term) {
            return *id;
        }

        let id = *self
            .term_to_id
            .entry(term.clone())
            .or_insert_with(|| EntityId(self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.id_to_term.entry(id).or_insert_with(|| term.clone());
        id
    }

    /// Look up an existing id without inserting.
    pub fn id_of(&self, term: &EntityTerm) -> Option<EntityId> {
        self.term_to_id.get(term).map(|id| *id)
    }

    /// Look up the term of an id.
    pub fn lookup(&self, id: EntityId) -> Option<EntityTerm> {
        self.id_to_term.get(&id).map(|t| t.clone())
    }

    /// Number of interned entities; also the exclusive upper bound of ids.
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EntityInterner {
    fn default() -> Self {
        Self::new()
    }
}
