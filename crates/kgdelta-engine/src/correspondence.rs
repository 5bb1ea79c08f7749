//! The correspondence fact store and its derived equivalence classes.
//!
//! Facts are unordered entity pairs with a polarity: positive ("same
//! real-world entity") or negative ("different real-world entity"). The
//! store is monotone within one run: facts are asserted, never deleted, and
//! an assertion that contradicts existing facts is rejected as a whole.
//! Equivalence classes are connected components over the positive facts and
//! are rebuilt from scratch on each query.

use crate::interner::{EntityId, EntityInterner};
use crate::union_find::UnionFind;
use ahash::{AHashMap, AHashSet};
use kgdelta_model::{AspectId, EntityTerm};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Default)]
pub struct CorrespondenceStore {
    interner: EntityInterner,
    /// Symmetric positive adjacency.
    positive: AHashMap<EntityId, AHashSet<EntityId>>,
    /// Symmetric negative adjacency.
    negative: AHashMap<EntityId, AHashSet<EntityId>>,
    /// Entities relevant to each aspect's comparison, in stable id order.
    relevant: AHashMap<AspectId, BTreeSet<EntityId>>,
}

impl CorrespondenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interner(&self) -> &EntityInterner {
        &self.interner
    }

    /// Marks entities as relevant to an aspect without asserting any fact.
    /// Comparators call this for every entity key their patterns yield, so
    /// never-mapped singletons still show up in the class partition.
    pub fn mark_relevant<'a>(
        &mut self,
        aspect: &AspectId,
        entities: impl IntoIterator<Item = &'a EntityTerm>,
    ) {
        let scope = self.relevant.entry(aspect.clone()).or_default();
        for term in entities {
            scope.insert(self.interner.intern(term));
        }
    }

    /// Asserts positive facts between every pair of `entities`.
    ///
    /// The precondition check is atomic over the whole call: if any pair is
    /// already linked negatively, directly or through mutually-negative
    /// classes, nothing is inserted. Already-positive pairs are skipped
    /// (idempotent). On admission all entities are marked relevant to
    /// `aspect`. Returns `true` iff any new fact was inserted.
    pub fn add_correspondence(&mut self, aspect: &AspectId, entities: &[EntityTerm]) -> bool {
        if entities.len() < 2 {
            return false;
        }
        let ids: Vec<EntityId> = entities.iter().map(|t| self.interner.intern(t)).collect();

        // whole-call contradiction check against derived class structure
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                if self.classes_incorrespondent(a, b) {
                    debug!(aspect = %aspect, "correspondence rejected: contradicts negative fact");
                    return false;
                }
            }
        }

        self.relevant
            .entry(aspect.clone())
            .or_default()
            .extend(ids.iter().copied());

        // a star on the first entity is enough: classes are the transitive
        // closure of the positive facts
        let hub = ids[0];
        let mut inserted = false;
        for &other in &ids[1..] {
            if hub != other && !self.has_positive(hub, other) && !self.same_class(hub, other) {
                self.positive.entry(hub).or_default().insert(other);
                self.positive.entry(other).or_default().insert(hub);
                inserted = true;
            }
        }
        inserted
    }

    /// Asserts a negative fact between `a` and `b` unless a positive path
    /// already links them. Returns `true` iff the fact was inserted.
    pub fn add_incorrespondence(
        &mut self,
        aspect: &AspectId,
        a: &EntityTerm,
        b: &EntityTerm,
    ) -> bool {
        let ia = self.interner.intern(a);
        let ib = self.interner.intern(b);
        if ia == ib || self.same_class(ia, ib) {
            debug!(aspect = %aspect, "incorrespondence rejected: entities correspond");
            return false;
        }
        if self.has_negative(ia, ib) {
            return false;
        }
        self.negative.entry(ia).or_default().insert(ib);
        self.negative.entry(ib).or_default().insert(ia);
        true
    }

    /// True iff `a` and `b` are in the same equivalence class.
    pub fn correspond(&self, a: &EntityTerm, b: &EntityTerm) -> bool {
        if a == b {
            return true;
        }
        match (self.interner.id_of(a), self.interner.id_of(b)) {
            (Some(ia), Some(ib)) => self.same_class(ia, ib),
            _ => false,
        }
    }

    /// True iff `a` and `b` are in the same class, or their classes are
    /// linked by a cross-class negative fact. False signals "undetermined",
    /// not "different".
    pub fn correspond_or_incorrespond(&self, a: &EntityTerm, b: &EntityTerm) -> bool {
        if a == b {
            return true;
        }
        let (Some(ia), Some(ib)) = (self.interner.id_of(a), self.interner.id_of(b)) else {
            return false;
        };
        self.same_class(ia, ib) || self.classes_incorrespondent(ia, ib)
    }

    /// Connected component of `entity` under positive facts; a singleton if
    /// there are none.
    pub fn equivalence_class(&self, entity: &EntityTerm) -> BTreeSet<EntityTerm> {
        let Some(id) = self.interner.id_of(entity) else {
            return BTreeSet::from([entity.clone()]);
        };
        self.component_of(id)
            .into_iter()
            .filter_map(|member| self.interner.lookup(member))
            .collect()
    }

    /// All maximal classes over entities relevant to `aspect`, in stable
    /// order. Every relevant entity appears in exactly one class; entities
    /// without any positive fact form singletons.
    pub fn equivalence_classes(&self, aspect: &AspectId) -> Vec<Vec<EntityTerm>> {
        let Some(scope) = self.relevant.get(aspect) else {
            return Vec::new();
        };

        // union-find with path compression, rebuilt from the raw fact set
        let mut uf = UnionFind::new(self.interner.len());
        for (&a, neighbors) in &self.positive {
            for &b in neighbors {
                uf.union(a.raw(), b.raw());
            }
        }

        let mut by_root: AHashMap<u32, Vec<EntityId>> = AHashMap::new();
        for &id in scope {
            by_root.entry(uf.find(id.raw())).or_default().push(id);
        }

        let mut classes: Vec<Vec<EntityTerm>> = by_root
            .into_values()
            .map(|mut members| {
                members.sort();
                members
                    .into_iter()
                    .filter_map(|id| self.interner.lookup(id))
                    .collect()
            })
            .collect();
        classes.sort();
        classes
    }

    /// Entities marked relevant to `aspect`, in stable order.
    pub fn relevant_entities(&self, aspect: &AspectId) -> Vec<EntityTerm> {
        self.relevant
            .get(aspect)
            .map(|scope| {
                scope
                    .iter()
                    .filter_map(|&id| self.interner.lookup(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn positive_fact_count(&self) -> usize {
        self.positive
            .values()
            .map(|neighbours| neighbours.len())
            .sum::<usize>()
            / 2
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn has_positive(&self, a: EntityId, b: EntityId) -> bool {
        self.positive.get(&a).is_some_and(|n| n.contains(&b))
    }

    fn has_negative(&self, a: EntityId, b: EntityId) -> bool {
        self.negative.get(&a).is_some_and(|n| n.contains(&b))
    }

    /// BFS over the positive adjacency.
    fn component_of(&self, start: EntityId) -> Vec<EntityId> {
        let mut seen = AHashSet::from([start]);
        let mut queue = vec![start];
        let mut component = Vec::new();
        while let Some(id) = queue.pop() {
            component.push(id);
            if let Some(neighbors) = self.positive.get(&id) {
                for &next in neighbors {
                    if seen.insert(next) {
                        queue.push(next);
                    }
                }
            }
        }
        component
    }

    fn same_class(&self, a: EntityId, b: EntityId) -> bool {
        a == b || self.component_of(a).contains(&b)
    }

    /// Any cross-class negative fact between the classes of `a` and `b`.
    fn classes_incorrespondent(&self, a: EntityId, b: EntityId) -> bool {
        let class_a = self.component_of(a);
        let class_b: AHashSet<EntityId> = self.component_of(b).into_iter().collect();
        for member in class_a {
            if let Some(negatives) = self.negative.get(&member) {
                if negatives.iter().any(|n| class_b.contains(n)) {
                    return true;
                }
            }
        }
        false
    }
}
