//! Indexed triple storage and the lookup contract the query core runs against.

use crate::error::GraphError;
use crate::term::{NodeId, Term, TermInterner};
use ahash::{AHashMap, AHashSet};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

/// An edge `subject -predicate-> object` over interned terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: NodeId,
    pub predicate: NodeId,
    pub object: NodeId,
}

impl Triple {
    pub const fn new(subject: NodeId, predicate: NodeId, object: NodeId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// Pattern-match access to a graph.
///
/// Every position of [`TripleSource::triples`] may be a wildcard (`None`), so
/// callers can walk edges forwards (subject bound) or backwards (object bound).
pub trait TripleSource {
    /// The handle of an already-known term, if the graph mentions it at all.
    fn lookup(&self, term: &Term) -> Option<NodeId>;

    /// The term behind a handle.
    fn resolve(&self, id: NodeId) -> Option<Term>;

    /// All triples matching the pattern; `None` matches anything.
    fn triples(
        &self,
        subject: Option<NodeId>,
        predicate: Option<NodeId>,
        object: Option<NodeId>,
    ) -> Vec<Triple>;

    /// Every node that occurs in subject or object position.
    fn nodes(&self) -> RoaringBitmap;
}

// ============================================================================
// Triple Storage (Edge-List with Indexes)
// ============================================================================

/// In-memory triple store with set semantics.
#[derive(Debug, Default)]
pub struct TripleStore {
    interner: TermInterner,
    triples: Vec<Triple>,
    present: AHashSet<Triple>,
    /// Forward index: (subject, predicate) -> triple IDs
    forward_index: AHashMap<(NodeId, NodeId), Vec<u32>>,
    /// Backward index: (object, predicate) -> triple IDs
    backward_index: AHashMap<(NodeId, NodeId), Vec<u32>>,
    by_subject: AHashMap<NodeId, Vec<u32>>,
    by_object: AHashMap<NodeId, Vec<u32>>,
    /// Predicate index: predicate -> triple IDs
    by_predicate: AHashMap<NodeId, RoaringBitmap>,
    nodes: RoaringBitmap,
}

impl TripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triples stored.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn interner(&self) -> &TermInterner {
        &self.interner
    }

    /// Insert a triple; returns `false` when it was already present.
    ///
    /// Subjects must not be literals and predicates must be IRIs.
    pub fn insert(
        &mut self,
        subject: &Term,
        predicate: &Term,
        object: &Term,
    ) -> Result<bool, GraphError> {
        if subject.is_literal() {
            return Err(GraphError::LiteralSubject(subject.clone()));
        }
        if !predicate.is_iri() {
            return Err(GraphError::NonIriPredicate(predicate.clone()));
        }

        let triple = Triple::new(
            self.interner.intern(subject),
            self.interner.intern(predicate),
            self.interner.intern(object),
        );
        if !self.present.insert(triple) {
            return Ok(false);
        }

        let id = self.triples.len() as u32;
        self.forward_index
            .entry((triple.subject, triple.predicate))
            .or_default()
            .push(id);
        self.backward_index
            .entry((triple.object, triple.predicate))
            .or_default()
            .push(id);
        self.by_subject.entry(triple.subject).or_default().push(id);
        self.by_object.entry(triple.object).or_default().push(id);
        self.by_predicate
            .entry(triple.predicate)
            .or_insert_with(RoaringBitmap::new)
            .insert(id);
        self.nodes.insert(triple.subject.raw());
        self.nodes.insert(triple.object.raw());

        self.triples.push(triple);
        Ok(true)
    }

    /// Insert every triple of an iterator, stopping at the first invalid one.
    pub fn extend<'a, I>(&mut self, triples: I) -> Result<usize, GraphError>
    where
        I: IntoIterator<Item = (&'a Term, &'a Term, &'a Term)>,
    {
        let mut added = 0;
        for (s, p, o) in triples {
            if self.insert(s, p, o)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn contains(&self, subject: NodeId, predicate: NodeId, object: NodeId) -> bool {
        self.present
            .contains(&Triple::new(subject, predicate, object))
    }

    /// Get all objects reachable from `subject` via `predicate`
    pub fn objects(&self, subject: NodeId, predicate: NodeId) -> RoaringBitmap {
        self.forward_index
            .get(&(subject, predicate))
            .map(|ids| self.collect(ids).map(|t| t.object.raw()).collect())
            .unwrap_or_default()
    }

    /// Get all subjects that reach `object` via `predicate`
    pub fn subjects(&self, predicate: NodeId, object: NodeId) -> RoaringBitmap {
        self.backward_index
            .get(&(object, predicate))
            .map(|ids| self.collect(ids).map(|t| t.subject.raw()).collect())
            .unwrap_or_default()
    }

    fn collect<'a>(&'a self, ids: &'a [u32]) -> impl Iterator<Item = &'a Triple> + 'a {
        ids.iter()
            .filter_map(move |&id| self.triples.get(id as usize))
    }

    fn by_ids<I: IntoIterator<Item = u32>>(&self, ids: I) -> Vec<Triple> {
        ids.into_iter()
            .filter_map(|id| self.triples.get(id as usize).copied())
            .collect()
    }
}

impl TripleSource for TripleStore {
    fn lookup(&self, term: &Term) -> Option<NodeId> {
        self.interner.id_of(term)
    }

    fn resolve(&self, id: NodeId) -> Option<Term> {
        self.interner.lookup(id)
    }

    fn triples(
        &self,
        subject: Option<NodeId>,
        predicate: Option<NodeId>,
        object: Option<NodeId>,
    ) -> Vec<Triple> {
        match (subject, predicate, object) {
            (Some(s), Some(p), Some(o)) => {
                if self.contains(s, p, o) {
                    vec![Triple::new(s, p, o)]
                } else {
                    Vec::new()
                }
            }
            (Some(s), Some(p), None) => self
                .forward_index
                .get(&(s, p))
                .map(|ids| self.by_ids(ids.iter().copied()))
                .unwrap_or_default(),
            (None, Some(p), Some(o)) => self
                .backward_index
                .get(&(o, p))
                .map(|ids| self.by_ids(ids.iter().copied()))
                .unwrap_or_default(),
            (Some(s), None, o) => self
                .by_subject
                .get(&s)
                .map(|ids| {
                    self.collect(ids)
                        .filter(|t| o.map_or(true, |o| t.object == o))
                        .copied()
                        .collect()
                })
                .unwrap_or_default(),
            (None, None, Some(o)) => self
                .by_object
                .get(&o)
                .map(|ids| self.by_ids(ids.iter().copied()))
                .unwrap_or_default(),
            (None, Some(p), None) => self
                .by_predicate
                .get(&p)
                .map(|ids| self.by_ids(ids.iter()))
                .unwrap_or_default(),
            (None, None, None) => self.triples.clone(),
        }
    }

    fn nodes(&self) -> RoaringBitmap {
        self.nodes.clone()
    }
}
