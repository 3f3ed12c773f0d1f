//! RDF terms and their compact interned handles.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// An RDF term.
///
/// The derived ordering follows SPARQL's ORDER BY precedence: blank nodes sort
/// before IRIs, IRIs before literals, and terms of the same kind compare by
/// their lexical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
    BlankNode(String),
    Iri(String),
    Literal(String),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Self::Literal(lexical.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Self::BlankNode(label.into())
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Self::Iri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// The IRI, label or lexical form without any surface syntax.
    pub fn value(&self) -> &str {
        match self {
            Self::BlankNode(s) | Self::Iri(s) | Self::Literal(s) => s,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankNode(label) => write!(f, "_:{label}"),
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Literal(lexical) => write!(f, "\"{lexical}\""),
        }
    }
}

// ============================================================================
// Term Interning
// ============================================================================

/// Interned term ID (4 bytes, usable as a roaring bitmap member)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Term interner: maps terms to compact IDs and back.
pub struct TermInterner {
    term_to_id: DashMap<Term, NodeId>,
    id_to_term: DashMap<NodeId, Term>,
    next_id: AtomicU32,
}

impl TermInterner {
    pub fn new() -> Self {
        Self {
            term_to_id: DashMap::new(),
            id_to_term: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a term, returning its ID
    pub fn intern(&self, term: &Term) -> NodeId {
        if let Some(id) = self.term_to_id.get(term) {
            return *id;
        }

        let id = *self
            .term_to_id
            .entry(term.clone())
            .or_insert_with(|| NodeId(self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.id_to_term.entry(id).or_insert_with(|| term.clone());
        id
    }

    /// Look up an existing ID for a term without inserting.
    pub fn id_of(&self, term: &Term) -> Option<NodeId> {
        self.term_to_id.get(term).map(|id| *id)
    }

    /// Look up a term by ID
    pub fn lookup(&self, id: NodeId) -> Option<Term> {
        self.id_to_term.get(&id).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.term_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_to_id.is_empty()
    }
}

impl Default for TermInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TermInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermInterner")
            .field("len", &self.len())
            .finish()
    }
}
