//! Quiver graph: interned in-memory RDF triple storage.
//!
//! This crate is the storage collaborator of the query core. It answers
//! `(subject, predicate, object)` pattern lookups where any position may be a
//! wildcard, in both traversal directions.
//!
//! Key pieces:
//! 1. **Term Interning**: every term is stored once and referenced by a `u32`
//!    [`NodeId`], so node sets can be held in Roaring bitmaps
//! 2. **Indexes**: `(s,p)`, `(o,p)`, `s`, `o` and `p` indexes over the edge list
//! 3. **[`TripleSource`]**: the lookup trait the query core is written against

mod error;
mod store;
mod term;

pub use error::GraphError;
pub use store::{Triple, TripleSource, TripleStore};
pub use term::{NodeId, Term, TermInterner};
