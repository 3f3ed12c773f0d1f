use crate::term::Term;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("literal {0} cannot be used as a subject")]
    LiteralSubject(Term),
    #[error("predicate must be an IRI (got {0})")]
    NonIriPredicate(Term),
}
