//! Composable boolean predicates.
//!
//! A [`Q`] tree is built without touching any document type. It is lowered to a single
//! [`QueryFragment`] only when [`Q::to_query`] is called, so the same tree can be lowered
//! against several types.
//!
//! Negation is pushed down to the leaves, because store negation is scoped to one field:
//! a negated AND becomes an OR of negated children, a negated OR becomes the AND of negated
//! children, and a negated leaf negates each of its predicates.
//!
//! ```ignore
//! let adults_not_named_bob = Q::from(filters! { "age__gte" => 18 }) & !Q::from(filters! { "name" => "Bob" });
//! ```

use std::ops::{BitAnd, BitOr, Not};

use bson::{Bson, Document};

use crate::{
    error::MapperResult,
    filter::Filters,
    fragment::QueryFragment,
    schema::DocumentType,
    transform::{compile_filters, transform, validate_fields},
};

const OR: &str = "$or";
const AND: &str = "$and";

/// A deferred predicate tree over filter sets.
#[derive(Debug, Clone, PartialEq)]
pub enum Q {
    Leaf(Filters),
    And(Box<Q>, Box<Q>),
    Or(Box<Q>, Box<Q>),
    Not(Box<Q>),
}

impl Q {
    pub fn new(filters: Filters) -> Self {
        Q::Leaf(filters)
    }

    pub fn and(self, other: Q) -> Q {
        Q::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Q) -> Q {
        Q::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Q {
        Q::Not(Box::new(self))
    }

    /// Runs [`validate_fields`] on every leaf.
    pub fn validate(&self, document_type: &DocumentType) -> MapperResult<()> {
        match self {
            Q::Leaf(filters) => validate_fields(document_type, filters),
            Q::And(left, right) | Q::Or(left, right) => {
                left.validate(document_type)?;
                right.validate(document_type)
            }
            Q::Not(inner) => inner.validate(document_type),
        }
    }

    /// Lowers the tree against a document type.
    pub fn to_query(&self, document_type: &DocumentType) -> MapperResult<QueryFragment> {
        self.lower(document_type, false)
    }

    fn lower(&self, document_type: &DocumentType, negate: bool) -> MapperResult<QueryFragment> {
        Ok(match (self, negate) {
            (Q::Leaf(filters), false) => transform(document_type, filters)?,
            (Q::Leaf(filters), true) => {
                let mut negated = compile_filters(document_type, filters)?
                    .into_iter()
                    .map(|predicate| predicate.into_negated_query())
                    .collect::<Vec<_>>();

                match negated.len() {
                    0 => QueryFragment::single("$nor", vec![Bson::Document(Document::new())]),
                    1 => negated.remove(0),
                    _ => any_of(negated),
                }
            }
            (Q::And(left, right), false) | (Q::Or(left, right), true) => {
                all_of(left.lower(document_type, negate)?, right.lower(document_type, negate)?)
            }
            (Q::Or(left, right), false) | (Q::And(left, right), true) => any_of(vec![
                left.lower(document_type, negate)?,
                right.lower(document_type, negate)?,
            ]),
            (Q::Not(inner), _) => inner.lower(document_type, !negate)?,
        })
    }
}

/// Deep-merges both sides. When they share a key whose values are not both documents, such as
/// a logical key or a field matched by value twice, the two are kept apart under `$and`.
fn all_of(left: QueryFragment, right: QueryFragment) -> QueryFragment {
    if conflicts(left.as_document(), right.as_document()) {
        QueryFragment::single(AND, vec![Bson::from(left), Bson::from(right)])
    } else {
        left.merged(right)
    }
}

fn conflicts(left: &Document, right: &Document) -> bool {
    right.iter().any(|(key, incoming)| match (left.get(key), incoming) {
        (None, _) => false,
        (Some(Bson::Document(existing)), Bson::Document(nested)) => conflicts(existing, nested),
        (Some(_), _) => true,
    })
}

/// Joins fragments under `$or`, flattening fragments that are themselves a bare `$or`.
fn any_of(fragments: Vec<QueryFragment>) -> QueryFragment {
    let mut branches = Vec::new();

    for fragment in fragments {
        let document = fragment.into_document();

        match document.get(OR) {
            Some(Bson::Array(nested)) if document.len() == 1 => branches.extend(nested.iter().cloned()),
            _ => branches.push(Bson::Document(document)),
        }
    }

    QueryFragment::single(OR, branches)
}

impl From<Filters> for Q {
    fn from(filters: Filters) -> Self {
        Q::Leaf(filters)
    }
}

impl BitAnd for Q {
    type Output = Q;

    fn bitand(self, rhs: Q) -> Q {
        self.and(rhs)
    }
}

impl BitOr for Q {
    type Output = Q;

    fn bitor(self, rhs: Q) -> Q {
        self.or(rhs)
    }
}

impl Not for Q {
    type Output = Q;

    fn not(self) -> Q {
        Q::Not(Box::new(self))
    }
}
