//! Query predicates restricting species queries to what a caller may see.
//!
//! The predicate is data, not a closure, so each storage backend renders it into its own
//! query language.  [`VisibilityPredicate::admits`] is the reference evaluation used by the
//! in-memory store and by tests.

use std::collections::BTreeSet;

use crate::kind::{Kind, SubDocumentKind};
use crate::rights::AccessRights;
use crate::species::ValidationState;

/// The resource a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// The species collection.
    Species,
    /// A sub-document collection.
    SubDocument(SubDocumentKind),
}

/// `kind = K AND validationState IN states`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindClause {
    /// The kind matched.
    pub kind: Kind,
    /// States admitted for that kind.
    pub states: BTreeSet<ValidationState>,
}

/// Restriction applied inside query execution, before counting and paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VisibilityPredicate {
    /// No restriction.
    #[default]
    Unrestricted,
    /// The OR of the clauses.
    AnyOf(Vec<KindClause>),
}

impl VisibilityPredicate {
    /// True when a species of `kind` in `state` passes the predicate.
    pub fn admits(&self, kind: Kind, state: ValidationState) -> bool {
        match self {
            VisibilityPredicate::Unrestricted => true,
            VisibilityPredicate::AnyOf(clauses) => clauses
                .iter()
                .any(|c| c.kind == kind && c.states.contains(&state)),
        }
    }
}

/// Builds the predicate for `resource` from the caller's rights.
///
/// Only species queries by non-admins are restricted.
pub fn visibility_filter(rights: &AccessRights, resource: ResourceType) -> VisibilityPredicate {
    if rights.is_admin() || resource != ResourceType::Species {
        return VisibilityPredicate::Unrestricted;
    }
    VisibilityPredicate::AnyOf(
        rights
            .table()
            .iter()
            .map(|(kind, states)| KindClause {
                kind: *kind,
                states: states.clone(),
            })
            .collect(),
    )
}
