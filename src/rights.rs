//! Maps a caller's roles to what they may see.

use std::collections::{BTreeMap, BTreeSet};

use crate::caller::{Caller, Role};
use crate::kind::{Kind, KindDescriptor};
use crate::species::ValidationState;

/// Resolved access rights of one caller.
///
/// Every registered kind has an entry in the table.  Plain callers see only `published`
/// species; the editor role of a kind adds `posted` for that kind alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRights {
    allowed: BTreeMap<Kind, BTreeSet<ValidationState>>,
    editor_of: BTreeSet<Kind>,
    is_admin: bool,
    is_authenticated: bool,
}

impl AccessRights {
    /// Resolves the rights of `caller`.
    pub fn resolve(caller: &Caller) -> Self {
        let mut allowed = BTreeMap::new();
        let mut editor_of = BTreeSet::new();
        for descriptor in KindDescriptor::all() {
            let mut states = BTreeSet::from([ValidationState::Published]);
            if caller.has_role(descriptor.editor_role) {
                states.insert(ValidationState::Posted);
                editor_of.insert(descriptor.kind);
            }
            allowed.insert(descriptor.kind, states);
        }
        Self {
            allowed,
            editor_of,
            is_admin: caller.has_role(Role::Admin),
            is_authenticated: caller.is_authenticated(),
        }
    }

    /// States of `kind` the caller may see, ignoring the admin bypass.
    pub fn allowed_states(&self, kind: Kind) -> BTreeSet<ValidationState> {
        self.allowed.get(&kind).cloned().unwrap_or_default()
    }

    /// The full rights table.
    pub fn table(&self) -> &BTreeMap<Kind, BTreeSet<ValidationState>> {
        &self.allowed
    }

    /// True when the caller may see a species of `kind` in `state`.
    pub fn may_see(&self, kind: Kind, state: ValidationState) -> bool {
        self.is_admin
            || self
                .allowed
                .get(&kind)
                .is_some_and(|states| states.contains(&state))
    }

    /// True when the caller holds the editor role of `kind`.
    pub fn is_editor_of(&self, kind: Kind) -> bool {
        self.editor_of.contains(&kind)
    }

    /// True for callers holding the admin role.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// True for admins and holders of any kind editor role.
    pub fn is_any_kind_editor(&self) -> bool {
        self.is_admin || !self.editor_of.is_empty()
    }

    /// True when the caller presented an identity.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }
}
