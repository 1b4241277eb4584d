//! Serialization groups: which fields an operation exposes or accepts.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::rights::AccessRights;

/////////////////////////////////////////////// Group //////////////////////////////////////////////

/// A tag attached to fields.  A field is rendered or accepted when one of its groups is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    /// `species:read`
    Read,
    /// `species:read:collection`
    ReadCollection,
    /// `species:read:user`
    ReadUser,
    /// `species:read:editor`
    ReadEditor,
    /// `species:write`
    Write,
    /// `species:write:thumbnail`
    WriteThumbnail,
    /// `species:update`
    Update,
    /// `species:validate`
    Validate,
}

impl Group {
    /// The group tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Read => "species:read",
            Group::ReadCollection => "species:read:collection",
            Group::ReadUser => "species:read:user",
            Group::ReadEditor => "species:read:editor",
            Group::Write => "species:write",
            Group::WriteThumbnail => "species:write:thumbnail",
            Group::Update => "species:update",
            Group::Validate => "species:validate",
        }
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

///////////////////////////////////////////// Direction ////////////////////////////////////////////

/// Whether groups are chosen for output or for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Normalization.
    Read,
    /// Denormalization.
    Write,
}

/// Groups the caller's rights add on top of an operation's base groups.
///
/// Writes always get `species:write`; editors and plain users share it.  Reads get exactly
/// one of `species:read:editor`, `species:read:user` or nothing.
pub fn select_groups(rights: &AccessRights, direction: Direction) -> Vec<Group> {
    match direction {
        Direction::Write => vec![Group::Write],
        Direction::Read if rights.is_any_kind_editor() => vec![Group::ReadEditor],
        Direction::Read if rights.is_authenticated() => vec![Group::ReadUser],
        Direction::Read => vec![],
    }
}

///////////////////////////////////////////// Operation ////////////////////////////////////////////

/// The operations that carry their own base groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `GET /species`
    ListSpecies,
    /// `GET /species/{id}`
    GetSpecies,
    /// `POST /species`
    CreateSpecies,
    /// `PATCH /species/{id}`
    UpdateSpecies,
    /// `PATCH /species/{id}/validate`
    ValidateSpecies,
    /// `GET /{collection}/{id}`
    ReadSubDocument,
    /// `POST|PATCH /{collection}`
    WriteSubDocument,
}

impl Operation {
    fn base_read(self) -> &'static [Group] {
        match self {
            Operation::ListSpecies => &[Group::ReadCollection],
            Operation::ValidateSpecies => &[Group::ReadEditor],
            _ => &[Group::Read],
        }
    }

    fn base_write(self) -> &'static [Group] {
        match self {
            Operation::CreateSpecies | Operation::WriteSubDocument => &[Group::Write],
            Operation::UpdateSpecies => &[Group::Update],
            Operation::ValidateSpecies => &[Group::Validate],
            _ => &[],
        }
    }
}

////////////////////////////////////////////// GroupSet ////////////////////////////////////////////

/// The groups active for one request, per direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSet {
    /// Groups used to render the response.
    pub normalize: BTreeSet<Group>,
    /// Groups used to accept the request body.
    pub denormalize: BTreeSet<Group>,
}

impl GroupSet {
    /// Combines the base groups of `operation` with the caller's extra groups.
    ///
    /// Publish-validation bodies only ever accept `species:validate`.
    pub fn for_operation(operation: Operation, rights: &AccessRights) -> Self {
        let mut normalize: BTreeSet<Group> = operation.base_read().iter().copied().collect();
        normalize.extend(select_groups(rights, Direction::Read));
        let mut denormalize: BTreeSet<Group> = operation.base_write().iter().copied().collect();
        if operation != Operation::ValidateSpecies && !denormalize.is_empty() {
            denormalize.extend(select_groups(rights, Direction::Write));
        }
        Self {
            normalize,
            denormalize,
        }
    }

    /// True when any of `groups` is active for rendering.
    pub fn exposes(&self, groups: &[Group]) -> bool {
        groups.iter().any(|g| self.normalize.contains(g))
    }

    /// True when any of `groups` is active for writing.
    pub fn accepts(&self, groups: &[Group]) -> bool {
        groups.iter().any(|g| self.denormalize.contains(g))
    }
}
