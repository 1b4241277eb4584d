//! The root `Species` document.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kind::{Kind, SubDocumentKind};
use crate::ownership::{Owned, Timestamped};
use crate::subdocument::SubDocumentId;

////////////////////////////////////////////// SpeciesId ///////////////////////////////////////////

/// Auto-incremented species identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub i64);

impl SpeciesId {
    /// The raw integer.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for SpeciesId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(SpeciesId)
    }
}

/////////////////////////////////////////// ValidationState ////////////////////////////////////////

/// Publication status of a species.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    /// Draft, visible to editors of the kind and admins.
    #[default]
    Posted,
    /// Public.
    Published,
}

impl ValidationState {
    /// Every legal state.
    pub const ALL: [ValidationState; 2] = [ValidationState::Posted, ValidationState::Published];

    /// The wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationState::Posted => "posted",
            ValidationState::Published => "published",
        }
    }
}

impl Display for ValidationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

///////////////////////////////////////////// Attachments //////////////////////////////////////////

/// The sub-documents currently pointing at a species.
///
/// Derived by the store from sub-document back-references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    single: BTreeMap<SubDocumentKind, SubDocumentId>,
    images: Vec<SubDocumentId>,
}

impl Attachments {
    /// Records that `id` of type `kind` points at the species.
    pub fn attach(&mut self, kind: SubDocumentKind, id: SubDocumentId) {
        if kind.is_multi() {
            if !self.images.contains(&id) {
                self.images.push(id);
            }
        } else {
            self.single.insert(kind, id);
        }
    }

    /// Forgets `id` of type `kind`.
    pub fn detach(&mut self, kind: SubDocumentKind, id: SubDocumentId) {
        if kind.is_multi() {
            self.images.retain(|i| *i != id);
        } else if self.single.get(&kind) == Some(&id) {
            self.single.remove(&kind);
        }
    }

    /// The attached single-valued sub-document of type `kind`.
    pub fn get(&self, kind: SubDocumentKind) -> Option<SubDocumentId> {
        self.single.get(&kind).copied()
    }

    /// The attached images, oldest first.
    pub fn images(&self) -> &[SubDocumentId] {
        &self.images
    }

    /// True when at least one sub-document of type `kind` is attached.
    pub fn has(&self, kind: SubDocumentKind) -> bool {
        if kind.is_multi() {
            !self.images.is_empty()
        } else {
            self.single.contains_key(&kind)
        }
    }
}

/////////////////////////////////////////////// Species ////////////////////////////////////////////

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    /// Store-assigned identifier; zero until first persisted.
    pub id: SpeciesId,
    /// Taxonomic kind, fixed at creation.
    pub kind: Kind,
    /// Publication status.
    pub validation_state: ValidationState,
    /// Identity of the creator, set once.
    pub owner: Option<String>,
    /// Creation instant.
    pub date_of_creation: DateTime<Utc>,
    /// Refreshed before every persist.
    pub last_update: DateTime<Utc>,
    /// Sub-documents pointing at this species.
    pub attachments: Attachments,
}

impl Species {
    /// A new, unpersisted `posted` species.
    pub fn new(kind: Kind, now: DateTime<Utc>) -> Self {
        Self {
            id: SpeciesId::default(),
            kind,
            validation_state: ValidationState::Posted,
            owner: None,
            date_of_creation: now,
            last_update: now,
            attachments: Attachments::default(),
        }
    }

    /// True when anyone may read the species.
    pub fn is_published(&self) -> bool {
        self.validation_state == ValidationState::Published
    }
}

impl Owned for Species {
    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn set_owner(&mut self, owner: String) {
        self.owner = Some(owner);
    }
}

impl Timestamped for Species {
    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_species_is_posted() {
        let now = Utc::now();
        let species = Species::new(Kind::Fish, now);
        assert_eq!(species.validation_state, ValidationState::Posted);
        assert_eq!(species.date_of_creation, species.last_update);
        assert!(!species.is_published());
    }

    #[test]
    fn attachments_track_single_and_multi() {
        let mut attachments = Attachments::default();
        attachments.attach(SubDocumentKind::PlantSpecs, SubDocumentId(3));
        attachments.attach(SubDocumentKind::Image, SubDocumentId(4));
        attachments.attach(SubDocumentKind::Image, SubDocumentId(5));
        attachments.attach(SubDocumentKind::Image, SubDocumentId(5));
        assert_eq!(attachments.get(SubDocumentKind::PlantSpecs), Some(SubDocumentId(3)));
        assert_eq!(attachments.images(), &[SubDocumentId(4), SubDocumentId(5)]);
        assert!(attachments.has(SubDocumentKind::Image));

        attachments.detach(SubDocumentKind::PlantSpecs, SubDocumentId(99));
        assert!(attachments.has(SubDocumentKind::PlantSpecs));
        attachments.detach(SubDocumentKind::PlantSpecs, SubDocumentId(3));
        assert!(!attachments.has(SubDocumentKind::PlantSpecs));
    }

    #[test]
    fn validation_state_wire_names() {
        assert_eq!(serde_json::to_value(ValidationState::Published).unwrap(), "published");
        assert_eq!(ValidationState::default(), ValidationState::Posted);
    }
}
