//! Taxonomic kinds and the sub-document types a species can carry.
//!
//! Every rule that differs per kind (which editor role elevates it, which sub-documents it
//! must never hold, which sub-documents it needs before publication) lives in a single
//! [`KindDescriptor`] table.  Adding a kind means adding a variant and a descriptor row; the
//! role resolver, structural validator and completion checker iterate the table and need no
//! change.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::caller::Role;

//////////////////////////////////////////////// Kind //////////////////////////////////////////////

/// The taxonomic category of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Fish.
    Fish,
    /// Aquatic plants.
    Plant,
    /// Shrimps, snails, crabs and other invertebrates.
    Invertebrate,
}

impl Kind {
    /// Every registered kind, in descriptor order.
    pub const ALL: [Kind; 3] = [Kind::Fish, Kind::Plant, Kind::Invertebrate];

    /// The wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Fish => "fish",
            Kind::Plant => "plant",
            Kind::Invertebrate => "invertebrate",
        }
    }

    /// Looks up the descriptor carrying this kind's rules.
    pub fn descriptor(self) -> &'static KindDescriptor {
        match self {
            Kind::Fish => &KIND_DESCRIPTORS[0],
            Kind::Plant => &KIND_DESCRIPTORS[1],
            Kind::Invertebrate => &KIND_DESCRIPTORS[2],
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string names no registered kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl Display for UnknownKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "unknown kind {:?}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/////////////////////////////////////////// SubDocumentKind ////////////////////////////////////////

/// The sub-document types that hang off a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubDocumentKind {
    /// Scientific and common names.
    SpeciesNaming,
    /// pH, hardness and temperature ranges.
    WaterConstraints,
    /// Reproduction mode.
    SpeciesReproduction,
    /// Social behaviour and tank requirements of animals.
    AnimalBehaviour,
    /// Origin and keeping difficulty.
    CommonLivingProperties,
    /// Sizes of animals.
    AnimalSpecs,
    /// Placement and growth of plants.
    PlantSpecs,
    /// Invertebrate-only specs.
    InvertebrateSpecs,
    /// Pictures of the species; a species may carry many.
    Image,
}

impl SubDocumentKind {
    /// Every sub-document type.
    pub const ALL: [SubDocumentKind; 9] = [
        SubDocumentKind::SpeciesNaming,
        SubDocumentKind::WaterConstraints,
        SubDocumentKind::SpeciesReproduction,
        SubDocumentKind::AnimalBehaviour,
        SubDocumentKind::CommonLivingProperties,
        SubDocumentKind::AnimalSpecs,
        SubDocumentKind::PlantSpecs,
        SubDocumentKind::InvertebrateSpecs,
        SubDocumentKind::Image,
    ];

    /// The property name under which a species exposes this sub-document.
    pub fn property(self) -> &'static str {
        match self {
            SubDocumentKind::SpeciesNaming => "speciesNaming",
            SubDocumentKind::WaterConstraints => "waterConstraints",
            SubDocumentKind::SpeciesReproduction => "speciesReproduction",
            SubDocumentKind::AnimalBehaviour => "animalBehaviour",
            SubDocumentKind::CommonLivingProperties => "commonLivingProperties",
            SubDocumentKind::AnimalSpecs => "animalSpecs",
            SubDocumentKind::PlantSpecs => "plantSpecs",
            SubDocumentKind::InvertebrateSpecs => "invertebrateSpecs",
            SubDocumentKind::Image => "images",
        }
    }

    /// The storage tag of this sub-document type.
    pub fn as_str(self) -> &'static str {
        match self {
            SubDocumentKind::SpeciesNaming => "species_naming",
            SubDocumentKind::WaterConstraints => "water_constraints",
            SubDocumentKind::SpeciesReproduction => "species_reproduction",
            SubDocumentKind::AnimalBehaviour => "animal_behaviour",
            SubDocumentKind::CommonLivingProperties => "common_living_properties",
            SubDocumentKind::AnimalSpecs => "animal_specs",
            SubDocumentKind::PlantSpecs => "plant_specs",
            SubDocumentKind::InvertebrateSpecs => "invertebrate_specs",
            SubDocumentKind::Image => "image",
        }
    }

    /// The HTTP collection path segment for this sub-document type.
    pub fn collection(self) -> &'static str {
        match self {
            SubDocumentKind::SpeciesNaming => "species_namings",
            SubDocumentKind::WaterConstraints => "water_constraints",
            SubDocumentKind::SpeciesReproduction => "species_reproductions",
            SubDocumentKind::AnimalBehaviour => "animal_behaviours",
            SubDocumentKind::CommonLivingProperties => "common_living_properties",
            SubDocumentKind::AnimalSpecs => "animal_specs",
            SubDocumentKind::PlantSpecs => "plant_specs",
            SubDocumentKind::InvertebrateSpecs => "invertebrate_specs",
            SubDocumentKind::Image => "images",
        }
    }

    /// The path segment under `/species/{id}/` that reads this sub-document directly.
    ///
    /// Living properties and images have none; they are only reachable by their own id.
    pub fn subresource(self) -> Option<&'static str> {
        match self {
            SubDocumentKind::CommonLivingProperties | SubDocumentKind::Image => None,
            _ => Some(self.as_str()),
        }
    }

    /// True when a species may hold many sub-documents of this type.
    pub fn is_multi(self) -> bool {
        matches!(self, SubDocumentKind::Image)
    }
}

impl Display for SubDocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.property())
    }
}

impl FromStr for SubDocumentKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubDocumentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/////////////////////////////////////////// KindDescriptor /////////////////////////////////////////

/// The per-kind rule set.
#[derive(Debug)]
pub struct KindDescriptor {
    /// The kind this row describes.
    pub kind: Kind,
    /// Holding this role lets a caller see and publish unpublished species of the kind.
    pub editor_role: Role,
    /// Sub-documents a species of this kind must never hold, in check order.
    pub forbidden: &'static [SubDocumentKind],
    /// Sub-documents required on top of the common set before publication.
    pub required: &'static [SubDocumentKind],
}

impl KindDescriptor {
    /// Iterates the registered descriptors.
    pub fn all() -> impl Iterator<Item = &'static KindDescriptor> {
        KIND_DESCRIPTORS.iter()
    }

    /// True when a species of this kind may hold the given sub-document type.
    pub fn permits(&self, sub: SubDocumentKind) -> bool {
        !self.forbidden.contains(&sub)
    }
}

static KIND_DESCRIPTORS: [KindDescriptor; 3] = [
    KindDescriptor {
        kind: Kind::Fish,
        editor_role: Role::FishEditor,
        forbidden: &[SubDocumentKind::InvertebrateSpecs, SubDocumentKind::PlantSpecs],
        required: &[SubDocumentKind::AnimalBehaviour, SubDocumentKind::AnimalSpecs],
    },
    KindDescriptor {
        kind: Kind::Plant,
        editor_role: Role::PlantEditor,
        forbidden: &[
            SubDocumentKind::InvertebrateSpecs,
            SubDocumentKind::AnimalSpecs,
            SubDocumentKind::AnimalBehaviour,
        ],
        required: &[SubDocumentKind::PlantSpecs],
    },
    KindDescriptor {
        kind: Kind::Invertebrate,
        editor_role: Role::InvertebrateEditor,
        forbidden: &[SubDocumentKind::PlantSpecs],
        required: &[SubDocumentKind::InvertebrateSpecs],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_descriptor() {
        for kind in Kind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
        assert_eq!(KindDescriptor::all().count(), Kind::ALL.len());
    }

    #[test]
    fn kind_parses_wire_names_only() {
        assert_eq!("fish".parse::<Kind>(), Ok(Kind::Fish));
        assert_eq!("invertebrate".parse::<Kind>(), Ok(Kind::Invertebrate));
        assert!("Fish".parse::<Kind>().is_err());
        assert!("reptile".parse::<Kind>().is_err());
    }

    #[test]
    fn forbidden_and_required_sets_never_overlap() {
        for descriptor in KindDescriptor::all() {
            for required in descriptor.required {
                assert!(descriptor.permits(*required), "{} requires {}", descriptor.kind, required);
            }
        }
    }

    #[test]
    fn plant_forbids_animal_documents() {
        let plant = Kind::Plant.descriptor();
        assert!(!plant.permits(SubDocumentKind::AnimalSpecs));
        assert!(!plant.permits(SubDocumentKind::AnimalBehaviour));
        assert!(plant.permits(SubDocumentKind::PlantSpecs));
    }

    #[test]
    fn sub_document_tags_round_trip() {
        for sub in SubDocumentKind::ALL {
            assert_eq!(sub.as_str().parse::<SubDocumentKind>(), Ok(sub));
        }
        assert!(SubDocumentKind::Image.is_multi());
        assert!(!SubDocumentKind::PlantSpecs.is_multi());
    }

    #[test]
    fn seven_sub_documents_are_subresources() {
        let paths: Vec<&str> = SubDocumentKind::ALL
            .into_iter()
            .filter_map(SubDocumentKind::subresource)
            .collect();
        assert_eq!(paths.len(), 7);
        assert_eq!(SubDocumentKind::SpeciesNaming.subresource(), Some("species_naming"));
        assert_eq!(SubDocumentKind::CommonLivingProperties.subresource(), None);
        assert_eq!(SubDocumentKind::Image.subresource(), None);
    }
}
