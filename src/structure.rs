//! Structural rules: kind-exclusive sub-documents and legal validation states.

use crate::errors::CatalogError;
use crate::kind::{Kind, SubDocumentKind};
use crate::species::{Species, ValidationState};

/// Fails on the first sub-document the species' kind forbids, in the descriptor's order.
pub fn check_kind_exclusivity(species: &Species) -> Result<(), CatalogError> {
    let descriptor = species.kind.descriptor();
    match descriptor
        .forbidden
        .iter()
        .find(|sub| species.attachments.has(**sub))
    {
        Some(sub) => Err(CatalogError::StructuralViolation {
            kind: species.kind,
            property: sub.property(),
        }),
        None => Ok(()),
    }
}

/// Fails when a species of `kind` may not hold a sub-document of type `sub`.
pub fn check_attachment(kind: Kind, sub: SubDocumentKind) -> Result<(), CatalogError> {
    if kind.descriptor().permits(sub) {
        Ok(())
    } else {
        Err(CatalogError::StructuralViolation {
            kind,
            property: sub.property(),
        })
    }
}

/// Parses a raw `validationState` from a write.
pub fn parse_validation_state(raw: &str) -> Result<ValidationState, CatalogError> {
    ValidationState::ALL
        .into_iter()
        .find(|state| state.as_str() == raw)
        .ok_or_else(|| CatalogError::InvalidStateValue {
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::subdocument::SubDocumentId;

    fn species_with(kind: Kind, subs: &[SubDocumentKind]) -> Species {
        let mut species = Species::new(kind, Utc::now());
        for (i, sub) in subs.iter().enumerate() {
            species.attachments.attach(*sub, SubDocumentId(i as i64 + 1));
        }
        species
    }

    #[test]
    fn fish_with_plant_specs_is_rejected() {
        let err = check_kind_exclusivity(&species_with(
            Kind::Fish,
            &[SubDocumentKind::PlantSpecs],
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "A fish can not have a plantSpecs property");
    }

    #[test]
    fn plant_with_animal_documents_is_rejected() {
        for sub in [SubDocumentKind::AnimalSpecs, SubDocumentKind::AnimalBehaviour] {
            assert!(check_kind_exclusivity(&species_with(Kind::Plant, &[sub])).is_err());
        }
    }

    #[test]
    fn first_forbidden_property_is_named() {
        let err = check_kind_exclusivity(&species_with(
            Kind::Plant,
            &[SubDocumentKind::AnimalBehaviour, SubDocumentKind::InvertebrateSpecs],
        ))
        .unwrap_err();
        assert_eq!(
            err,
            CatalogError::StructuralViolation {
                kind: Kind::Plant,
                property: "invertebrateSpecs",
            }
        );
    }

    #[test]
    fn fish_with_animal_documents_is_accepted() {
        let species = species_with(
            Kind::Fish,
            &[SubDocumentKind::AnimalSpecs, SubDocumentKind::AnimalBehaviour],
        );
        assert_eq!(check_kind_exclusivity(&species), Ok(()));
    }

    #[test]
    fn attachment_check_uses_the_descriptor() {
        assert!(check_attachment(Kind::Invertebrate, SubDocumentKind::PlantSpecs).is_err());
        assert!(check_attachment(Kind::Invertebrate, SubDocumentKind::AnimalSpecs).is_ok());
    }

    #[test]
    fn only_two_states_parse() {
        assert_eq!(parse_validation_state("posted"), Ok(ValidationState::Posted));
        assert_eq!(parse_validation_state("published"), Ok(ValidationState::Published));
        let err = parse_validation_state("draft").unwrap_err();
        assert!(err.to_string().contains(r#"["posted","published"]"#));
        assert!(parse_validation_state("Published").is_err());
    }
}
