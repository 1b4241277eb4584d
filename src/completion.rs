//! Decides whether a species holds everything publication needs.

use crate::kind::SubDocumentKind;
use crate::species::Species;

/// Sub-documents every kind needs before publication.  `Image` means at least one image.
pub const COMMON_REQUIREMENTS: [SubDocumentKind; 5] = [
    SubDocumentKind::CommonLivingProperties,
    SubDocumentKind::SpeciesNaming,
    SubDocumentKind::SpeciesReproduction,
    SubDocumentKind::WaterConstraints,
    SubDocumentKind::Image,
];

/// The sub-documents still missing before `species` may be published.
///
/// When any common requirement is missing only those are reported; the kind-specific ones
/// are checked once the common set is complete.
pub fn missing_for_publication(species: &Species) -> Vec<SubDocumentKind> {
    let missing: Vec<_> = COMMON_REQUIREMENTS
        .into_iter()
        .filter(|sub| !species.attachments.has(*sub))
        .collect();
    if !missing.is_empty() {
        return missing;
    }
    species
        .kind
        .descriptor()
        .required
        .iter()
        .copied()
        .filter(|sub| !species.attachments.has(*sub))
        .collect()
}

/// True when nothing is missing.
pub fn is_ready_to_publish(species: &Species) -> bool {
    missing_for_publication(species).is_empty()
}
