//! Group-driven rendering and parsing of species and sub-documents.
//!
//! Every exposed field carries a list of [`Group`]s.  Rendering keeps a field when one of its
//! groups is in the active normalization set; parsing rejects any attribute none of whose
//! groups is in the active denormalization set.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::errors::CatalogError;
use crate::groups::{Group, GroupSet};
use crate::kind::{Kind, SubDocumentKind};
use crate::species::{Species, SpeciesId, ValidationState};
use crate::structure::parse_validation_state;
use crate::subdocument::{SubDocument, SubDocumentId};

////////////////////////////////////////////// FieldSpec ///////////////////////////////////////////

/// A field and the groups it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Wire name.
    pub name: &'static str,
    /// Groups exposing or accepting the field.
    pub groups: &'static [Group],
}

const fn field(name: &'static str, groups: &'static [Group]) -> FieldSpec {
    FieldSpec { name, groups }
}

const READ_WRITE: &[Group] = &[Group::Read, Group::Write];
const READ_WRITE_COLLECTION: &[Group] = &[Group::Read, Group::ReadCollection, Group::Write];
const PRIVATE: &[Group] = &[Group::ReadUser, Group::ReadEditor, Group::Write];
const REFERENCE: &[Group] = &[Group::Update, Group::Read];

/// Species fields other than the sub-document references.
pub const SPECIES_FIELDS: &[FieldSpec] = &[
    field("id", &[Group::Read, Group::ReadCollection]),
    field("kind", &[Group::Read, Group::ReadCollection, Group::Write]),
    field("validationState", &[Group::ReadEditor, Group::Validate]),
    field("owner", &[Group::ReadEditor, Group::Write]),
    field("dateOfCreation", &[Group::ReadEditor, Group::ReadCollection]),
    field("lastUpdate", &[Group::ReadEditor]),
];

/// Groups of the species property holding sub-documents of type `kind`.
pub fn reference_groups(kind: SubDocumentKind) -> &'static [Group] {
    match kind {
        SubDocumentKind::SpeciesNaming => &[Group::Update, Group::Read, Group::ReadCollection],
        SubDocumentKind::Image => &[Group::WriteThumbnail, Group::Read, Group::ReadCollection],
        _ => REFERENCE,
    }
}

/// Envelope fields shared by every sub-document type.  `id` is always rendered.
pub const SUB_DOCUMENT_FIELDS: &[FieldSpec] = &[
    field("species", &[Group::Write]),
    field("owner", &[Group::ReadEditor]),
    field("dateOfCreation", &[Group::ReadEditor]),
    field("lastUpdate", &[Group::ReadEditor]),
];

const SPECIES_NAMING_FIELDS: &[FieldSpec] = &[
    field("scientificName", READ_WRITE_COLLECTION),
    field("commonNames", READ_WRITE_COLLECTION),
    field("oldNames", READ_WRITE),
    field("familyName", READ_WRITE),
    field("genreName", READ_WRITE),
    field("groupName", READ_WRITE),
];

const WATER_CONSTRAINTS_FIELDS: &[FieldSpec] = &[
    field("phMin", READ_WRITE),
    field("phMax", READ_WRITE),
    field("ghMin", READ_WRITE),
    field("ghMax", READ_WRITE),
    field("tempMin", READ_WRITE),
    field("tempMax", READ_WRITE),
];

const SPECIES_REPRODUCTION_FIELDS: &[FieldSpec] = &[
    field("reproductionMode", READ_WRITE),
    field("incubationDays", PRIVATE),
    field("comment", READ_WRITE),
];

const ANIMAL_BEHAVIOUR_FIELDS: &[FieldSpec] = &[
    field("intraspecificBehaviour", PRIVATE),
    field("extraspecificBehaviour", PRIVATE),
    field("maleFemaleRatio", PRIVATE),
    field("nbMinGroup", READ_WRITE),
    field("maleTerritory", PRIVATE),
    field("femaleTerritory", PRIVATE),
    field("lifeZone", READ_WRITE),
    field("spaceOccupied", READ_WRITE),
    field("aquariumMinWidth", READ_WRITE),
    field("aquariumMinVolume", READ_WRITE),
    field("alimentation", READ_WRITE),
];

const COMMON_LIVING_PROPERTIES_FIELDS: &[FieldSpec] = &[
    field("origin", READ_WRITE),
    field("difficulty", READ_WRITE),
    field("comment", READ_WRITE),
];

const ANIMAL_SPECS_FIELDS: &[FieldSpec] = &[
    field("maleSize", READ_WRITE),
    field("femaleSize", READ_WRITE),
    field("aquariumKind", READ_WRITE),
];

const PLANT_SPECS_FIELDS: &[FieldSpec] = &[
    field("zone", READ_WRITE),
    field("size", READ_WRITE),
    field("soilKind", PRIVATE),
    field("co2", PRIVATE),
    field("growthSpeed", PRIVATE),
    field("fertilizer", PRIVATE),
];

const INVERTEBRATE_SPECS_FIELDS: &[FieldSpec] = &[field("invertebrateSoil", PRIVATE)];

const IMAGE_FIELDS: &[FieldSpec] = &[
    field("filePath", READ_WRITE_COLLECTION),
    field("filename", READ_WRITE),
    field("credit", READ_WRITE),
];

/// Domain fields of sub-documents of type `kind`.
pub fn domain_fields(kind: SubDocumentKind) -> &'static [FieldSpec] {
    match kind {
        SubDocumentKind::SpeciesNaming => SPECIES_NAMING_FIELDS,
        SubDocumentKind::WaterConstraints => WATER_CONSTRAINTS_FIELDS,
        SubDocumentKind::SpeciesReproduction => SPECIES_REPRODUCTION_FIELDS,
        SubDocumentKind::AnimalBehaviour => ANIMAL_BEHAVIOUR_FIELDS,
        SubDocumentKind::CommonLivingProperties => COMMON_LIVING_PROPERTIES_FIELDS,
        SubDocumentKind::AnimalSpecs => ANIMAL_SPECS_FIELDS,
        SubDocumentKind::PlantSpecs => PLANT_SPECS_FIELDS,
        SubDocumentKind::InvertebrateSpecs => INVERTEBRATE_SPECS_FIELDS,
        SubDocumentKind::Image => IMAGE_FIELDS,
    }
}

////////////////////////////////////////////// Rendering ///////////////////////////////////////////

/// Renders a sub-document with the active normalization groups.
pub fn render_sub_document(document: &SubDocument, groups: &BTreeSet<Group>) -> Value {
    let exposed = |spec: &FieldSpec| spec.groups.iter().any(|g| groups.contains(g));
    let mut out = Map::new();
    out.insert("id".to_string(), Value::from(document.id.get()));
    for spec in SUB_DOCUMENT_FIELDS.iter().filter(|s| exposed(s)) {
        let value = match spec.name {
            "species" => Value::from(document.species.get()),
            "owner" => document.owner.clone().map(Value::String).unwrap_or(Value::Null),
            "dateOfCreation" => Value::String(document.date_of_creation.to_rfc3339()),
            "lastUpdate" => Value::String(document.last_update.to_rfc3339()),
            _ => continue,
        };
        out.insert(spec.name.to_string(), value);
    }
    let mut body = document.body.to_map();
    for spec in domain_fields(document.kind()).iter().filter(|s| exposed(s)) {
        let value = body.remove(spec.name).unwrap_or(Value::Null);
        out.insert(spec.name.to_string(), value);
    }
    Value::Object(out)
}

/// Renders a species, embedding the given sub-documents with the same groups.
///
/// `documents` must be the sub-documents pointing at `species`; others are ignored.
pub fn render_species(
    species: &Species,
    documents: &[SubDocument],
    groups: &BTreeSet<Group>,
) -> Value {
    let exposed = |g: &[Group]| g.iter().any(|g| groups.contains(g));
    let mut out = Map::new();
    for spec in SPECIES_FIELDS.iter().filter(|s| exposed(s.groups)) {
        let value = match spec.name {
            "id" => Value::from(species.id.get()),
            "kind" => Value::String(species.kind.to_string()),
            "validationState" => Value::String(species.validation_state.to_string()),
            "owner" => species.owner.clone().map(Value::String).unwrap_or(Value::Null),
            "dateOfCreation" => Value::String(species.date_of_creation.to_rfc3339()),
            "lastUpdate" => Value::String(species.last_update.to_rfc3339()),
            _ => continue,
        };
        out.insert(spec.name.to_string(), value);
    }
    let find = |id: SubDocumentId| {
        documents
            .iter()
            .find(|d| d.id == id && d.species == species.id)
    };
    for kind in SubDocumentKind::ALL {
        if !exposed(reference_groups(kind)) {
            continue;
        }
        let value = if kind.is_multi() {
            Value::Array(
                species
                    .attachments
                    .images()
                    .iter()
                    .filter_map(|id| find(*id))
                    .map(|d| render_sub_document(d, groups))
                    .collect(),
            )
        } else {
            species
                .attachments
                .get(kind)
                .and_then(find)
                .map(|d| render_sub_document(d, groups))
                .unwrap_or(Value::Null)
        };
        out.insert(kind.property().to_string(), value);
    }
    Value::Object(out)
}

/////////////////////////////////////////////// Parsing ////////////////////////////////////////////

/// Rejects attributes of `body` that no active denormalization group accepts.
pub fn check_writable(
    body: &Map<String, Value>,
    fields: impl IntoIterator<Item = FieldSpec>,
    groups: &GroupSet,
) -> Result<(), CatalogError> {
    let writable: BTreeSet<&str> = fields
        .into_iter()
        .filter(|spec| groups.accepts(spec.groups))
        .map(|spec| spec.name)
        .collect();
    let extra: Vec<String> = body
        .keys()
        .filter(|k| !writable.contains(k.as_str()))
        .cloned()
        .collect();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::ExtraAttributes(extra))
    }
}

fn expect_object(body: Value) -> Result<Map<String, Value>, CatalogError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(CatalogError::InvalidBody(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Reads an entity reference given as an integer id or an IRI such as `/api/species/4`.
pub fn parse_reference(field: &str, value: &Value) -> Result<i64, CatalogError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.rsplit('/').next().and_then(|id| id.parse().ok()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        CatalogError::InvalidBody(format!("{} must reference an identifier, got {}", field, value))
    })
}

/// A decoded species write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesWrite {
    /// Requested kind; unknown kinds decode to `None`.
    pub kind: Option<Kind>,
    /// Requested owner.
    pub owner: Option<String>,
    /// Requested validation state.
    pub validation_state: Option<ValidationState>,
    /// Sub-documents to re-point at the species.
    pub references: Vec<(SubDocumentKind, SubDocumentId)>,
}

fn species_write_fields() -> impl Iterator<Item = FieldSpec> {
    SPECIES_FIELDS.iter().copied().chain(
        SubDocumentKind::ALL
            .into_iter()
            .map(|kind| field(kind.property(), reference_groups(kind))),
    )
}

/// Decodes a species body accepted under `groups`.
///
/// A `validationState` outside the legal set is refused before anything else is looked at.
pub fn parse_species_write(body: Value, groups: &GroupSet) -> Result<SpeciesWrite, CatalogError> {
    let body = expect_object(body)?;
    let validation_state = match body.get("validationState") {
        None => None,
        Some(Value::String(raw)) => Some(parse_validation_state(raw)?),
        Some(other) => {
            return Err(CatalogError::InvalidStateValue {
                value: other.to_string(),
            });
        }
    };
    check_writable(&body, species_write_fields(), groups)?;
    let kind = body
        .get("kind")
        .and_then(Value::as_str)
        .and_then(|k| k.parse().ok());
    let owner = body.get("owner").and_then(Value::as_str).map(str::to_string);
    let mut references = vec![];
    for kind in SubDocumentKind::ALL {
        match body.get(kind.property()) {
            None | Some(Value::Null) => {}
            Some(value) => {
                let id = parse_reference(kind.property(), value)?;
                references.push((kind, SubDocumentId(id)));
            }
        }
    }
    Ok(SpeciesWrite {
        kind,
        owner,
        validation_state,
        references,
    })
}

/// A decoded sub-document write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubDocumentWrite {
    /// The species to point at.
    pub species: Option<SpeciesId>,
    /// The domain attributes, still undecoded.
    pub fields: Map<String, Value>,
}

/// Decodes a sub-document body of type `kind` accepted under `groups`.
pub fn parse_sub_document_write(
    kind: SubDocumentKind,
    body: Value,
    groups: &GroupSet,
) -> Result<SubDocumentWrite, CatalogError> {
    let mut fields = expect_object(body)?;
    let specs = SUB_DOCUMENT_FIELDS
        .iter()
        .chain(domain_fields(kind))
        .copied();
    check_writable(&fields, specs, groups)?;
    let species = match fields.remove("species") {
        None | Some(Value::Null) => None,
        Some(value) => Some(SpeciesId(parse_reference("species", &value)?)),
    };
    Ok(SubDocumentWrite { species, fields })
}
