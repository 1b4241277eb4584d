//! Sub-documents: the slices of species data stored as their own records.
//!
//! Every sub-document shares the same envelope ([`SubDocument`]): an identifier, the species it
//! points at, an owner and two timestamps.  The domain fields live in one struct per type,
//! gathered in [`SubDocumentBody`].  Each struct validates itself and reports every failed
//! constraint at once.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CatalogError, Violation};
use crate::kind::SubDocumentKind;
use crate::ownership::{Owned, Timestamped};
use crate::species::SpeciesId;

//////////////////////////////////////////// SubDocumentId /////////////////////////////////////////

/// Auto-incremented sub-document identifier, unique across all sub-document types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubDocumentId(pub i64);

impl SubDocumentId {
    /// The raw integer.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for SubDocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubDocumentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(SubDocumentId)
    }
}

///////////////////////////////////////////// SubDocument //////////////////////////////////////////

/// A stored sub-document.
#[derive(Debug, Clone, PartialEq)]
pub struct SubDocument {
    /// Store-assigned identifier; zero until first persisted.
    pub id: SubDocumentId,
    /// The species this sub-document describes.
    pub species: SpeciesId,
    /// Identity of the creator, set once.
    pub owner: Option<String>,
    /// Creation instant.
    pub date_of_creation: DateTime<Utc>,
    /// Refreshed before every persist.
    pub last_update: DateTime<Utc>,
    /// Type-specific fields.
    pub body: SubDocumentBody,
}

impl SubDocument {
    /// A new, unpersisted sub-document.
    pub fn new(species: SpeciesId, body: SubDocumentBody, now: DateTime<Utc>) -> Self {
        Self {
            id: SubDocumentId::default(),
            species,
            owner: None,
            date_of_creation: now,
            last_update: now,
            body,
        }
    }

    /// The sub-document type.
    pub fn kind(&self) -> SubDocumentKind {
        self.body.kind()
    }
}

impl Owned for SubDocument {
    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn set_owner(&mut self, owner: String) {
        self.owner = Some(owner);
    }
}

impl Timestamped for SubDocument {
    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
    }
}

/////////////////////////////////////////// SubDocumentBody ////////////////////////////////////////

/// The domain fields of one sub-document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubDocumentBody {
    /// See [`SpeciesNaming`].
    SpeciesNaming(SpeciesNaming),
    /// See [`WaterConstraints`].
    WaterConstraints(WaterConstraints),
    /// See [`SpeciesReproduction`].
    SpeciesReproduction(SpeciesReproduction),
    /// See [`AnimalBehaviour`].
    AnimalBehaviour(AnimalBehaviour),
    /// See [`CommonLivingProperties`].
    CommonLivingProperties(CommonLivingProperties),
    /// See [`AnimalSpecs`].
    AnimalSpecs(AnimalSpecs),
    /// See [`PlantSpecs`].
    PlantSpecs(PlantSpecs),
    /// See [`InvertebrateSpecs`].
    InvertebrateSpecs(InvertebrateSpecs),
    /// See [`Image`].
    Image(Image),
}

impl SubDocumentBody {
    /// Decodes the domain fields of a `kind` sub-document from a JSON object.
    pub fn from_value(kind: SubDocumentKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            SubDocumentKind::SpeciesNaming => Self::SpeciesNaming(serde_json::from_value(value)?),
            SubDocumentKind::WaterConstraints => {
                Self::WaterConstraints(serde_json::from_value(value)?)
            }
            SubDocumentKind::SpeciesReproduction => {
                Self::SpeciesReproduction(serde_json::from_value(value)?)
            }
            SubDocumentKind::AnimalBehaviour => {
                Self::AnimalBehaviour(serde_json::from_value(value)?)
            }
            SubDocumentKind::CommonLivingProperties => {
                Self::CommonLivingProperties(serde_json::from_value(value)?)
            }
            SubDocumentKind::AnimalSpecs => Self::AnimalSpecs(serde_json::from_value(value)?),
            SubDocumentKind::PlantSpecs => Self::PlantSpecs(serde_json::from_value(value)?),
            SubDocumentKind::InvertebrateSpecs => {
                Self::InvertebrateSpecs(serde_json::from_value(value)?)
            }
            SubDocumentKind::Image => Self::Image(serde_json::from_value(value)?),
        })
    }

    /// The sub-document type of this body.
    pub fn kind(&self) -> SubDocumentKind {
        match self {
            Self::SpeciesNaming(_) => SubDocumentKind::SpeciesNaming,
            Self::WaterConstraints(_) => SubDocumentKind::WaterConstraints,
            Self::SpeciesReproduction(_) => SubDocumentKind::SpeciesReproduction,
            Self::AnimalBehaviour(_) => SubDocumentKind::AnimalBehaviour,
            Self::CommonLivingProperties(_) => SubDocumentKind::CommonLivingProperties,
            Self::AnimalSpecs(_) => SubDocumentKind::AnimalSpecs,
            Self::PlantSpecs(_) => SubDocumentKind::PlantSpecs,
            Self::InvertebrateSpecs(_) => SubDocumentKind::InvertebrateSpecs,
            Self::Image(_) => SubDocumentKind::Image,
        }
    }

    /// The fields as a JSON object, absent fields as `null`.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Every constraint the fields fail.
    pub fn violations(&self) -> Vec<Violation> {
        let mut checks = Checks::default();
        match self {
            Self::SpeciesNaming(b) => b.check(&mut checks),
            Self::WaterConstraints(b) => b.check(&mut checks),
            Self::SpeciesReproduction(b) => b.check(&mut checks),
            Self::AnimalBehaviour(b) => b.check(&mut checks),
            Self::CommonLivingProperties(b) => b.check(&mut checks),
            Self::AnimalSpecs(b) => b.check(&mut checks),
            Self::PlantSpecs(b) => b.check(&mut checks),
            Self::InvertebrateSpecs(_) => {}
            Self::Image(b) => b.check(&mut checks),
        }
        checks.0
    }

    /// Fails with every violated constraint.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::ConstraintViolation(violations))
        }
    }
}

//////////////////////////////////////////////// Checks ////////////////////////////////////////////

const NOT_BLANK: &str = "This value should not be blank.";
const INVALID_CHOICE: &str = "The value you selected is not a valid choice.";

#[derive(Default)]
struct Checks(Vec<Violation>);

impl Checks {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(Violation::new(field, message));
    }

    fn present<T>(&mut self, field: &str, value: &Option<T>) -> bool {
        if value.is_none() {
            self.fail(field, NOT_BLANK);
            return false;
        }
        true
    }

    fn not_blank(&mut self, field: &str, value: &Option<String>) {
        if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
            self.fail(field, NOT_BLANK);
        }
    }

    fn choice(&mut self, field: &str, value: &Option<String>, choices: &[&str]) {
        if let Some(v) = value {
            if !choices.contains(&v.as_str()) {
                self.fail(field, INVALID_CHOICE);
            }
        }
    }

    fn range(&mut self, field: &str, value: Option<f64>, min: f64, max: f64) {
        if let Some(v) = value {
            if v < min || v > max {
                self.fail(
                    field,
                    format!("This value should be between {} and {}.", min, max),
                );
            }
        }
    }

    fn greater_than(&mut self, field: &str, value: Option<f64>, bound: f64) {
        if let Some(v) = value {
            if v <= bound {
                self.fail(field, format!("This value should be greater than {}.", bound));
            }
        }
    }

    fn ordered(&mut self, low: (&str, Option<f64>), high: (&str, Option<f64>)) {
        if let (Some(l), Some(h)) = (low.1, high.1) {
            if l >= h {
                self.fail(low.0, format!("This value should be less than {}.", h));
                self.fail(high.0, format!("This value should be greater than {}.", l));
            }
        }
    }

    fn max_length(&mut self, field: &str, value: &Option<String>, max: usize) {
        if value.as_deref().is_some_and(|v| v.chars().count() > max) {
            self.fail(
                field,
                format!(
                    "This value is too long. It should have {} characters or less.",
                    max
                ),
            );
        }
    }
}

fn int(value: Option<i64>) -> Option<f64> {
    value.map(|v| v as f64)
}

/////////////////////////////////////////////// Choices ////////////////////////////////////////////

/// Legal social behaviours.
pub const BEHAVIOURS: &[&str] = &["calm", "timid", "aggressive"];
/// Legal animal life zones.
pub const LIFE_ZONES: &[&str] = &[
    "ground",
    "medium",
    "surface",
    "medium-surface",
    "medium-ground",
    "rocks",
    "snails",
    "everywhere",
];
/// Legal diets.
pub const ALIMENTATIONS: &[&str] = &[
    "carnivorous",
    "vegetarian",
    "omnivorous",
    "omnivorous-vegetarian",
    "omnivorous-carnivorous",
];
/// Legal regions of origin.
pub const ORIGINS: &[&str] = &[
    "amazonia",
    "south-america",
    "central-america",
    "north-america",
    "west-africa",
    "tanganyika",
    "malawi",
    "victoria",
    "madagascar",
    "europe",
    "asia",
    "australia",
    "new-guinea",
    "cosmopolite",
];
/// Legal keeping difficulties.
pub const DIFFICULTIES: &[&str] = &["beginner", "medium", "high"];
/// Legal aquarium kinds for animals.
pub const AQUARIUM_KINDS: &[&str] = &["specific", "individual", "communal"];
/// Legal plant placements.
pub const PLANT_ZONES: &[&str] = &["front", "middle", "back", "surface", "decor"];
/// Legal soils for plants.
pub const SOIL_KINDS: &[&str] = &["sand", "sand-and-fertilizer"];
/// Legal plant growth speeds.
pub const GROWTH_SPEEDS: &[&str] = &["slow", "normal", "fast"];
/// Legal reproduction modes.
pub const REPRODUCTION_MODES: &[&str] = &[
    "ovoviviparous",
    "oviparous",
    "viviparous",
    "mouthbrooder",
    "bubble-nest",
    "cuttings",
    "runners",
    "seeds",
    "division",
];

//////////////////////////////////////////// Domain types //////////////////////////////////////////

/// Scientific and common names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeciesNaming {
    /// Binomial name.
    pub scientific_name: Option<String>,
    /// Trade names.
    pub common_names: Vec<String>,
    /// Former scientific names.
    pub old_names: Vec<String>,
    /// Family.
    pub family_name: Option<String>,
    /// Genus.
    pub genre_name: Option<String>,
    /// Informal group.
    pub group_name: Option<String>,
}

impl SpeciesNaming {
    fn check(&self, checks: &mut Checks) {
        checks.not_blank("scientificName", &self.scientific_name);
        checks.not_blank("familyName", &self.family_name);
    }
}

/// Water chemistry and temperature the species needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaterConstraints {
    /// Lowest pH.
    pub ph_min: Option<f64>,
    /// Highest pH.
    pub ph_max: Option<f64>,
    /// Lowest general hardness.
    pub gh_min: Option<i64>,
    /// Highest general hardness.
    pub gh_max: Option<i64>,
    /// Lowest temperature in Celsius.
    pub temp_min: Option<i64>,
    /// Highest temperature in Celsius.
    pub temp_max: Option<i64>,
}

impl WaterConstraints {
    fn check(&self, checks: &mut Checks) {
        let pairs = [
            (("phMin", self.ph_min), ("phMax", self.ph_max), 14.0),
            (("ghMin", int(self.gh_min)), ("ghMax", int(self.gh_max)), 50.0),
            (("tempMin", int(self.temp_min)), ("tempMax", int(self.temp_max)), 50.0),
        ];
        for (low, high, max) in pairs {
            for (field, value) in [low, high] {
                if checks.present(field, &value) {
                    checks.range(field, value, 0.0, max);
                }
            }
            checks.ordered(low, high);
        }
    }
}

/// How the species reproduces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeciesReproduction {
    /// One of [`REPRODUCTION_MODES`].
    pub reproduction_mode: Option<String>,
    /// Days from spawning to hatching.
    pub incubation_days: Option<i64>,
    /// Free text.
    pub comment: Option<String>,
}

impl SpeciesReproduction {
    fn check(&self, checks: &mut Checks) {
        checks.not_blank("reproductionMode", &self.reproduction_mode);
        checks.choice("reproductionMode", &self.reproduction_mode, REPRODUCTION_MODES);
        checks.greater_than("incubationDays", int(self.incubation_days), 0.0);
        checks.max_length("comment", &self.comment, 255);
    }
}

/// Social behaviour and space needs of an animal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimalBehaviour {
    /// Behaviour towards its own species.
    pub intraspecific_behaviour: Option<String>,
    /// Behaviour towards other species.
    pub extraspecific_behaviour: Option<String>,
    /// Males per female, between 0 and 1.
    pub male_female_ratio: Option<f64>,
    /// Smallest group to keep.
    pub nb_min_group: Option<i64>,
    /// Territory of a male in centimetres.
    pub male_territory: Option<i64>,
    /// Territory of a female in centimetres.
    pub female_territory: Option<i64>,
    /// One of [`LIFE_ZONES`].
    pub life_zone: Option<String>,
    /// Space taken per individual.
    pub space_occupied: Option<i64>,
    /// Smallest tank front length in centimetres.
    pub aquarium_min_width: Option<i64>,
    /// Smallest tank volume in litres.
    pub aquarium_min_volume: Option<i64>,
    /// One of [`ALIMENTATIONS`].
    pub alimentation: Option<String>,
}

impl AnimalBehaviour {
    fn check(&self, checks: &mut Checks) {
        for (field, value) in [
            ("intraspecificBehaviour", &self.intraspecific_behaviour),
            ("extraspecificBehaviour", &self.extraspecific_behaviour),
        ] {
            checks.not_blank(field, value);
            checks.choice(field, value, BEHAVIOURS);
        }
        checks.range("maleFemaleRatio", self.male_female_ratio, 0.0, 1.0);
        checks.present("nbMinGroup", &self.nb_min_group);
        checks.greater_than("nbMinGroup", int(self.nb_min_group), 0.0);
        checks.greater_than("maleTerritory", int(self.male_territory), 0.0);
        checks.greater_than("femaleTerritory", int(self.female_territory), 0.0);
        checks.not_blank("lifeZone", &self.life_zone);
        checks.choice("lifeZone", &self.life_zone, LIFE_ZONES);
        for (field, value) in [
            ("spaceOccupied", self.space_occupied),
            ("aquariumMinWidth", self.aquarium_min_width),
            ("aquariumMinVolume", self.aquarium_min_volume),
        ] {
            checks.greater_than(field, int(value), 0.0);
            checks.present(field, &value);
        }
        checks.not_blank("alimentation", &self.alimentation);
        checks.choice("alimentation", &self.alimentation, ALIMENTATIONS);
    }
}

/// Origin and keeping difficulty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonLivingProperties {
    /// One of [`ORIGINS`].
    pub origin: Option<String>,
    /// One of [`DIFFICULTIES`].
    pub difficulty: Option<String>,
    /// Free text.
    pub comment: Option<String>,
}

impl CommonLivingProperties {
    fn check(&self, checks: &mut Checks) {
        checks.not_blank("origin", &self.origin);
        checks.choice("origin", &self.origin, ORIGINS);
        checks.not_blank("difficulty", &self.difficulty);
        checks.choice("difficulty", &self.difficulty, DIFFICULTIES);
        checks.max_length("comment", &self.comment, 255);
    }
}

/// Adult sizes of an animal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimalSpecs {
    /// Adult male size in centimetres.
    pub male_size: Option<i64>,
    /// Adult female size in centimetres.
    pub female_size: Option<i64>,
    /// One of [`AQUARIUM_KINDS`].
    pub aquarium_kind: Option<String>,
}

impl AnimalSpecs {
    fn check(&self, checks: &mut Checks) {
        for (field, value) in [("maleSize", self.male_size), ("femaleSize", self.female_size)] {
            checks.greater_than(field, int(value), 0.0);
            checks.present(field, &value);
        }
        checks.choice("aquariumKind", &self.aquarium_kind, AQUARIUM_KINDS);
        checks.not_blank("aquariumKind", &self.aquarium_kind);
    }
}

/// Placement and growth of a plant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlantSpecs {
    /// One of [`PLANT_ZONES`].
    pub zone: Option<String>,
    /// Height in centimetres.
    pub size: Option<i64>,
    /// One of [`SOIL_KINDS`].
    pub soil_kind: Option<String>,
    /// Needs CO2 injection.
    pub co2: Option<bool>,
    /// One of [`GROWTH_SPEEDS`].
    pub growth_speed: Option<String>,
    /// Needs liquid fertilizer.
    pub fertilizer: Option<bool>,
}

impl PlantSpecs {
    fn check(&self, checks: &mut Checks) {
        checks.choice("zone", &self.zone, PLANT_ZONES);
        checks.not_blank("zone", &self.zone);
        checks.greater_than("size", int(self.size), 0.0);
        checks.choice("soilKind", &self.soil_kind, SOIL_KINDS);
        checks.not_blank("soilKind", &self.soil_kind);
        checks.choice("growthSpeed", &self.growth_speed, GROWTH_SPEEDS);
    }
}

/// Invertebrate-only specs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvertebrateSpecs {
    /// Needs a dedicated soil.
    pub invertebrate_soil: Option<bool>,
}

/// A picture of the species.  The binary itself lives outside the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Image {
    /// Location of the stored binary.
    pub file_path: Option<String>,
    /// Original file name.
    pub filename: Option<String>,
    /// Author or license credit.
    pub credit: Option<String>,
}

impl Image {
    fn check(&self, checks: &mut Checks) {
        checks.not_blank("filePath", &self.file_path);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn violations(kind: SubDocumentKind, value: Value) -> Vec<(String, String)> {
        SubDocumentBody::from_value(kind, value)
            .unwrap()
            .violations()
            .into_iter()
            .map(|v| (v.property_path, v.message))
            .collect()
    }

    #[test]
    fn naming_requires_names() {
        let found = violations(SubDocumentKind::SpeciesNaming, json!({"commonNames": ["Neon"]}));
        assert_eq!(
            found,
            vec![
                ("scientificName".to_string(), NOT_BLANK.to_string()),
                ("familyName".to_string(), NOT_BLANK.to_string()),
            ]
        );
        let found = violations(
            SubDocumentKind::SpeciesNaming,
            json!({"scientificName": "Paracheirodon innesi", "familyName": "Characidae"}),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn water_constraints_check_ranges_and_order() {
        let found = violations(
            SubDocumentKind::WaterConstraints,
            json!({"phMin": 7.5, "phMax": 6.0, "ghMin": 2, "ghMax": 60, "tempMin": 22, "tempMax": 26}),
        );
        assert_eq!(
            found,
            vec![
                ("phMin".to_string(), "This value should be less than 6.".to_string()),
                ("phMax".to_string(), "This value should be greater than 7.5.".to_string()),
                ("ghMax".to_string(), "This value should be between 0 and 50.".to_string()),
            ]
        );
    }

    #[test]
    fn water_constraints_are_all_required() {
        let found = violations(SubDocumentKind::WaterConstraints, json!({}));
        assert_eq!(found.len(), 6);
        assert!(found.iter().all(|(_, m)| m == NOT_BLANK));
    }

    #[test]
    fn choices_are_enforced() {
        let found = violations(
            SubDocumentKind::CommonLivingProperties,
            json!({"origin": "atlantis", "difficulty": "medium"}),
        );
        assert_eq!(found, vec![("origin".to_string(), INVALID_CHOICE.to_string())]);
    }

    #[test]
    fn behaviour_ratio_is_bounded() {
        let found = violations(
            SubDocumentKind::AnimalBehaviour,
            json!({
                "intraspecificBehaviour": "calm",
                "extraspecificBehaviour": "timid",
                "maleFemaleRatio": 1.5,
                "nbMinGroup": 6,
                "lifeZone": "medium",
                "spaceOccupied": 1,
                "aquariumMinWidth": 60,
                "aquariumMinVolume": 54,
                "alimentation": "omnivorous"
            }),
        );
        assert_eq!(
            found,
            vec![(
                "maleFemaleRatio".to_string(),
                "This value should be between 0 and 1.".to_string()
            )]
        );
    }

    #[test]
    fn comment_length_is_limited() {
        let found = violations(
            SubDocumentKind::CommonLivingProperties,
            json!({"origin": "asia", "difficulty": "high", "comment": "x".repeat(256)}),
        );
        assert_eq!(
            found,
            vec![(
                "comment".to_string(),
                "This value is too long. It should have 255 characters or less.".to_string()
            )]
        );
    }

    #[test]
    fn wrong_types_fail_to_decode() {
        assert!(
            SubDocumentBody::from_value(SubDocumentKind::AnimalSpecs, json!({"maleSize": "big"}))
                .is_err()
        );
    }

    #[test]
    fn body_reports_its_kind() {
        for kind in SubDocumentKind::ALL {
            let body = SubDocumentBody::from_value(kind, json!({})).unwrap();
            assert_eq!(body.kind(), kind);
        }
    }

    #[test]
    fn to_map_renders_absent_fields_as_null() {
        let body = SubDocumentBody::from_value(
            SubDocumentKind::Image,
            json!({"filePath": "/media/neon.jpg"}),
        )
        .unwrap();
        let map = body.to_map();
        assert_eq!(map["filePath"], json!("/media/neon.jpg"));
        assert_eq!(map["credit"], Value::Null);
    }
}
