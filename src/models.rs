use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GrowError, GrowResult};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCycle {
    #[serde(rename = "24/0")]
    H24_0,
    #[serde(rename = "20/4")]
    H20_4,
    #[serde(rename = "18/6")]
    H18_6,
    #[serde(rename = "16/8")]
    H16_8,
    #[serde(rename = "14/10")]
    H14_10,
    #[serde(rename = "12/12")]
    H12_12,
}

impl LightCycle {
    pub const ALL: [LightCycle; 6] = [
        LightCycle::H24_0,
        LightCycle::H20_4,
        LightCycle::H18_6,
        LightCycle::H16_8,
        LightCycle::H14_10,
        LightCycle::H12_12,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LightCycle::H24_0 => "24/0",
            LightCycle::H20_4 => "20/4",
            LightCycle::H18_6 => "18/6",
            LightCycle::H16_8 => "16/8",
            LightCycle::H14_10 => "14/10",
            LightCycle::H12_12 => "12/12",
        }
    }
}

impl fmt::Display for LightCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightCycle {
    type Err = GrowError;

    fn from_str(s: &str) -> GrowResult<Self> {
        let s = s.trim();
        LightCycle::ALL
            .into_iter()
            .find(|cycle| cycle.as_str() == s)
            .ok_or_else(|| GrowError::Validation(format!("unknown light cycle '{s}'")))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Seedling,
    Veg,
    Flower,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Seedling => "seedling",
            Stage::Veg => "veg",
            Stage::Flower => "flower",
        })
    }
}

impl FromStr for Stage {
    type Err = GrowError;

    fn from_str(s: &str) -> GrowResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seedling" => Ok(Stage::Seedling),
            "veg" => Ok(Stage::Veg),
            "flower" => Ok(Stage::Flower),
            other => Err(GrowError::Validation(format!("unknown stage '{other}'"))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlantType {
    Clone,
    Seed,
}

impl fmt::Display for PlantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlantType::Clone => "clone",
            PlantType::Seed => "seed",
        })
    }
}

impl FromStr for PlantType {
    type Err = GrowError;

    fn from_str(s: &str) -> GrowResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clone" => Ok(PlantType::Clone),
            "seed" => Ok(PlantType::Seed),
            other => Err(GrowError::Validation(format!("unknown plant type '{other}'"))),
        }
    }
}

/// A plant embedded in a grow space. Identified only by its position.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub name: String,
    #[serde(rename = "type")]
    pub plant_type: PlantType,
    #[serde(default)]
    pub pot_size: String,
}

impl Plant {
    pub fn new(name: impl Into<String>, plant_type: PlantType, pot_size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plant_type,
            pot_size: pot_size.into(),
        }
    }

    pub fn apply(&mut self, update: PlantUpdate) {
        match update {
            PlantUpdate::Name(name) => self.name = name,
            PlantUpdate::Type(plant_type) => self.plant_type = plant_type,
            PlantUpdate::PotSize(pot_size) => self.pot_size = pot_size,
        }
    }
}

/// Unit-less, user-entered dimensions.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Dimensions {
    #[serde(default)]
    pub width: String,
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub height: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKey {
    Width,
    Length,
    Height,
}

impl Dimensions {
    pub fn set(&mut self, key: DimensionKey, value: String) {
        match key {
            DimensionKey::Width => self.width = value,
            DimensionKey::Length => self.length = value,
            DimensionKey::Height => self.height = value,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
        write!(
            f,
            "{} x {} x {}",
            part(&self.width),
            part(&self.length),
            part(&self.height)
        )
    }
}

/// A persisted grow space. `id` comes from the store and is not part of the
/// document body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrowSpace {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(deserialize_with = "deserialize_power")]
    pub power: u32,
    pub light_cycle: LightCycle,
    pub stage: Stage,
    #[serde(rename = "plantsDetails", default)]
    pub plants: Vec<Plant>,
}

// Older documents written by the web form hold power as a numeric string.
fn deserialize_power<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Fields supplied when creating a grow space. Presence of the required
/// ones is checked by [`NewGrowSpace::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewGrowSpace {
    pub name: String,
    pub dimensions: Dimensions,
    pub power: Option<u32>,
    pub light_cycle: Option<LightCycle>,
    pub stage: Option<Stage>,
}

impl NewGrowSpace {
    /// Build the record to persist for `owner_id`, or report every missing
    /// required field.
    pub fn validate(self, owner_id: &str) -> GrowResult<GrowSpace> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.power.is_none() {
            missing.push("power");
        }
        if self.light_cycle.is_none() {
            missing.push("lightCycle");
        }
        if self.stage.is_none() {
            missing.push("stage");
        }

        match (self.power, self.light_cycle, self.stage) {
            (Some(power), Some(light_cycle), Some(stage)) if missing.is_empty() => Ok(GrowSpace {
                id: String::new(),
                owner_id: owner_id.to_string(),
                name: self.name,
                dimensions: self.dimensions,
                power,
                light_cycle,
                stage,
                plants: Vec::new(),
            }),
            _ => Err(GrowError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Scratch copy of a grow space's editable fields. Carries neither the id
/// nor the owner, and serializes to exactly the fields a commit writes.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditBuffer {
    pub name: String,
    pub dimensions: Dimensions,
    pub power: u32,
    pub light_cycle: LightCycle,
    pub stage: Stage,
    #[serde(rename = "plantsDetails")]
    pub plants: Vec<Plant>,
}

impl EditBuffer {
    pub fn from_space(space: &GrowSpace) -> Self {
        Self {
            name: space.name.clone(),
            dimensions: space.dimensions.clone(),
            power: space.power,
            light_cycle: space.light_cycle,
            stage: space.stage,
            plants: space.plants.clone(),
        }
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Name(name) => self.name = name,
            FieldUpdate::Power(power) => self.power = power,
            FieldUpdate::LightCycle(cycle) => self.light_cycle = cycle,
            FieldUpdate::Stage(stage) => self.stage = stage,
        }
    }

    pub fn apply_to(self, space: &mut GrowSpace) {
        space.name = self.name;
        space.dimensions = self.dimensions;
        space.power = self.power;
        space.light_cycle = self.light_cycle;
        space.stage = self.stage;
        space.plants = self.plants;
    }
}

/// A single top-level field change in an edit session.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Name(String),
    Power(u32),
    LightCycle(LightCycle),
    Stage(Stage),
}

/// A single field change on one plant of the scratch buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlantUpdate {
    Name(String),
    Type(PlantType),
    PotSize(String),
}

const NOTE_KEY_FORMAT: &str = "%a %b %d %Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar day a note is stored under. Displays as its canonical key,
/// e.g. `Wed Oct 14 2026`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteDate(NaiveDate);

impl NoteDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Drop the time component of `at`, keeping its local calendar day.
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self(at.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NoteDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(NOTE_KEY_FORMAT))
    }
}

impl FromStr for NoteDate {
    type Err = GrowError;

    fn from_str(s: &str) -> GrowResult<Self> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, NOTE_KEY_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(s, ISO_DATE_FORMAT))
            .map(NoteDate)
            .map_err(|_| GrowError::Validation(format!("invalid note date '{s}'")))
    }
}

/// Body of a note document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoteDocument {
    #[serde(default)]
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, Utc};

    fn tent() -> NewGrowSpace {
        NewGrowSpace {
            name: "Tent A".to_string(),
            power: Some(600),
            light_cycle: Some(LightCycle::H18_6),
            stage: Some(Stage::Veg),
            ..Default::default()
        }
    }

    #[test]
    fn validate_builds_empty_plant_list() {
        let space = tent().validate("u1").unwrap();
        assert_eq!(space.owner_id, "u1");
        assert!(space.plants.is_empty());
        assert!(space.id.is_empty());
    }

    #[test]
    fn validate_reports_all_missing_fields() {
        let err = NewGrowSpace {
            name: "   ".to_string(),
            ..Default::default()
        }
        .validate("u1")
        .unwrap_err();
        let msg = err.to_string();
        for field in ["name", "power", "lightCycle", "stage"] {
            assert!(msg.contains(field), "{msg} should mention {field}");
        }
    }

    #[test]
    fn grow_space_document_uses_original_field_names() {
        let mut space = tent().validate("u1").unwrap();
        space.plants.push(Plant::new("OG Kush", PlantType::Clone, "5gal"));
        let value = serde_json::to_value(&space).unwrap();

        assert_eq!(value["userId"], "u1");
        assert_eq!(value["lightCycle"], "18/6");
        assert_eq!(value["stage"], "veg");
        assert_eq!(value["plantsDetails"][0]["type"], "clone");
        assert_eq!(value["plantsDetails"][0]["potSize"], "5gal");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn power_accepts_numeric_strings() {
        let value = serde_json::json!({
            "userId": "u1",
            "name": "Closet",
            "power": "250",
            "lightCycle": "12/12",
            "stage": "flower"
        });
        let space: GrowSpace = serde_json::from_value(value).unwrap();
        assert_eq!(space.power, 250);
        assert_eq!(space.dimensions, Dimensions::default());
        assert!(space.plants.is_empty());
    }

    #[test]
    fn edit_buffer_serializes_editable_fields_only() {
        let space = tent().validate("u1").unwrap();
        let value = serde_json::to_value(EditBuffer::from_space(&space)).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(!keys.contains(&"userId"));
        assert!(keys.contains(&"plantsDetails"));
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn enums_parse_from_form_values() {
        assert_eq!("14/10".parse::<LightCycle>().unwrap(), LightCycle::H14_10);
        assert_eq!("Flower".parse::<Stage>().unwrap(), Stage::Flower);
        assert_eq!("seed".parse::<PlantType>().unwrap(), PlantType::Seed);
        assert!("13/11".parse::<LightCycle>().is_err());
    }

    #[test]
    fn note_date_key_is_day_level() {
        let date = NoteDate::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(date.key(), "Tue Mar 05 2024");

        let at = NaiveDateTime::parse_from_str("2024-03-05 23:59:10", "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc();
        assert_eq!(NoteDate::from_datetime(&at.with_timezone(&Utc)), date);
    }

    #[test]
    fn note_date_parses_both_forms() {
        let canonical: NoteDate = "Tue Mar 05 2024".parse().unwrap();
        let iso: NoteDate = "2024-03-05".parse().unwrap();
        assert_eq!(canonical, iso);
        assert!("yesterday".parse::<NoteDate>().is_err());
    }
}
