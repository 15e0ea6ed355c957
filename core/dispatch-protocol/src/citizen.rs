//! Citizen records and the name-search request/response.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::values::ValueLabel;
use crate::ErrorInfo;

pub const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Citizen {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<ValueLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethnicity: Option<ValueLabel>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub hair_color: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub eye_color: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drivers_license: Option<ValueLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_license: Option<ValueLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pilot_license: Option<ValueLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccw: Option<ValueLabel>,
}

impl Citizen {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }

    pub fn birth_date(&self) -> Option<NaiveDate> {
        let raw = self.date_of_birth.as_deref()?.trim();
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
            return Some(timestamp.date_naive());
        }
        raw.get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
    }

    /// Age in whole years on `today`; `None` for unknown or future birth dates.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let born = self.birth_date()?;
        if born > today {
            return None;
        }
        let mut years = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }
}

/// Backend text fields are sometimes sent as numbers (weight, height).
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredVehicle {
    pub id: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub model: ValueLabel,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub color: Option<String>,
    #[serde(default)]
    pub registration_status: ValueLabel,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub vin_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub id: String,
    #[serde(default)]
    pub model: ValueLabel,
    #[serde(default)]
    pub registration_status: ValueLabel,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Ticket,
    ArrestReport,
    WrittenWarning,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecordType,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub postal: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A citizen enriched with everything registered to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameSearchResult {
    #[serde(flatten)]
    pub citizen: Citizen,
    #[serde(default)]
    pub vehicles: Vec<RegisteredVehicle>,
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    #[serde(default, rename = "Record")]
    pub records: Vec<Record>,
}

impl NameSearchResult {
    pub fn tickets(&self) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(|record| record.kind == RecordType::Ticket)
    }

    pub fn registered_plates(&self) -> Vec<String> {
        self.vehicles
            .iter()
            .map(|vehicle| vehicle.plate.to_uppercase())
            .collect()
    }
}

/// Field name → error, shown next to the offending input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, ErrorInfo>);

impl FieldErrors {
    pub fn insert(&mut self, field: &str, error: ErrorInfo) {
        self.0.insert(field.to_string(), error);
    }

    pub fn get(&self, field: &str) -> Option<&ErrorInfo> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ErrorInfo)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameSearchRequest {
    pub name: String,
}

impl NameSearchRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = self.name.trim();
        if name.is_empty() {
            errors.insert("name", ErrorInfo::new("missing_field", "name is required"));
        } else if name.chars().count() > MAX_NAME_LENGTH {
            errors.insert(
                "name",
                ErrorInfo::new(
                    "too_long",
                    format!("name must be {} characters or fewer", MAX_NAME_LENGTH),
                ),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
