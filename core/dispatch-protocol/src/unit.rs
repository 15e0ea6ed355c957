//! Unit (officer/deputy) records and the per-division endpoint layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::push::SocketEvent;
use crate::values::StatusValue;

/// Which division's dashboard the client is acting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    #[default]
    Leo,
    EmsFd,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Leo => "leo",
            UnitKind::EmsFd => "ems-fd",
        }
    }

    /// Human name of a unit of this kind.
    pub fn unit_label(self) -> &'static str {
        match self {
            UnitKind::Leo => "officer",
            UnitKind::EmsFd => "deputy",
        }
    }

    /// Roster endpoint; also the prefix of every per-unit endpoint.
    pub fn base_path(self) -> &'static str {
        match self {
            UnitKind::Leo => "/leo",
            UnitKind::EmsFd => "/ems-fd",
        }
    }

    pub fn active_unit_path(self) -> &'static str {
        match self {
            UnitKind::Leo => "/leo/active-officer",
            UnitKind::EmsFd => "/ems-fd/active-deputy",
        }
    }

    pub fn status_path(self, unit_id: &str) -> String {
        format!("{}/{}/status", self.base_path(), unit_id)
    }

    /// Error code the backend returns when the user has no unit on duty.
    pub fn no_active_unit_code(self) -> &'static str {
        match self {
            UnitKind::Leo => "noActiveOfficer",
            UnitKind::EmsFd => "noActiveDeputy",
        }
    }

    pub fn status_event(self) -> SocketEvent {
        match self {
            UnitKind::Leo => SocketEvent::UpdateOfficerStatus,
            UnitKind::EmsFd => SocketEvent::UpdateEmsFdStatus,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leo" | "police" => Ok(UnitKind::Leo),
            "ems-fd" | "ems_fd" | "emsfd" | "ems" | "fd" => Ok(UnitKind::EmsFd),
            other => Err(format!(
                "unknown unit kind '{}' (expected 'leo' or 'ems-fd')",
                other
            )),
        }
    }
}

/// An officer or deputy record.
///
/// Fields the client does not interpret are kept in `extra` so that a record
/// survives an overlay merge without losing server data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The unit currently on duty for the logged-in user.
pub type ActiveUnit = Unit;

impl Unit {
    pub fn from_record(record: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }

    /// Shallow overlay: fields present in `record` win, absent fields keep
    /// their current value. A field sent as `null` clears it.
    pub fn overlay(&self, record: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut merged = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        for (key, value) in record {
            merged.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(merged))
    }

    pub fn display_name(&self) -> String {
        match (self.callsign.as_deref(), self.name.as_deref()) {
            (Some(callsign), Some(name)) => format!("{} {}", callsign, name),
            (Some(callsign), None) => callsign.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => self.id.clone(),
        }
    }
}

/// Overlays `record` onto `base`, or builds a fresh unit when there is none.
pub fn overlay_unit(
    base: Option<&Unit>,
    record: &Map<String, Value>,
) -> Result<Unit, serde_json::Error> {
    match base {
        Some(unit) => unit.overlay(record),
        None => Unit::from_record(record.clone()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateStatusBody {
    pub status: String,
}

/// An active 911 call as listed on the dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Call911 {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub ended: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
