//! Reference values ("10-codes") served by the admin values endpoint.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const CODES_10_TYPE: &str = "CODES_10";

/// What selecting a status code does to the unit's duty state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ShouldDo {
    SetOffDuty,
    SetOnDuty,
    SetAssigned,
    #[default]
    SetStatus,
    PanicButton,
    Other(String),
}

impl ShouldDo {
    pub fn as_str(&self) -> &str {
        match self {
            ShouldDo::SetOffDuty => "SET_OFF_DUTY",
            ShouldDo::SetOnDuty => "SET_ON_DUTY",
            ShouldDo::SetAssigned => "SET_ASSIGNED",
            ShouldDo::SetStatus => "SET_STATUS",
            ShouldDo::PanicButton => "PANIC_BUTTON",
            ShouldDo::Other(value) => value.as_str(),
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "SET_OFF_DUTY" => ShouldDo::SetOffDuty,
            "SET_ON_DUTY" => ShouldDo::SetOnDuty,
            "SET_ASSIGNED" => ShouldDo::SetAssigned,
            "SET_STATUS" => ShouldDo::SetStatus,
            "PANIC_BUTTON" => ShouldDo::PanicButton,
            other => ShouldDo::Other(other.to_string()),
        }
    }
}

impl Serialize for ShouldDo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShouldDo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = Option::<String>::deserialize(deserializer)?;
        Ok(code.map(|code| ShouldDo::from_code(&code)).unwrap_or_default())
    }
}

/// A display value (`{ "value": "10-8" }`) as the backend nests it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValueLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub value: String,
}

impl ValueLabel {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: None,
            value: value.into(),
        }
    }
}

/// A status code a unit can be set to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusValue {
    pub id: String,
    #[serde(default)]
    pub should_do: ShouldDo,
    #[serde(
        default,
        deserialize_with = "deserialize_position",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<i64>,
    #[serde(default)]
    pub value: ValueLabel,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusValue {
    pub fn new(id: &str, label: &str, should_do: ShouldDo, position: Option<i64>) -> Self {
        Self {
            id: id.to_string(),
            should_do,
            position,
            value: ValueLabel::new(label),
            extra: Map::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.value.value
    }
}

/// Positions arrive as numbers, numeric strings, or null.
fn deserialize_position<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.trunc() as i64)),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueGroup {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub values: Vec<StatusValue>,
}

/// Body of the values endpoint: grouped by type, or a bare list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValuesPayload {
    Groups(Vec<ValueGroup>),
    Flat(Vec<StatusValue>),
}

impl ValuesPayload {
    /// Extracts the 10-codes, ignoring groups of other value types.
    pub fn into_codes_10(self) -> Vec<StatusValue> {
        match self {
            ValuesPayload::Groups(groups) => groups
                .into_iter()
                .filter(|group| group.kind == CODES_10_TYPE)
                .flat_map(|group| group.values)
                .collect(),
            ValuesPayload::Flat(values) => values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_status_value_with_string_position() {
        let value: StatusValue = serde_json::from_value(json!({
            "id": "s-1",
            "shouldDo": "SET_OFF_DUTY",
            "position": "3",
            "value": { "id": "v-1", "value": "10-7" },
            "color": "#ff0000"
        }))
        .expect("parse status value");

        assert_eq!(value.should_do, ShouldDo::SetOffDuty);
        assert_eq!(value.position, Some(3));
        assert_eq!(value.label(), "10-7");
        assert_eq!(value.extra.get("color"), Some(&json!("#ff0000")));
    }

    #[test]
    fn tolerates_null_position_and_unknown_should_do() {
        let value: StatusValue = serde_json::from_value(json!({
            "id": "s-2",
            "shouldDo": "SET_SOMETHING_NEW",
            "position": null,
            "value": { "value": "10-97" }
        }))
        .expect("parse status value");

        assert_eq!(value.position, None);
        assert_eq!(
            value.should_do,
            ShouldDo::Other("SET_SOMETHING_NEW".to_string())
        );
        let encoded = serde_json::to_value(&value).expect("encode");
        assert_eq!(encoded["shouldDo"], json!("SET_SOMETHING_NEW"));
    }

    #[test]
    fn missing_should_do_defaults_to_plain_status() {
        let value: StatusValue =
            serde_json::from_value(json!({ "id": "s-3", "value": { "value": "10-6" } }))
                .expect("parse status value");
        assert_eq!(value.should_do, ShouldDo::SetStatus);
    }

    #[test]
    fn grouped_payload_keeps_only_codes_10() {
        let payload: ValuesPayload = serde_json::from_value(json!([
            { "type": "CODES_10", "values": [ { "id": "s-1", "value": { "value": "10-8" } } ] },
            { "type": "PENAL_CODE", "values": [] }
        ]))
        .expect("parse grouped payload");

        let codes = payload.into_codes_10();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].id, "s-1");
    }

    #[test]
    fn flat_payload_is_accepted() {
        let payload: ValuesPayload = serde_json::from_value(json!([
            { "id": "s-1", "shouldDo": "SET_ON_DUTY", "value": { "value": "10-8" } }
        ]))
        .expect("parse flat payload");

        assert!(matches!(payload, ValuesPayload::Flat(_)));
        assert_eq!(payload.into_codes_10()[0].should_do, ShouldDo::SetOnDuty);
    }
}
