//! Wire types and validation for the CAD backend API.
//!
//! This crate is shared by the client library and its front ends so the
//! request/response shapes live in one place. The backend remains the
//! authority on validation; the client only checks what it needs to avoid
//! sending requests that cannot succeed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod citizen;
mod push;
mod unit;
mod values;

pub use citizen::{
    Citizen, FieldErrors, NameSearchRequest, NameSearchResult, Record, RecordType,
    RegisteredVehicle, Weapon, MAX_NAME_LENGTH,
};
pub use push::{parse_push_frame, PushFrame, SocketEvent};
pub use unit::{overlay_unit, ActiveUnit, Call911, Unit, UnitKind, UpdateStatusBody};
pub use values::{ShouldDo, StatusValue, ValueGroup, ValueLabel, ValuesPayload, CODES_10_TYPE};

/// Upper bound for a single push frame or response body read off a socket.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_ID_LENGTH: usize = 128;

pub const SEARCH_NAME_PATH: &str = "/search/name";
pub const CODES_10_PATH: &str = "/admin/values/codes_10";
pub const CALLS_PATH: &str = "/911-calls";
pub const CITIZENS_PATH: &str = "/citizen";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Returns the `error` code of a backend error body (`{ "error": "..." }`).
pub fn error_code(body: &Value) -> Option<&str> {
    body.get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

/// Returns the record id when the body is an object with a non-empty `id`.
///
/// The backend signals "nothing here" with an empty or id-less body, so only a
/// present, non-empty id counts as a record.
pub fn record_id(body: &Value) -> Option<&str> {
    match body.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.as_str()),
        _ => None,
    }
}

/// Validates an id before it is interpolated into a request path.
pub fn validate_path_id(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if value.len() > MAX_ID_LENGTH {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be {} characters or fewer", field, MAX_ID_LENGTH),
        ));
    }
    if value
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
    {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} contains characters not allowed in a path", field),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_code_reads_trimmed_code() {
        assert_eq!(
            error_code(&json!({ "error": "noActiveOfficer" })),
            Some("noActiveOfficer")
        );
        assert_eq!(error_code(&json!({ "error": "  " })), None);
        assert_eq!(error_code(&json!({ "id": "u1" })), None);
        assert_eq!(error_code(&Value::Null), None);
    }

    #[test]
    fn record_id_requires_non_empty_string() {
        assert_eq!(record_id(&json!({ "id": "u1" })), Some("u1"));
        assert_eq!(record_id(&json!({ "id": "" })), None);
        assert_eq!(record_id(&json!({ "id": null })), None);
        assert_eq!(record_id(&json!({})), None);
        assert_eq!(record_id(&json!(false)), None);
    }

    #[test]
    fn rejects_path_ids_with_separators() {
        assert!(validate_path_id("ckx1", "unit id").is_ok());
        assert!(validate_path_id("", "unit id").is_err());
        assert!(validate_path_id("a/b", "unit id").is_err());
        assert!(validate_path_id("a b", "unit id").is_err());
        assert!(validate_path_id(&"a".repeat(256), "unit id").is_err());
    }
}
