//! Error types for dispatch-core operations.

use std::path::PathBuf;

use dispatch_protocol::{ErrorInfo, ShouldDo};

/// All errors that can occur in dispatch-core operations.
///
/// "No active unit" is not here: it is an expected answer, modelled as
/// `ActiveUnitReply::NoActiveUnit`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration value for {field}: {details}")]
    InvalidConfig { field: &'static str, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Request to {path} failed: {details}")]
    Transport { path: String, details: String },

    #[error("{path} returned HTTP {status}{}", .code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default())]
    Http {
        path: String,
        status: u16,
        code: Option<String>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(ErrorInfo),

    #[error("No status value with shouldDo {} is configured", .0.as_str())]
    MissingStatusCode(ShouldDo),

    // ─────────────────────────────────────────────────────────────────────
    // Push Channel Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Push channel error: {0}")]
    Push(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// Server-provided error code, when the failure carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            DispatchError::Http { code, .. } => code.as_deref(),
            DispatchError::InvalidRequest(info) => Some(info.code.as_str()),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using DispatchError.
pub type Result<T> = std::result::Result<T, DispatchError>;

impl From<DispatchError> for String {
    fn from(err: DispatchError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_includes_code_when_present() {
        let err = DispatchError::Http {
            path: "/leo/u1/status".to_string(),
            status: 400,
            code: Some("invalidStatus".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "/leo/u1/status returned HTTP 400 (invalidStatus)"
        );
        assert_eq!(err.code(), Some("invalidStatus"));

        let bare = DispatchError::Http {
            path: "/911-calls".to_string(),
            status: 502,
            code: None,
        };
        assert_eq!(bare.to_string(), "/911-calls returned HTTP 502");
    }

    #[test]
    fn missing_status_code_names_classification() {
        let err = DispatchError::MissingStatusCode(ShouldDo::SetOnDuty);
        assert_eq!(
            err.to_string(),
            "No status value with shouldDo SET_ON_DUTY is configured"
        );
    }
}
