//! Typed access to the backend endpoints the client consumes.

use dispatch_protocol::{
    error_code, record_id, validate_path_id, Call911, Citizen, NameSearchRequest,
    NameSearchResult, StatusValue, Unit, UnitKind, UpdateStatusBody, ValuesPayload, CALLS_PATH,
    CITIZENS_PATH, CODES_10_PATH, SEARCH_NAME_PATH,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{DispatchError, Result};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Answer to "which unit is on duty for me?".
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveUnitReply {
    /// A unit record with a non-empty `id`, as sent by the server.
    Found(Map<String, Value>),
    /// The server's explicit "no active unit" signal.
    NoActiveUnit,
    /// A successful response without a usable record.
    Empty,
}

pub struct ApiClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn active_unit(&self, kind: UnitKind) -> Result<ActiveUnitReply> {
        let request = ApiRequest::get(kind.active_unit_path());
        let response = self.transport.execute(&request)?;

        if error_code(&response.body) == Some(kind.no_active_unit_code()) {
            return Ok(ActiveUnitReply::NoActiveUnit);
        }
        let response = ensure_success(&request, response)?;

        if record_id(&response.body).is_none() {
            return Ok(ActiveUnitReply::Empty);
        }
        match response.body {
            Value::Object(record) => Ok(ActiveUnitReply::Found(record)),
            _ => Ok(ActiveUnitReply::Empty),
        }
    }

    /// Sets a unit's status; returns the updated record when the server sent one.
    pub fn update_status(
        &self,
        kind: UnitKind,
        unit_id: &str,
        status_id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        validate_path_id(unit_id, "unit id").map_err(DispatchError::InvalidRequest)?;
        validate_path_id(status_id, "status id").map_err(DispatchError::InvalidRequest)?;

        let body = serde_json::to_value(UpdateStatusBody {
            status: status_id.to_string(),
        })
        .map_err(|source| DispatchError::Json {
            context: "encoding status update".to_string(),
            source,
        })?;
        let request = ApiRequest::put(kind.status_path(unit_id), body);
        let response = ensure_success(&request, self.transport.execute(&request)?)?;

        if record_id(&response.body).is_none() {
            return Ok(None);
        }
        match response.body {
            Value::Object(record) => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    pub fn roster(&self, kind: UnitKind) -> Result<Vec<Unit>> {
        self.get_json(kind.base_path())
    }

    pub fn status_codes(&self) -> Result<Vec<StatusValue>> {
        let payload: ValuesPayload = self.get_json(CODES_10_PATH)?;
        Ok(payload.into_codes_10())
    }

    pub fn active_calls(&self) -> Result<Vec<Call911>> {
        self.get_json(CALLS_PATH)
    }

    pub fn citizens(&self) -> Result<Vec<Citizen>> {
        self.get_json(CITIZENS_PATH)
    }

    /// Runs a name search; `None` when no citizen matched.
    ///
    /// Callers validate the request first (see `search::submit_name_search`).
    pub fn search_name(&self, query: &NameSearchRequest) -> Result<Option<NameSearchResult>> {
        let body = serde_json::to_value(query).map_err(|source| DispatchError::Json {
            context: "encoding name search".to_string(),
            source,
        })?;
        let request = ApiRequest::post(SEARCH_NAME_PATH, body);
        let response = ensure_success(&request, self.transport.execute(&request)?)?;

        if record_id(&response.body).is_none() {
            return Ok(None);
        }
        decode(&request, response.body).map(Some)
    }

    fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let request = ApiRequest::get(path);
        let response = ensure_success(&request, self.transport.execute(&request)?)?;
        decode(&request, response.body)
    }
}

fn ensure_success(request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        // Some endpoints answer 200 with an error body.
        if let Some(code) = error_code(&response.body) {
            return Err(DispatchError::Http {
                path: request.path.clone(),
                status: response.status,
                code: Some(code.to_string()),
            });
        }
        return Ok(response);
    }
    Err(DispatchError::Http {
        path: request.path.clone(),
        status: response.status,
        code: error_code(&response.body).map(str::to_string),
    })
}

fn decode<R: DeserializeOwned>(request: &ApiRequest, body: Value) -> Result<R> {
    serde_json::from_value(body).map_err(|source| DispatchError::Json {
        context: format!("{} {}", request.method, request.path),
        source,
    })
}
