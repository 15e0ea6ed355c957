//! Name search against the citizen registry.

use chrono::{Local, NaiveDate};
use dispatch_protocol::{FieldErrors, NameSearchRequest, NameSearchResult};
use tracing::debug;

use crate::api::ApiClient;
use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum NameSearchOutcome {
    Found(Box<NameSearchResult>),
    NotFound,
    /// The query failed validation and was not sent.
    Invalid(FieldErrors),
}

/// Validates `request` and, when valid, runs the search.
///
/// Validation problems come back as [`NameSearchOutcome::Invalid`]; only
/// transport and server failures are errors.
pub fn submit_name_search<T: Transport>(
    client: &ApiClient<T>,
    request: &NameSearchRequest,
) -> Result<NameSearchOutcome> {
    if let Err(errors) = request.validate() {
        return Ok(NameSearchOutcome::Invalid(errors));
    }
    let request = NameSearchRequest::new(request.name.trim());

    let outcome = match client.search_name(&request)? {
        Some(result) => NameSearchOutcome::Found(Box::new(result)),
        None => NameSearchOutcome::NotFound,
    };
    debug!(found = matches!(outcome, NameSearchOutcome::Found(_)), "Name search finished");
    Ok(outcome)
}

/// Age of the citizen today, in the local calendar.
pub fn age_today(result: &NameSearchResult) -> Option<u32> {
    age_on(result, Local::now().date_naive())
}

pub fn age_on(result: &NameSearchResult, today: NaiveDate) -> Option<u32> {
    result.citizen.age_on(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ApiRequest, ApiResponse};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Canned {
        body: Value,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl Transport for Canned {
        fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(ApiResponse::ok(self.body.clone()))
        }
    }

    fn client(body: Value) -> ApiClient<Canned> {
        ApiClient::new(Canned {
            body,
            sent: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn blank_name_is_invalid_and_not_sent() {
        let client = client(json!({}));
        let outcome = submit_name_search(&client, &NameSearchRequest::new("   ")).unwrap();
        match outcome {
            NameSearchOutcome::Invalid(errors) => assert!(errors.get("name").is_some()),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(client.transport().sent.lock().unwrap().is_empty());
    }

    #[test]
    fn found_result_is_decoded() {
        let client = client(json!({
            "id": "cit-1",
            "name": "Jane",
            "surname": "Doe",
            "dateOfBirth": "1990-06-15T00:00:00.000Z",
            "vehicles": [{ "id": "v1", "plate": "abc123" }],
            "Record": [{ "id": "r1", "type": "TICKET" }]
        }));
        let outcome = submit_name_search(&client, &NameSearchRequest::new(" Jane Doe ")).unwrap();

        let NameSearchOutcome::Found(result) = outcome else {
            panic!("expected a match");
        };
        assert_eq!(result.citizen.full_name(), "Jane Doe");
        assert_eq!(
            age_on(&result, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()),
            Some(33)
        );
        assert_eq!(result.tickets().count(), 1);
        assert_eq!(result.registered_plates(), vec!["ABC123".to_string()]);

        let sent = client.transport().sent.lock().unwrap();
        assert_eq!(sent[0].body, Some(json!({ "name": "Jane Doe" })));
    }

    #[test]
    fn empty_answer_is_not_found() {
        let client = client(Value::Null);
        let outcome = submit_name_search(&client, &NameSearchRequest::new("Nobody")).unwrap();
        assert_eq!(outcome, NameSearchOutcome::NotFound);
    }
}
