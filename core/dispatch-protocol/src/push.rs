//! Push-channel frames and the shared event-name registry.
//!
//! Frames are newline-delimited JSON. Two shapes are accepted:
//!
//! ```text
//! {"event":"UpdateOfficerStatus","data":{...}}
//! ["UpdateOfficerStatus",{...}]
//! ```
//!
//! The client treats every frame as an invalidation signal; `data` is parsed
//! only so a malformed payload does not poison the stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{ErrorInfo, MAX_ID_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketEvent {
    UpdateOfficerStatus,
    UpdateEmsFdStatus,
    Create911Call,
    Update911Call,
    End911Call,
}

impl SocketEvent {
    pub const ALL: [SocketEvent; 5] = [
        SocketEvent::UpdateOfficerStatus,
        SocketEvent::UpdateEmsFdStatus,
        SocketEvent::Create911Call,
        SocketEvent::Update911Call,
        SocketEvent::End911Call,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SocketEvent::UpdateOfficerStatus => "UpdateOfficerStatus",
            SocketEvent::UpdateEmsFdStatus => "UpdateEmsFdStatus",
            SocketEvent::Create911Call => "Create911Call",
            SocketEvent::Update911Call => "Update911Call",
            SocketEvent::End911Call => "End911Call",
        }
    }
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocketEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SocketEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == value)
            .ok_or_else(|| format!("unknown socket event '{}'", value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl PushFrame {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: None,
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.event.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_event", "event name is required"));
        }
        if self.event.len() > MAX_ID_LENGTH {
            return Err(ErrorInfo::new(
                "invalid_event",
                format!("event name must be {} characters or fewer", MAX_ID_LENGTH),
            ));
        }
        Ok(())
    }

    pub fn is(&self, event: SocketEvent) -> bool {
        self.event == event.as_str()
    }
}

pub fn parse_push_frame(bytes: &[u8]) -> Result<PushFrame, ErrorInfo> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("push frame was not valid JSON: {}", err))
    })?;

    let frame = match value {
        Value::Object(_) => serde_json::from_value::<PushFrame>(value).map_err(|err| {
            ErrorInfo::new("invalid_frame", format!("push frame is malformed: {}", err))
        })?,
        Value::Array(mut items) if !items.is_empty() => {
            let data = if items.len() > 1 {
                Some(items.swap_remove(1))
            } else {
                None
            };
            match items.swap_remove(0) {
                Value::String(event) => PushFrame { event, data },
                _ => {
                    return Err(ErrorInfo::new(
                        "invalid_frame",
                        "push frame array must start with the event name",
                    ))
                }
            }
        }
        _ => {
            return Err(ErrorInfo::new(
                "invalid_frame",
                "push frame must be an object or an array",
            ))
        }
    };

    frame.validate()?;
    Ok(frame)
}
