//! Control channel and broadcast message schema.
//!
//! Requests: `{"type": "SKIP_WAITING" | "GET_VERSION" | "CLEAR_CACHE"}`.
//! Replies: `{"version": ".."}` or `{"success": bool, "error"?: ".."}`.
//! Broadcast: `{"type": "SW_UPDATED", "version": ".."}`.

use serde::{Deserialize, Serialize};

/// A control request sent from the host to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
}

/// A reply sent back over the per-call port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version {
        version: String,
    },
    Outcome {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ControlReply {
    pub fn version(version: impl Into<String>) -> Self {
        ControlReply::Version { version: version.into() }
    }

    pub fn success() -> Self {
        ControlReply::Outcome { success: true, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ControlReply::Outcome { success: false, error: Some(error.into()) }
    }
}

/// A message posted by the worker to every client page it controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SwUpdated { version: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_wire_format() {
        assert_eq!(serde_json::to_string(&ControlMessage::SkipWaiting).unwrap(), r#"{"type":"SKIP_WAITING"}"#);
        assert_eq!(serde_json::to_string(&ControlMessage::GetVersion).unwrap(), r#"{"type":"GET_VERSION"}"#);
        let parsed: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
        assert_eq!(parsed, ControlMessage::ClearCache);
    }

    #[test]
    fn test_reply_wire_format() {
        assert_eq!(
            serde_json::to_string(&ControlReply::version("app-v2025-01-15")).unwrap(),
            r#"{"version":"app-v2025-01-15"}"#
        );
        assert_eq!(serde_json::to_string(&ControlReply::success()).unwrap(), r#"{"success":true}"#);
        assert_eq!(
            serde_json::to_string(&ControlReply::failure("locked")).unwrap(),
            r#"{"success":false,"error":"locked"}"#
        );
    }

    #[test]
    fn test_broadcast_wire_format() {
        let msg = ClientMessage::SwUpdated { version: "app-v2025-01-15".into() };
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"type":"SW_UPDATED","version":"app-v2025-01-15"}"#);
    }
}
