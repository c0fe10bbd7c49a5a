use serde::{Deserialize, Serialize};
use serde_json::Value;

use murmur_shortcuts::KeyInput;

/// The closed set of methods the helper accepts. Anything else is a protocol
/// error on the helper side, so the enum is the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HelperMethod {
    GetAccessibilityContext,
    GetAccessibilityStatus,
    RequestAccessibilityPermission,
    PasteText,
    MuteSystemAudio,
    RestoreSystemAudio,
    SetShortcuts,
    GetAccessibilityTreeDetails,
}

impl HelperMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelperMethod::GetAccessibilityContext => "getAccessibilityContext",
            HelperMethod::GetAccessibilityStatus => "getAccessibilityStatus",
            HelperMethod::RequestAccessibilityPermission => "requestAccessibilityPermission",
            HelperMethod::PasteText => "pasteText",
            HelperMethod::MuteSystemAudio => "muteSystemAudio",
            HelperMethod::RestoreSystemAudio => "restoreSystemAudio",
            HelperMethod::SetShortcuts => "setShortcuts",
            HelperMethod::GetAccessibilityTreeDetails => "getAccessibilityTreeDetails",
        }
    }
}

impl std::fmt::Display for HelperMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: HelperMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// Exactly one of `result` / `error` is present in a well-formed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyPayload {
    pub key: Option<String>,
    #[serde(alias = "code")]
    pub key_code: Option<u32>,
    pub modifiers: Option<Value>,
}

/// Unsolicited notification from the helper's event tap. No correlation id;
/// dispatched to subscribers in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HelperEvent {
    KeyDown {
        payload: KeyPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
    KeyUp {
        payload: KeyPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
    FlagsChanged {
        payload: KeyPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
}

impl HelperEvent {
    /// Convert to a matcher input. `flagsChanged` carries aggregate modifier
    /// state rather than a single key transition, so it yields `None`; the
    /// helper also reports modifier presses as plain keyDown/keyUp.
    pub fn key_input(&self) -> Option<KeyInput> {
        let (payload, is_down) = match self {
            HelperEvent::KeyDown { payload, .. } => (payload, true),
            HelperEvent::KeyUp { payload, .. } => (payload, false),
            HelperEvent::FlagsChanged { .. } => return None,
        };
        if payload.key.is_none() && payload.key_code.is_none() {
            return None;
        }
        Some(KeyInput {
            keycode: payload.key_code,
            key: payload.key.clone(),
            is_down,
        })
    }
}

/// One line from the helper is either a response to a pending request or an
/// unsolicited event. Responses always carry an `id`; events carry `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Response(RpcResponse),
    Event(HelperEvent),
}
