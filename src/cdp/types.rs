//! CDP (Chrome DevTools Protocol) type definitions
//!
//! This module defines the core data structures for CDP communication.

use serde::{Deserialize, Serialize};

/// CDP JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Request ID
    pub id: u64,
    /// Method name (e.g., "Page.navigate")
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Inbound CDP frame: either a command outcome or an event notification.
///
/// Responses always carry an `id`; events always carry a `method`, so the
/// untagged representation decodes unambiguously.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    /// Command outcome (success or error) correlated by request id
    Response {
        /// Request id this outcome belongs to
        id: u64,
        /// Result payload on success
        #[serde(default)]
        result: Option<serde_json::Value>,
        /// Error payload on failure
        #[serde(default)]
        error: Option<serde_json::Value>,
    },
    /// Asynchronous event notification
    Event {
        /// Event method (e.g., "Network.responseReceived")
        method: String,
        /// Event parameters
        #[serde(default)]
        params: serde_json::Value,
    },
}

/// Entry returned by the `/json/list` discovery endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    /// Target id
    #[serde(default)]
    pub id: String,
    /// Target type ("page", "background_page", ...)
    #[serde(rename = "type", default)]
    pub target_type: String,
    /// Current URL of the target
    #[serde(default)]
    pub url: String,
    /// Target title
    #[serde(default)]
    pub title: String,
    /// WebSocket address of the target's debug channel
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

/// JavaScript evaluation parameters
#[derive(Debug, Clone, Serialize)]
pub struct EvaluateParams {
    /// JavaScript expression to evaluate
    pub expression: String,
    /// Whether to await a returned promise
    #[serde(skip_serializing_if = "Option::is_none", rename = "awaitPromise")]
    pub await_promise: Option<bool>,
    /// Whether to return the result by value
    #[serde(skip_serializing_if = "Option::is_none", rename = "returnByValue")]
    pub return_by_value: Option<bool>,
}

/// Screenshot parameters
#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotParams {
    /// Image format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Clip to a region of the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<Clip>,
}

/// Clip region for screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// X offset
    pub x: f64,
    /// Y offset
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Page scale factor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

/// Synthetic mouse event parameters
#[derive(Debug, Clone, Serialize)]
pub struct MouseEventParams {
    /// Event type ("mouseMoved", "mousePressed", "mouseReleased")
    #[serde(rename = "type")]
    pub event_type: String,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Modifier key bitmask
    pub modifiers: i32,
    /// Click count
    #[serde(rename = "clickCount")]
    pub click_count: i32,
    /// Button name ("left", "none", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    /// Pressed-button bitmask
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<i32>,
}

/// Cookie as reported by `Network.getAllCookies`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie applies to
    #[serde(default)]
    pub domain: String,
    /// Path the cookie applies to
    #[serde(default)]
    pub path: String,
    /// Expiry as a unix timestamp, -1 for session cookies
    #[serde(default)]
    pub expires: f64,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// HttpOnly flag
    #[serde(rename = "httpOnly", default)]
    pub http_only: bool,
    /// SameSite policy, when set
    #[serde(rename = "sameSite", skip_serializing_if = "Option::is_none", default)]
    pub same_site: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let request = CdpRequest {
            id: 1,
            method: "Page.navigate".to_string(),
            params: Some(serde_json::json!({ "url": "https://example.com" })),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"Page.navigate\""));
    }

    #[test]
    fn request_without_params_omits_field() {
        let request = CdpRequest {
            id: 2,
            method: "Page.enable".to_string(),
            params: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("\"params\""));
    }

    #[test]
    fn inbound_frame_decodes_success_response() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"id": 7, "result": {"ok": true}}"#).unwrap();
        match frame {
            InboundFrame::Response { id, result, error } => {
                assert_eq!(id, 7);
                assert_eq!(result.unwrap()["ok"], true);
                assert!(error.is_none());
            }
            InboundFrame::Event { .. } => panic!("decoded as event"),
        }
    }

    #[test]
    fn inbound_frame_decodes_error_response() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"id": 3, "error": {"code": -32000, "message": "nope"}}"#)
                .unwrap();
        match frame {
            InboundFrame::Response { id, error, .. } => {
                assert_eq!(id, 3);
                assert_eq!(error.unwrap()["code"], -32000);
            }
            InboundFrame::Event { .. } => panic!("decoded as event"),
        }
    }

    #[test]
    fn inbound_frame_decodes_event() {
        let frame: InboundFrame = serde_json::from_str(
            r#"{"method": "Network.responseReceived", "params": {"requestId": "1"}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Event { method, params } => {
                assert_eq!(method, "Network.responseReceived");
                assert_eq!(params["requestId"], "1");
            }
            InboundFrame::Response { .. } => panic!("decoded as response"),
        }
    }

    #[test]
    fn target_entry_tolerates_missing_ws_url() {
        let entry: TargetEntry = serde_json::from_str(
            r#"{"id": "abc", "type": "page", "url": "about:blank", "title": ""}"#,
        )
        .unwrap();
        assert_eq!(entry.target_type, "page");
        assert!(entry.web_socket_debugger_url.is_none());
    }

    #[test]
    fn clip_serialization() {
        let clip = Clip {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
            scale: Some(1.0),
        };

        let json = serde_json::to_string(&clip).unwrap();
        assert!(json.contains("\"x\":0"));
        assert!(json.contains("\"width\":800"));
        assert!(json.contains("\"scale\":1"));
    }

    #[test]
    fn mouse_event_params_rename_type_field() {
        let params = MouseEventParams {
            event_type: "mousePressed".to_string(),
            x: 10.0,
            y: 20.0,
            modifiers: 0,
            click_count: 1,
            button: Some("left".to_string()),
            buttons: Some(1),
        };

        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"type\":\"mousePressed\""));
        assert!(json.contains("\"clickCount\":1"));
    }
}
