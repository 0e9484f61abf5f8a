//! High-level command façade
//!
//! [`DevToolsClient`] wraps a [`Session`] and exposes the operations the
//! automation workflows consume: navigation, script evaluation, screenshots,
//! cookies, synthetic input, and readiness polling. Everything is built on
//! `Session::send`; failure of any command propagates to the caller, who owns
//! retry policy. Polling helpers treat per-attempt errors as "not ready yet"
//! and report timeout as absence, never as an error.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use super::resolver;
use super::session::{ConnectParams, Session, Subscription, TargetBinding};
use super::types::{Clip, Cookie, EvaluateParams, MouseEventParams, ScreenshotParams};
use crate::{Error, Result};

/// High-level client over one CDP session
pub struct DevToolsClient {
    session: Session,
}

impl DevToolsClient {
    /// Resolve a target for `initial_url` against the discovery endpoints at
    /// `base_url`, connect a session to it, and return the client.
    pub async fn connect(base_url: &str, initial_url: &str) -> Result<Self> {
        let http = reqwest::Client::new();
        let resolved = resolver::resolve(&http, base_url, initial_url).await?;
        info!(
            "Connecting to target {} (reused: {})",
            resolved.target_id, resolved.reused
        );

        let session = Session::connect(ConnectParams {
            ws_url: resolved.ws_url,
            binding: TargetBinding {
                base_url: base_url.to_string(),
                target_id: resolved.target_id,
                created_here: !resolved.reused,
            },
        })
        .await?;

        Ok(Self { session })
    }

    /// Wrap an already-connected session
    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    /// The underlying session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Raw command passthrough
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.session.send(method, params).await
    }

    /// Register an event handler; see [`Session::on`]
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.session.on(event, handler)
    }

    /// Close the session. Idempotent.
    pub async fn close(&self) {
        self.session.close().await;
    }

    /// Issue a navigation; does not wait for load completion
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.send("Page.navigate", Some(serde_json::json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// Evaluate a JavaScript expression in the page context, awaiting any
    /// returned promise. Returns the by-value result when present, else the
    /// raw remote object description.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let params = EvaluateParams {
            expression: expression.to_string(),
            await_promise: Some(true),
            return_by_value: Some(true),
        };
        let result = self
            .send("Runtime.evaluate", Some(serde_json::to_value(params)?))
            .await?;

        let remote = result.get("result").cloned().unwrap_or(Value::Null);
        match remote.get("value") {
            Some(value) => Ok(value.clone()),
            None => Ok(remote),
        }
    }

    /// Register a script to run before page scripts on every subsequent
    /// navigation; returns its identifier.
    pub async fn add_script_on_new_document(&self, source: &str) -> Result<String> {
        let result = self
            .send(
                "Page.addScriptToEvaluateOnNewDocument",
                Some(serde_json::json!({ "source": source })),
            )
            .await?;
        Ok(result
            .get("identifier")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// All cookies visible to the current context
    pub async fn get_cookies(&self) -> Result<Vec<Cookie>> {
        let result = self.send("Network.getAllCookies", None).await?;
        let cookies = result.get("cookies").cloned().unwrap_or(Value::Array(vec![]));
        Ok(serde_json::from_value(cookies)?)
    }

    /// Bulk cookie set
    pub async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.send(
            "Network.setCookies",
            Some(serde_json::json!({ "cookies": cookies })),
        )
        .await?;
        Ok(())
    }

    /// Capture a PNG screenshot.
    ///
    /// An explicit `clip` wins; otherwise `full_page` synthesizes a clip from
    /// layout metrics, falling back to an unclipped capture when the metrics
    /// query fails. Returns decoded image bytes, or `None` when the protocol
    /// returns no data.
    pub async fn capture_screenshot(
        &self,
        full_page: bool,
        clip: Option<Clip>,
    ) -> Result<Option<Vec<u8>>> {
        let clip = match clip {
            Some(clip) => Some(clip),
            None if full_page => self.full_content_clip().await,
            None => None,
        };

        let params = ScreenshotParams {
            format: Some("png".to_string()),
            clip,
        };
        let result = self
            .send("Page.captureScreenshot", Some(serde_json::to_value(params)?))
            .await?;

        match result.get("data").and_then(|v| v.as_str()) {
            Some(data) => {
                let bytes = BASE64
                    .decode(data)
                    .map_err(|e| Error::Decode(e.to_string()))?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    async fn full_content_clip(&self) -> Option<Clip> {
        match self.send("Page.getLayoutMetrics", None).await {
            Ok(metrics) => {
                let content = metrics.get("contentSize").cloned().unwrap_or(Value::Null);
                Some(Clip {
                    x: 0.0,
                    y: 0.0,
                    width: content
                        .get("width")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(800.0),
                    height: content
                        .get("height")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(600.0),
                    scale: Some(1.0),
                })
            }
            Err(e) => {
                debug!("Layout metrics unavailable, capturing unclipped: {}", e);
                None
            }
        }
    }

    /// Dispatch a single synthetic mouse event
    pub async fn dispatch_mouse_event(
        &self,
        event_type: &str,
        x: f64,
        y: f64,
        button: Option<&str>,
        buttons: Option<i32>,
    ) -> Result<()> {
        let params = MouseEventParams {
            event_type: event_type.to_string(),
            x,
            y,
            modifiers: 0,
            click_count: 1,
            button: button.map(String::from),
            buttons,
        };
        self.send(
            "Input.dispatchMouseEvent",
            Some(serde_json::to_value(params)?),
        )
        .await?;
        Ok(())
    }

    /// Simulate a human-like drag gesture from `start` to `end`.
    ///
    /// Press at start, at least `steps - 1` interpolated moves eased with
    /// smoothstep plus small per-axis jitter, release at end. Perfectly
    /// linear or instantaneous synthetic motion is a detectable signal for
    /// interactive verification challenges.
    pub async fn drag_mouse(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        duration: Duration,
        steps: u32,
    ) -> Result<()> {
        let steps = steps.max(2);
        let (start_x, start_y) = start;
        let (end_x, end_y) = end;

        self.dispatch_mouse_event("mouseMoved", start_x, start_y, Some("none"), Some(0))
            .await?;
        self.dispatch_mouse_event("mousePressed", start_x, start_y, Some("left"), Some(1))
            .await?;

        let pace = duration
            .div_f64(f64::from(steps))
            .max(Duration::from_millis(20));

        for step in 1..steps {
            let t = f64::from(step) / f64::from(steps);
            let smooth = smoothstep(t);
            let x = start_x + (end_x - start_x) * smooth + jitter(0.6);
            let y = start_y + (end_y - start_y) * smooth + jitter(0.4);
            self.dispatch_mouse_event("mouseMoved", x, y, Some("none"), Some(1))
                .await?;
            tokio::time::sleep(pace).await;
        }

        self.dispatch_mouse_event("mouseMoved", end_x, end_y, Some("none"), Some(1))
            .await?;
        self.dispatch_mouse_event("mouseReleased", end_x, end_y, Some("left"), Some(0))
            .await?;
        Ok(())
    }

    /// Poll `document.readyState` until complete or timeout; returns whether
    /// the page became ready. Never errors on timeout.
    pub async fn wait_for_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let ready = matches!(
                self.evaluate("document.readyState").await,
                Ok(Value::String(state)) if state == "complete"
            );
            if ready {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Poll `expression` until it yields a truthy value or the deadline
    /// elapses. Per-attempt evaluation errors count as "not yet ready"; the
    /// deadline is checked after each attempt completes.
    pub async fn wait_for_expression(
        &self,
        expression: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(value) = self.evaluate(expression).await {
                if is_truthy(&value) {
                    return Some(value);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Cubic smoothstep easing: accelerates from the start point and decelerates
/// into the end point.
pub(crate) fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn jitter(bound: f64) -> f64 {
    rand::thread_rng().gen_range(-bound..bound)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
