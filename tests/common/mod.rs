//! In-process fake browser for integration tests
//!
//! Serves both halves of the remote debugging surface on one port: the HTTP
//! discovery endpoints and a CDP WebSocket channel with canned protocol
//! responses. Incoming connections are told apart by peeking for the
//! WebSocket upgrade handshake.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// 1x1 transparent PNG
pub const TINY_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Fake browser bound to an ephemeral local port
pub struct FakeBrowser {
    addr: std::net::SocketAddr,
    /// Pages reported by /json/list
    pages: Arc<Mutex<Vec<Value>>>,
    /// HTTP requests observed, as "METHOD /path"
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeBrowser {
    /// Start a fake browser with no pages; seed them with [`FakeBrowser::add_page`]
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let pages = Arc::new(Mutex::new(Vec::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let accept_pages = Arc::clone(&pages);
        let accept_requests = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            Arc::clone(&accept_pages),
                            Arc::clone(&accept_requests),
                        ));
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            addr,
            pages,
            requests,
            shutdown: Some(shutdown_tx),
        }
    }

    /// HTTP base URL of the discovery endpoints
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Add a /json/list entry pointing its debug channel back at this server
    pub fn add_page(&self, id: &str, url: &str) {
        let entry = json!({
            "id": id,
            "type": "page",
            "title": "",
            "url": url,
            "webSocketDebuggerUrl": format!("ws://{}/devtools/page/{}", self.addr, id)
        });
        self.pages.lock().unwrap().push(entry);
    }

    /// HTTP requests observed so far, as "METHOD /path"
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeBrowser {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: std::net::SocketAddr,
    pages: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let mut peek = [0u8; 1024];
    let n = stream.peek(&mut peek).await.unwrap_or(0);
    let head = String::from_utf8_lossy(&peek[..n]).to_string();

    if head.contains("Upgrade: websocket") || head.contains("Sec-WebSocket-Key") {
        serve_devtools_channel(stream).await;
    } else {
        serve_discovery(stream, addr, pages, requests).await;
    }
}

async fn serve_discovery(
    mut stream: TcpStream,
    addr: std::net::SocketAddr,
    pages: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap_or(0);
    let request = String::from_utf8_lossy(&buf[..n]).to_string();
    let mut parts = request.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    requests.lock().unwrap().push(format!("{} {}", method, path));

    let (status, body) = if path.starts_with("/json/version") {
        (
            200,
            json!({
                "Browser": "Chrome/120.0.6099.109",
                "Protocol-Version": "1.3",
                "webSocketDebuggerUrl": format!("ws://{}/devtools/browser", addr)
            })
            .to_string(),
        )
    } else if path.starts_with("/json/list") {
        (200, Value::Array(pages.lock().unwrap().clone()).to_string())
    } else if path.starts_with("/json/new") && method == "GET" {
        let url = path
            .splitn(2, '?')
            .nth(1)
            .map(|q| urlencoding::decode(q).unwrap_or_default().into_owned())
            .unwrap_or_else(|| "about:blank".to_string());
        let entry = json!({
            "id": "created-target",
            "type": "page",
            "title": "",
            "url": url,
            "webSocketDebuggerUrl": format!("ws://{}/devtools/page/created-target", addr)
        });
        pages.lock().unwrap().push(entry.clone());
        (200, entry.to_string())
    } else if path.starts_with("/json/close/") {
        let id = path.trim_start_matches("/json/close/");
        pages.lock().unwrap().retain(|p| p["id"] != id);
        (200, "Target is closing".to_string())
    } else {
        (404, "{}".to_string())
    };

    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
}

async fn serve_devtools_channel(stream: TcpStream) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut tx, mut rx) = ws.split();

    while let Some(message) = rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let reply = protocol_response(&request);
                if tx.send(Message::Text(reply.to_string())).await.is_err() {
                    break;
                }
                // A completed navigation pushes the load event.
                if request["method"] == "Page.navigate" {
                    let event = json!({
                        "method": "Page.loadEventFired",
                        "params": { "timestamp": 1000.0 }
                    });
                    if tx.send(Message::Text(event.to_string())).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}

fn protocol_response(request: &Value) -> Value {
    let id = request["id"].as_u64().unwrap_or(0);
    let method = request["method"].as_str().unwrap_or("");

    match method {
        "Page.enable" | "Runtime.enable" | "Network.enable" => json!({ "id": id, "result": {} }),
        "Page.navigate" => json!({
            "id": id,
            "result": { "frameId": "frame-1", "loaderId": "loader-1" }
        }),
        "Runtime.evaluate" => {
            let expression = request["params"]["expression"].as_str().unwrap_or("");
            let value = if expression == "document.readyState" {
                json!("complete")
            } else if expression == "document.title" {
                json!("Fake Page")
            } else {
                json!("evaluated")
            };
            json!({
                "id": id,
                "result": { "result": { "type": "string", "value": value } }
            })
        }
        "Page.getLayoutMetrics" => json!({
            "id": id,
            "result": { "contentSize": { "x": 0, "y": 0, "width": 1024.0, "height": 768.0 } }
        }),
        "Page.captureScreenshot" => json!({
            "id": id,
            "result": { "data": TINY_PNG_BASE64 }
        }),
        "Network.getAllCookies" => json!({
            "id": id,
            "result": { "cookies": [
                { "name": "sid", "value": "abc", "domain": ".example.com", "path": "/" }
            ] }
        }),
        "Network.setCookies" | "Input.dispatchMouseEvent" => json!({ "id": id, "result": {} }),
        "Page.addScriptToEvaluateOnNewDocument" => json!({
            "id": id,
            "result": { "identifier": "script-1" }
        }),
        _ => json!({
            "id": id,
            "error": { "code": -32601, "message": format!("'{}' wasn't found", method) }
        }),
    }
}
