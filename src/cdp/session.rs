//! Transport session over one CDP target channel
//!
//! A [`Session`] owns a single duplex channel to a browsing target and
//! multiplexes any number of concurrent command/response exchanges plus
//! asynchronous push events over it. Correctness rests on id correlation:
//! ids are allocated monotonically by the send path, responses may arrive in
//! any order, and the background receive loop is the only code that removes
//! pending slots or dispatches events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use super::traits::{connect_websocket, FrameSink, FrameStream};
use super::types::InboundFrame;
use crate::{Error, Result};

/// A pending command slot: fulfilled exactly once by the receive loop
struct PendingRequest {
    sender: oneshot::Sender<Result<Value>>,
    /// Method the command was issued with, for error reporting
    method: String,
}

type PendingTable = Arc<StdMutex<HashMap<u64, PendingRequest>>>;

/// An event handler invoked by the receive loop
pub type EventHandler = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

type HandlerRegistry = Arc<StdMutex<HashMap<String, Vec<(u64, EventHandler)>>>>;

/// Identity of the target a session is bound to
#[derive(Debug, Clone)]
pub struct TargetBinding {
    /// HTTP base URL of the discovery endpoints
    pub base_url: String,
    /// Target id
    pub target_id: String,
    /// Whether this session created the target (reused targets are never
    /// destroyed by the client)
    pub created_here: bool,
}

/// Inputs for [`Session::connect`]
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// WebSocket address of the target's debug channel
    pub ws_url: String,
    /// Target identity for close bookkeeping
    pub binding: TargetBinding,
}

/// One active duplex connection to a CDP target
pub struct Session {
    sink: Mutex<Box<dyn FrameSink>>,
    next_id: AtomicU64,
    pending: PendingTable,
    handlers: HandlerRegistry,
    next_token: AtomicU64,
    /// Set when the channel is down (receive loop exited)
    channel_down: Arc<AtomicBool>,
    /// Set by the first close() call
    close_called: AtomicBool,
    read_task: StdMutex<Option<JoinHandle<()>>>,
    binding: Option<TargetBinding>,
    http: reqwest::Client,
}

impl Session {
    /// Connect to a target, start the receive loop, and enable the protocol
    /// domains the façade depends on before returning.
    pub async fn connect(params: ConnectParams) -> Result<Self> {
        let (sink, stream) = connect_websocket(&params.ws_url).await?;
        let session = Self::from_channel(sink, stream, Some(params.binding));

        // Enabling happens over the just-opened channel, before any caller
        // can issue commands through this session.
        for method in ["Page.enable", "Runtime.enable", "Network.enable"] {
            session.send(method, None).await?;
        }

        Ok(session)
    }

    /// Build a session on an already-open channel and start its receive loop.
    ///
    /// No domains are enabled; this is the entry point for mock channels.
    pub fn from_channel(
        sink: Box<dyn FrameSink>,
        stream: Box<dyn FrameStream>,
        binding: Option<TargetBinding>,
    ) -> Self {
        let pending: PendingTable = Arc::new(StdMutex::new(HashMap::new()));
        let handlers: HandlerRegistry = Arc::new(StdMutex::new(HashMap::new()));
        let channel_down = Arc::new(AtomicBool::new(false));

        let read_task = tokio::spawn(receive_loop(
            stream,
            Arc::clone(&pending),
            Arc::clone(&handlers),
            Arc::clone(&channel_down),
        ));

        Self {
            sink: Mutex::new(sink),
            next_id: AtomicU64::new(1),
            pending,
            handlers,
            next_token: AtomicU64::new(1),
            channel_down,
            close_called: AtomicBool::new(false),
            read_task: StdMutex::new(Some(read_task)),
            binding,
            http: reqwest::Client::new(),
        }
    }

    /// Target id this session is attached to, when known
    pub fn target_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.target_id.as_str())
    }

    /// Whether the channel is still usable
    pub fn is_open(&self) -> bool {
        !self.channel_down.load(Ordering::SeqCst) && !self.close_called.load(Ordering::SeqCst)
    }

    /// Send a command and suspend until its correlated outcome arrives.
    ///
    /// Any number of sends may be outstanding concurrently; each caller
    /// receives exactly the outcome matching its own message id.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.insert(
                id,
                PendingRequest {
                    sender: tx,
                    method: method.to_string(),
                },
            );
        }

        // The loop may have exited and drained between the open check and
        // the insert above; a slot inserted after that drain would never be
        // fulfilled, so re-check and retract it ourselves.
        if self.channel_down.load(Ordering::SeqCst) {
            self.pending
                .lock()
                .expect("pending table poisoned")
                .remove(&id);
            return Err(Error::ConnectionClosed);
        }

        let frame = super::types::CdpRequest {
            id,
            method: method.to_string(),
            params,
        };
        let text = serde_json::to_string(&frame)?;

        {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send_text(text).await {
                // The slot will never be fulfilled by the loop; retract it.
                self.pending
                    .lock()
                    .expect("pending table poisoned")
                    .remove(&id);
                return Err(e);
            }
        }

        trace!("Sent CDP command: {} (id={})", method, id);

        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Register a handler for a named event.
    ///
    /// Handlers for the same event run in registration order. The returned
    /// [`Subscription`] removes the handler when dropped, so registrations
    /// stay scoped to the logical operation that needed them.
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let mut handlers = self.handlers.lock().expect("handler registry poisoned");
        handlers
            .entry(event.to_string())
            .or_default()
            .push((token, Arc::new(handler)));

        Subscription {
            event: event.to_string(),
            token,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Close the session. Idempotent.
    ///
    /// Drains every still-pending command as cancelled, then issues the
    /// best-effort HTTP close call if this session created its target.
    pub async fn close(&self) {
        if self.close_called.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.close().await {
                debug!("Channel close failed: {}", e);
            }
        }

        let task = self
            .read_task
            .lock()
            .expect("read task slot poisoned")
            .take();
        if let Some(task) = task {
            task.abort();
        }
        self.channel_down.store(true, Ordering::SeqCst);
        drain_pending(&self.pending);

        if let Some(binding) = &self.binding {
            if binding.created_here {
                let url = format!("{}/json/close/{}", binding.base_url, binding.target_id);
                match self
                    .http
                    .get(&url)
                    .timeout(std::time::Duration::from_secs(3))
                    .send()
                    .await
                {
                    Ok(_) => debug!("Closed created target {}", binding.target_id),
                    Err(e) => debug!("Target close call failed: {}", e),
                }
            }
        }
    }
}

/// Background loop: sole remover from the pending table, sole event
/// dispatcher. Runs until the channel terminates, then drains every pending
/// slot as cancelled so no caller stays suspended.
async fn receive_loop(
    mut stream: Box<dyn FrameStream>,
    pending: PendingTable,
    handlers: HandlerRegistry,
    channel_down: Arc<AtomicBool>,
) {
    while let Some(frame) = stream.next_text().await {
        let text = match frame {
            Ok(text) => text,
            Err(e) => {
                warn!("Channel read error: {}", e);
                break;
            }
        };

        let frame = match serde_json::from_str::<InboundFrame>(&text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to parse CDP frame: {} - {}", e, text);
                continue;
            }
        };

        match frame {
            InboundFrame::Response { id, result, error } => {
                let slot = pending.lock().expect("pending table poisoned").remove(&id);
                match slot {
                    Some(request) => {
                        let outcome = match error {
                            Some(payload) => Err(Error::protocol(&request.method, &payload)),
                            None => Ok(result.unwrap_or(Value::Null)),
                        };
                        // The caller may have given up; a dead receiver is fine.
                        let _ = request.sender.send(outcome);
                    }
                    None => trace!("Response for unknown id: {}", id),
                }
            }
            InboundFrame::Event { method, params } => {
                dispatch_event(&handlers, &method, &params);
            }
        }
    }

    channel_down.store(true, Ordering::SeqCst);
    drain_pending(&pending);
    debug!("CDP receive loop ended");
}

/// Invoke each registered handler in registration order; a handler failure is
/// logged and never aborts the loop or later handlers.
fn dispatch_event(handlers: &HandlerRegistry, method: &str, params: &Value) {
    let matched: Vec<EventHandler> = {
        let registry = handlers.lock().expect("handler registry poisoned");
        match registry.get(method) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return,
        }
    };

    for handler in matched {
        if let Err(e) = handler(params) {
            error!("Event handler failed for {}: {}", method, e);
        }
    }
}

fn drain_pending(pending: &PendingTable) {
    let drained: Vec<PendingRequest> = {
        let mut table = pending.lock().expect("pending table poisoned");
        table.drain().map(|(_, request)| request).collect()
    };
    for request in drained {
        let _ = request.sender.send(Err(Error::ConnectionClosed));
    }
}

/// Scoped event registration returned by [`Session::on`]
pub struct Subscription {
    event: String,
    token: u64,
    handlers: std::sync::Weak<StdMutex<HashMap<String, Vec<(u64, EventHandler)>>>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            let mut registry = match handlers.lock() {
                Ok(registry) => registry,
                Err(_) => return,
            };
            if let Some(list) = registry.get_mut(&self.event) {
                list.retain(|(token, _)| *token != self.token);
                if list.is_empty() {
                    registry.remove(&self.event);
                }
            }
        }
    }
}
