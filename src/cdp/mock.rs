//! Mock CDP channel for testing
//!
//! An in-memory duplex channel implementing the [`FrameSink`]/[`FrameStream`]
//! seam, with a scripted responder so sessions can be exercised without a
//! browser.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::traits::{FrameSink, FrameStream};
use crate::{Error, Result};

/// Scripted reply function: outbound frame in, optional inbound frame out
pub type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

type SharedSender = Arc<StdMutex<Option<mpsc::UnboundedSender<Result<String>>>>>;

/// Control handle for a mock duplex channel
pub struct MockChannel {
    sent: Arc<StdMutex<Vec<String>>>,
    inbound: SharedSender,
}

impl MockChannel {
    /// Create a silent channel: outbound frames are recorded, nothing replies
    pub fn new() -> (Self, Box<dyn FrameSink>, Box<dyn FrameStream>) {
        Self::build(None)
    }

    /// Create a channel whose responder script answers each outbound frame
    pub fn scripted<F>(responder: F) -> (Self, Box<dyn FrameSink>, Box<dyn FrameStream>)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(responder)))
    }

    /// Create a channel that acknowledges every command with an empty result
    pub fn acknowledging() -> (Self, Box<dyn FrameSink>, Box<dyn FrameStream>) {
        Self::scripted(|frame| {
            let id = frame.get("id")?.as_u64()?;
            Some(serde_json::json!({ "id": id, "result": {} }))
        })
    }

    fn build(responder: Option<Responder>) -> (Self, Box<dyn FrameSink>, Box<dyn FrameStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let inbound: SharedSender = Arc::new(StdMutex::new(Some(tx)));

        let sink = MockSink {
            sent: Arc::clone(&sent),
            inbound: Arc::clone(&inbound),
            responder,
        };
        let stream = MockStream { rx };
        let channel = Self { sent, inbound };

        (channel, Box::new(sink), Box::new(stream))
    }

    /// Inject an inbound frame, as the remote side would
    pub fn push_frame(&self, frame: Value) {
        if let Some(tx) = self.inbound.lock().expect("inbound lock poisoned").as_ref() {
            let _ = tx.send(Ok(frame.to_string()));
        }
    }

    /// Inject a raw inbound text frame
    pub fn push_text(&self, text: &str) {
        if let Some(tx) = self.inbound.lock().expect("inbound lock poisoned").as_ref() {
            let _ = tx.send(Ok(text.to_string()));
        }
    }

    /// Fault the channel: the reader observes an error and stops
    pub fn fault(&self, message: &str) {
        let mut guard = self.inbound.lock().expect("inbound lock poisoned");
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(Err(Error::websocket(message)));
        }
        guard.take();
    }

    /// Terminate the channel cleanly: the reader observes end-of-stream
    pub fn sever(&self) {
        self.inbound.lock().expect("inbound lock poisoned").take();
    }

    /// Outbound frames recorded so far, parsed as JSON
    pub fn sent_frames(&self) -> Vec<Value> {
        self.sent
            .lock()
            .expect("sent lock poisoned")
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }
}

struct MockSink {
    sent: Arc<StdMutex<Vec<String>>>,
    inbound: SharedSender,
    responder: Option<Responder>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sent
            .lock()
            .expect("sent lock poisoned")
            .push(text.clone());

        if let Some(responder) = &self.responder {
            let frame: Value = serde_json::from_str(&text)?;
            if let Some(reply) = responder(&frame) {
                if let Some(tx) = self.inbound.lock().expect("inbound lock poisoned").as_ref() {
                    let _ = tx.send(Ok(reply.to_string()));
                }
            }
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inbound.lock().expect("inbound lock poisoned").take();
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Result<String>>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_text(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }
}
