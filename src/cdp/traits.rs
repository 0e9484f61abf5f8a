//! CDP (Chrome DevTools Protocol) layer traits
//!
//! This module defines the abstract interfaces for the duplex channel a
//! session runs on. The WebSocket implementation lives here too; a scripted
//! in-memory implementation for tests lives in [`super::mock`].

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a duplex text-frame channel
#[async_trait]
pub trait FrameSink: Send {
    /// Transmit one outbound text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a duplex text-frame channel
#[async_trait]
pub trait FrameStream: Send {
    /// Await the next inbound text frame.
    ///
    /// `None` means the channel terminated cleanly; `Some(Err(_))` means it
    /// faulted. Either way no further frames will arrive.
    async fn next_text(&mut self) -> Option<Result<String>>;
}

/// Open a WebSocket to `ws_url` and split it into channel halves
pub async fn connect_websocket(ws_url: &str) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
    let (ws_stream, _) = connect_async(ws_url)
        .await
        .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", ws_url, e)))?;

    debug!("WebSocket connected to {}", ws_url);

    let (sink, stream) = ws_stream.split();
    Ok((
        Box::new(WebSocketSink { sink }),
        Box::new(WebSocketFrames { stream }),
    ))
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::websocket(format!("WebSocket send failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| Error::websocket(format!("WebSocket close failed: {}", e)))
    }
}

struct WebSocketFrames {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_text(&mut self) -> Option<Result<String>> {
        // Skip non-text frames; tungstenite answers pings internally.
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => {
                    debug!("WebSocket close frame received");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(Error::websocket(format!("WebSocket read failed: {}", e))))
                }
            }
        }
    }
}
