//! Chrome DevTools Protocol layer
//!
//! Everything needed to drive a Chromium-family browser over its remote
//! debugging surface:
//!
//! - `traits`: the duplex frame channel seam (WebSocket in production)
//! - `types`: wire-level protocol types
//! - `resolver`: HTTP target discovery with the reuse policy
//! - `session`: multiplexed command/response correlation and event dispatch
//! - `client`: the high-level command façade
//! - `mock`: in-memory channel for tests
//!
//! ## Usage
//! ```rust,no_run
//! use cdp_pilot::cdp::DevToolsClient;
//!
//! # async fn example() -> cdp_pilot::Result<()> {
//! let client = DevToolsClient::connect("http://127.0.0.1:9222", "https://example.com").await?;
//! client.navigate("https://example.com").await?;
//! let title = client.evaluate("document.title").await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod mock;
pub mod resolver;
pub mod session;
pub mod traits;
pub mod types;


pub use client::DevToolsClient;
pub use resolver::ResolvedTarget;
pub use session::{ConnectParams, Session, Subscription, TargetBinding};
pub use traits::{FrameSink, FrameStream};
pub use types::{Clip, Cookie, TargetEntry};

pub use mock::MockChannel;
