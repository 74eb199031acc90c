//! ## An [`EngineIoClientHandler`] to get event calls for an engine.io client session
//! #### Example :
//! ```rust
//! # use bytes::Bytes;
//! # use engineioxide_client::handler::EngineIoClientHandler;
//! # use engineioxide_client::{DisconnectReason, Str};
//! # use std::sync::atomic::{AtomicUsize, Ordering};
//! #[derive(Debug, Default)]
//! struct MyHandler {
//!     msg_cnt: AtomicUsize,
//! }
//!
//! impl EngineIoClientHandler for MyHandler {
//!     fn on_message(&self, msg: Str) {
//!         self.msg_cnt.fetch_add(1, Ordering::Relaxed);
//!     }
//!     fn on_binary(&self, data: Bytes) { }
//!     fn on_disconnect(&self, reason: DisconnectReason) {
//!         println!("disconnected: {reason:?}");
//!     }
//! }
//! ```
use bytes::Bytes;
use engineioxide_core::{Str, TransportType};

use crate::socket::DisconnectReason;

/// The [`EngineIoClientHandler`] trait can be implemented on any struct to handle session events.
///
/// Calls are made from the session tasks, they should not block.
pub trait EngineIoClientHandler: Send + Sync + 'static {
    /// Called when a message is received from the server.
    fn on_message(&self, msg: Str);

    /// Called when a binary message is received from the server.
    fn on_binary(&self, data: Bytes);

    /// Called once when the session is closed with a [`DisconnectReason`].
    fn on_disconnect(&self, reason: DisconnectReason);

    /// Called when a ping is exchanged with the server.
    fn on_ping(&self) {}

    /// Called when a pong is exchanged with the server.
    fn on_pong(&self) {}

    /// Called when the session switched to another transport.
    fn on_upgrade(&self, _transport: TransportType) {}
}
