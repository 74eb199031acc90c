#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::await_holding_lock,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    rust_2024_compatibility,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]

//! Engine.IO client library for Rust.
//!
//! It opens an engine.io session with a server through a [`Connector`], starting with
//! http long-polling and upgrading to websocket when the server allows it.
//! The session keeps the connection alive with the heartbeat mechanism of the negotiated
//! [`ProtocolVersion`] and forwards every message to an
//! [`EngineIoClientHandler`](handler::EngineIoClientHandler).
//!
//! #### Example :
//! ```no_run
//! # use bytes::Bytes;
//! # use engineioxide_client::{Socket, DisconnectReason, Str};
//! # use engineioxide_client::config::EngineIoClientConfig;
//! # use engineioxide_client::handler::EngineIoClientHandler;
//! # use engineioxide_client::connector::DefaultConnector;
//! # use std::sync::Arc;
//! struct MyHandler;
//!
//! impl EngineIoClientHandler for MyHandler {
//!     fn on_message(&self, msg: Str) {
//!         println!("received {msg}");
//!     }
//!     fn on_binary(&self, data: Bytes) { }
//!     fn on_disconnect(&self, reason: DisconnectReason) { }
//! }
//!
//! # async fn doc() -> Result<(), engineioxide_client::Error> {
//! let config = EngineIoClientConfig::builder("http://localhost:3000".parse()?).build();
//! let socket = Socket::connect(Arc::new(DefaultConnector::default()), config, Arc::new(MyHandler)).await?;
//! socket.emit("hello").ok();
//! # Ok(())
//! # }
//! ```

pub use engineioxide_core::{OpenPacket, Packet, PacketBuf, ProtocolVersion, Sid, Str, TransportType};
pub use errors::Error;
pub use socket::{DisconnectReason, Permit, Socket};

pub mod config;
pub mod connector;
pub mod handler;
pub mod socket;
pub mod transport;

mod errors;
