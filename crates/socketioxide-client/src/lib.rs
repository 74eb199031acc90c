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
    clippy::match_on_vec_items,
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
    future_incompatible,
    nonstandard_style,
    missing_docs
)]
//! Socketioxide client is a socket.io client implementation built on [`tokio`].
//! It speaks the socket.io v5 protocol, and the v4 protocol used by socket.io v2 servers.
//!
//! ## Table of contents
//! * [Features](#features)
//! * [Usage](#usage)
//! * [Handlers](#handlers)
//! * [Emitting data](#emitting-data)
//! * [Acknowledgements](#acknowledgements)
//! * [Namespaces](#namespaces)
//! * [Reconnection](#reconnection)
//! * [Feature flags](#feature-flags)
//!
//! ## Features
//! * Polling & Websocket transports, with the upgrade from polling to websocket
//! * Namespaces multiplexed on one engine.io session
//! * Acknowledgements, in both directions
//! * Binary attachments
//! * Automatic reconnection with exponential backoff
//! * Support for the previous version of the protocol (engine.io v3).
//!
//! ## Usage
//! ```no_run
//! use socketioxide_client::{Client, Event, Socket};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder("http://localhost:3000".parse()?)
//!         .auth(serde_json::json!({ "token": "secret" }))
//!         .build();
//!
//!     client.on("message", |socket: &Socket, event: Event| {
//!         println!("received {:?} on {}", event.args, socket.ns());
//!     });
//!     client.connect();
//!     client.connected().await;
//!     client.emit("message", vec!["hello".into()])?;
//!     Ok(())
//! }
//! ```
//!
//! ## Handlers
//! Handlers are closures registered with [`Socket::on`], [`Socket::on_any`],
//! [`Socket::on_connect`], [`Socket::on_disconnect`] and [`Socket::on_connect_error`].
//! The connection events of the client are observed with [`Client::on_client_event`].
//!
//! Every handler runs on one dispatcher task, in the order the packets were received.
//! Handlers of the same event run in registration order. A handler should not block:
//! spawn a task for long running work.
//!
//! ## Emitting data
//! Event arguments are [`PayloadValue`]s, a json value that can also hold binary data.
//! [`Socket::emit_value`] serializes any [`serde::Serialize`] value.
//! Events emitted before the namespace is connected are buffered and sent in order once
//! the server accepted the connection.
//!
//! ## Acknowledgements
//! [`Socket::emit_with_ack`] returns an [`AckResponse`] future resolved with the arguments of the
//! server acknowledgement. Acknowledgements requested by the server are answered with [`Event::ack`].
//!
//! ## Namespaces
//! [`Client::of`] returns the [`Socket`] of a namespace. Every namespace shares the session
//! of the client and is connected again after each reconnection.
//!
//! ## Reconnection
//! When the session is lost the client retries with an exponential backoff, see
//! [`ReconnectionConfig`]. The state of the client is exposed as a [`ClientStatus`].
//!
//! ## Feature flags
//! * `tracing`: enable logging with [`tracing`](https://docs.rs/tracing/latest/tracing/) calls.
pub mod ack;
pub mod config;
pub mod handler;
pub mod socket;
pub mod state;

mod backoff;
mod client;
mod errors;
mod json;

pub use ack::AckResponse;
pub use client::{Client, ClientEvent};
pub use config::{ClientBuilder, ClientConfig, ReconnectionConfig};
pub use errors::{AckError, AckSendError, EngineIoError, Error, ParseError, SendError, SocketError};
pub use handler::Event;
pub use socket::{DisconnectReason, Socket};
pub use state::{ClientStatus, NsStatus};

pub use engineioxide_client::{ProtocolVersion, config::TransportPolicy, connector};
pub use socketioxide_core::{PayloadValue, Sid, Str};
