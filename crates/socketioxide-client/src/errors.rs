use std::sync::Arc;

use engineioxide_client::DisconnectReason as EIoDisconnectReason;
use socketioxide_core::{PayloadValue, Str};
use tokio::time::error::Elapsed;

pub use engineioxide_client::Error as EngineIoError;
pub use socketioxide_core::{errors::SocketError, parser::ParseError};

/// Error type of the socket.io client.
///
/// Errors are reported to the [`ClientEvent::Error`](crate::ClientEvent::Error) observers,
/// the last one is also available with [`Client::last_error`](crate::Client::last_error).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The engine.io session was lost, the client will try to reconnect.
    #[error("transport error: {0:?}")]
    Transport(EIoDisconnectReason),

    /// A packet sent by the server could not be decoded. It is dropped and the connection is kept.
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// The engine.io handshake failed.
    #[error("handshake error: {0}")]
    Handshake(#[from] EngineIoError),

    /// The server refused the connection to a namespace.
    #[error("connection to namespace {ns} refused: {}", auth_message(.data))]
    Auth {
        /// The refused namespace
        ns: Str,
        /// The payload of the `CONNECT_ERROR` packet
        data: PayloadValue,
    },

    /// Every reconnection attempt failed.
    #[error("reconnection failed after {attempts} attempts: {last}")]
    ReconnectFailed {
        /// The number of reconnection attempts
        attempts: u32,
        /// The error of the last attempt
        last: Arc<Error>,
    },
}

/// `CONNECT_ERROR` payloads are `{ message, data? }` or a bare string with older servers.
fn auth_message(data: &PayloadValue) -> &str {
    data.get("message")
        .and_then(PayloadValue::as_str)
        .or_else(|| data.as_str())
        .unwrap_or("unknown reason")
}

/// Error type for ack operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AckError {
    /// The ack response timed out
    #[error("ack timeout error")]
    Timeout,

    /// The namespace or the client was disconnected before receiving the ack
    #[error("ack cancelled, the socket was disconnected")]
    Cancelled,

    /// Error sending data through the engine.io socket
    #[error("Error sending data through the engine.io socket: {0:?}")]
    Socket(#[from] SocketError),
}

impl From<Elapsed> for AckError {
    fn from(_: Elapsed) -> Self {
        Self::Timeout
    }
}

/// Error type for sending operations.
#[derive(thiserror::Error, Debug)]
pub enum SendError {
    /// An error occurred while serializing the data.
    #[error("Error serializing data: {0:?}")]
    Serialize(#[from] serde_json::Error),

    /// Error sending data through the engine.io socket
    #[error("Error sending data through the engine.io socket: {0:?}")]
    Socket(#[from] SocketError),
}

/// Error type when answering to an ack request of the server with [`Event::ack`](crate::Event::ack).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AckSendError {
    /// The ack was already sent
    #[error("ack already sent")]
    AlreadySent,

    /// The server did not request an ack for this event
    #[error("no ack requested")]
    NotRequested,

    /// Error sending data through the engine.io socket
    #[error("Error sending data through the engine.io socket: {0:?}")]
    Socket(#[from] SocketError),
}
