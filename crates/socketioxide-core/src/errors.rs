//! Errors shared by the socketioxide crates.

/// Error type when sending packets through the underlying engine.io socket
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    /// The engine.io channel is full.
    /// You might need to increase the channel size with the `max_buffer_size` option.
    #[error("internal channel full error")]
    InternalChannelFull,

    /// The namespace send buffer is full, the namespace is not connected yet.
    #[error("send buffer full error")]
    BufferFull,

    /// The socket is already closed
    #[error("socket closed")]
    Closed,
}
