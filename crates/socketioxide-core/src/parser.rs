//! The [`Parse`] interface implemented by socket.io parsers.
//!
//! A parser converts [`Packet`]s to engine.io messages and back. Binary packets are
//! made of a string packet followed by adjacent binary attachments, so decoding is
//! stateful: the partial packet is kept in a [`ParserState`] until every attachment
//! is received.
use std::sync::Mutex;

use bytes::Bytes;

use crate::{Str, packet::Packet};

/// An encoded packet, a string message followed by its binary attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPacket {
    /// The string message
    pub data: Str,
    /// The attachments to send as adjacent binary messages, ordered by placeholder index
    pub attachments: Vec<Bytes>,
}

/// All socket.io parser should implement this trait
pub trait Parse: Default + Copy {
    /// Convert a packet into a string message and its attachments
    fn encode(self, packet: Packet) -> EncodedPacket;

    /// Parse a given input string. If the payload needs more adjacent binary packet,
    /// the partial packet will be kept and a [`ParseError::NeedsMoreBinaryData`] will be returned
    fn decode_str(self, state: &ParserState, data: Str) -> Result<Packet, ParseError>;

    /// Parse a given input binary. The packet is returned once every attachment
    /// announced by the partial packet is received.
    fn decode_bin(self, state: &ParserState, bin: Bytes) -> Result<Packet, ParseError>;

    /// Check that no partial packet is waiting for attachments, it is discarded if so.
    fn finalize(self, state: &ParserState) -> Result<(), ParseError>;
}

/// A binary packet waiting for its attachments
#[derive(Debug)]
pub struct PartialPacket {
    /// The packet, its placeholders are not resolved yet
    pub packet: Packet,
    /// The number of attachments announced in the packet header
    pub expected: usize,
    /// The attachments received so far
    pub attachments: Vec<Bytes>,
}

/// The state of a parser, one per connection.
#[derive(Debug, Default)]
pub struct ParserState {
    /// Partial binary packet that is being received
    pub partial_bin_packet: Mutex<Option<PartialPacket>>,
}

/// Errors when parsing/serializing socket.io packets
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid packet type
    #[error("invalid packet type")]
    InvalidPacketType,

    /// Invalid event name
    #[error("invalid event name")]
    InvalidEventName,

    /// Invalid JSON payload
    #[error("invalid data")]
    InvalidData,

    /// Invalid namespace
    #[error("invalid namespace")]
    InvalidNamespace,

    /// Invalid ack id
    #[error("invalid ack id")]
    InvalidAckId,

    /// Invalid attachments count
    #[error("invalid attachments")]
    InvalidAttachments,

    /// Received unexpected binary data
    #[error(
        "received unexpected binary data. Make sure you are using the same parser on both ends."
    )]
    UnexpectedBinaryPacket,

    /// The attachments do not match the placeholders of the packet
    #[error("attachment mismatch: expected {expected}, received {received}")]
    AttachmentMismatch {
        /// The number of attachments announced by the packet
        expected: usize,
        /// The number of attachments received or referenced
        received: usize,
    },

    /// Needs more binary data before deserialization. It is not exactly an error, it is used for control flow,
    /// e.g the common parser needs adjacent binary packets and therefore will returns [`NeedsMoreBinaryData`] n times for n adjacent binary packet expected.
    /// In this case the user should call again the parser with the next binary payload.
    ///
    /// [`NeedsMoreBinaryData`]: ParseError::NeedsMoreBinaryData
    #[error("needs more binary data before deserialization")]
    NeedsMoreBinaryData,
}
