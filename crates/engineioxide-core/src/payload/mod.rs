//! ## Http long-polling payloads
//!
//! With the polling transport several packets are tied together in a single http body.
//! How packets are tied together depends on the protocol version:
//! * v4: packets are separated by the `\x1e` record separator.
//! * v3: each packet is prefixed by its length in chars followed by `:`.

use crate::{Packet, PacketParseError, ProtocolVersion, Str};

mod decoder;
mod encoder;

pub use decoder::{v3_decoder, v4_decoder};
pub use encoder::{v3_encoder, v4_encoder};

/// Packet separator of the v4 protocol
pub const PACKET_SEPARATOR_V4: u8 = b'\x1e';
/// Separator between the length and the packet of the v3 protocol
pub const PACKET_SEPARATOR_V3: u8 = b':';

/// Encode packets into one payload for the given protocol.
pub fn encode(packets: impl IntoIterator<Item = Packet>, protocol: ProtocolVersion) -> String {
    match protocol {
        ProtocolVersion::V4 => v4_encoder(packets),
        ProtocolVersion::V3 => v3_encoder(packets),
    }
}

/// Decode a payload into packets for the given protocol.
///
/// Each packet is decoded independently so a single invalid packet does not invalidate
/// its neighbours. A payload bigger than `max_payload` yields a single
/// [`PacketParseError::PayloadTooLarge`] error.
pub fn decode(
    data: Str,
    protocol: ProtocolVersion,
    max_payload: u64,
) -> Box<dyn Iterator<Item = Result<Packet, PacketParseError>> + Send> {
    if data.len() as u64 > max_payload {
        return Box::new(std::iter::once(Err(PacketParseError::PayloadTooLarge {
            max: max_payload,
        })));
    }
    match protocol {
        ProtocolVersion::V4 => Box::new(v4_decoder(data)),
        ProtocolVersion::V3 => Box::new(v3_decoder(data)),
    }
}
