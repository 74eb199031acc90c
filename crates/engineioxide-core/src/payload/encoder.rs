//! ## Encoders for http payloads
//!
//! There are 2 different encoders:
//! * engine.io v4 encoder
//! * engine.io v3 string encoder (binary packets are sent base64 encoded with the `b4` prefix)

use crate::{Packet, payload::PACKET_SEPARATOR_V3, payload::PACKET_SEPARATOR_V4};

/// Encode multiple packets into a string payload according to the
/// [engine.io v4 protocol](https://socket.io/fr/docs/v4/engine-io-protocol/#http-long-polling-1)
pub fn v4_encoder(packets: impl IntoIterator<Item = Packet>) -> String {
    let mut data = String::new();
    for packet in packets {
        if !data.is_empty() {
            data.push(PACKET_SEPARATOR_V4 as char);
        }
        data.push_str(&String::from(packet));
    }
    data
}

/// Encode multiple packets into a string payload according to the
/// [engine.io v3 protocol](https://github.com/socketio/engine.io-protocol/tree/v3#payload)
///
/// The length prefix of each packet is its number of chars, not bytes.
pub fn v3_encoder(packets: impl IntoIterator<Item = Packet>) -> String {
    let mut data = String::new();
    let mut itoa = itoa::Buffer::new();
    for packet in packets {
        let packet = match packet {
            Packet::Binary(bin) => Packet::BinaryV3(bin),
            packet => packet,
        };
        let packet: String = packet.into();
        data.push_str(itoa.format(packet.chars().count()));
        data.push(PACKET_SEPARATOR_V3 as char);
        data.push_str(&packet);
    }
    data
}
