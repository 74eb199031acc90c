//! ## Decoders for http payloads
//!
//! There are two versions of the decoder:
//! - v4_decoder: decodes the payload according to the [engine.io v4 protocol](https://socket.io/fr/docs/v4/engine-io-protocol/#http-long-polling-1)
//! - v3_decoder: decodes the payload according to the [engine.io v3 protocol](https://github.com/socketio/engine.io-protocol/tree/v3#payload)

use crate::{
    Packet, PacketParseError, Str,
    payload::{PACKET_SEPARATOR_V3, PACKET_SEPARATOR_V4},
};

/// Split a v4 payload on the record separator and decode each packet.
///
/// The separator is an ascii char so slicing on it always respects utf8 boundaries.
pub fn v4_decoder(data: Str) -> impl Iterator<Item = Result<Packet, PacketParseError>> {
    let mut start = 0;
    let mut done = data.is_empty();
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let end = match data.as_bytes()[start..]
            .iter()
            .position(|b| *b == PACKET_SEPARATOR_V4)
        {
            Some(i) => start + i,
            None => {
                done = true;
                data.len()
            }
        };
        let packet = data.slice(start..end);
        start = end + 1;
        Some(Packet::try_from(packet))
    })
}

/// Decode a v3 string payload made of `<len>:<packet>` chunks.
///
/// A malformed length stops the decoding after yielding a [`PacketParseError::InvalidPacketLen`]
/// because the following chunk boundaries cannot be known.
pub fn v3_decoder(data: Str) -> impl Iterator<Item = Result<Packet, PacketParseError>> {
    let mut start = 0;
    let mut done = data.is_empty();
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match next_v3_chunk(&data, start) {
            Ok((packet, end)) => {
                start = end;
                done = end >= data.len();
                Some(Packet::try_from(packet))
            }
            Err(e) => {
                done = true;
                Some(Err(e))
            }
        }
    })
}

/// Read the chunk starting at `start`, returns it with the index following it.
fn next_v3_chunk(data: &Str, start: usize) -> Result<(Str, usize), PacketParseError> {
    let rest = &data.as_str()[start..];
    let sep = rest
        .bytes()
        .position(|b| b == PACKET_SEPARATOR_V3)
        .ok_or(PacketParseError::InvalidPacketLen)?;
    let len: usize = rest[..sep]
        .parse()
        .map_err(|_| PacketParseError::InvalidPacketLen)?;
    let body_start = sep + 1;
    let body = &rest[body_start..];
    // the length is counted in chars
    let body_len = match body.char_indices().nth(len) {
        Some((i, _)) => i,
        None if body.chars().count() == len => body.len(),
        None => return Err(PacketParseError::InvalidPacketLen),
    };
    let chunk_start = start + body_start;
    let chunk_end = chunk_start + body_len;
    Ok((data.slice(chunk_start..chunk_end), chunk_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_v4_payload() {
        let packets = v4_decoder("4hello€\x1ebAQIDBA==\x1e2".into())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            packets,
            vec![
                Packet::Message("hello€".into()),
                Packet::Binary(vec![1, 2, 3, 4].into()),
                Packet::Ping,
            ]
        );
    }

    #[test]
    fn decode_v4_keeps_valid_neighbours() {
        let packets = v4_decoder("4a\x1ez\x1e4b".into()).collect::<Vec<_>>();
        assert_eq!(packets.len(), 3);
        assert!(matches!(packets[0], Ok(Packet::Message(ref m)) if m == "a"));
        assert!(packets[1].is_err());
        assert!(matches!(packets[2], Ok(Packet::Message(ref m)) if m == "b"));
    }

    #[test]
    fn decode_v4_empty() {
        assert_eq!(v4_decoder(Str::default()).count(), 0);
    }

    #[test]
    fn decode_v3_payload() {
        let packets = v3_decoder("7:4hello€10:b4AQIDBA==1:6".into())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            packets,
            vec![
                Packet::Message("hello€".into()),
                Packet::BinaryV3(vec![1, 2, 3, 4].into()),
                Packet::Noop,
            ]
        );
    }

    #[test]
    fn decode_v3_bad_length() {
        let mut packets = v3_decoder("2:4a9:4b".into());
        assert!(matches!(packets.next(), Some(Ok(Packet::Message(m))) if m == "a"));
        assert!(matches!(
            packets.next(),
            Some(Err(PacketParseError::InvalidPacketLen))
        ));
        assert!(packets.next().is_none());

        let mut packets = v3_decoder("x:4a".into());
        assert!(matches!(
            packets.next(),
            Some(Err(PacketParseError::InvalidPacketLen))
        ));
    }
}
