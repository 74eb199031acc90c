use std::io::Cursor;

use bytes::Buf;
use socketioxide_core::{
    PayloadValue, Str,
    packet::{Packet, PacketData},
    parser::ParseError,
};

/// Deserialize a packet from the common format.
/// Returns the packet along with the attachments count of binary packets.
/// Placeholders of binary packets are kept as plain objects.
pub fn deserialize_packet(data: Str) -> Result<(Packet, Option<usize>), ParseError> {
    if data.is_empty() {
        return Err(ParseError::InvalidPacketType);
    }
    // It is possible to parse the packet from a byte slice because separators are only ASCII
    let mut reader = Cursor::new(data.as_str());
    let index = reader.get_u8();
    let index = (b'0'..=b'6')
        .contains(&index)
        .then_some(index)
        .ok_or(ParseError::InvalidPacketType)?;

    let attachments: Option<usize> = if index == b'5' || index == b'6' {
        Some(read_attachments(&mut reader).ok_or(ParseError::InvalidAttachments)?)
    } else {
        None
    };

    // Custom nsps will start with a slash
    let ns = if reader.has_remaining().then(|| reader.chunk()[0]) == Some(b'/') {
        read_nsp(&mut reader, &data)?
    } else {
        Str::from("/")
    };

    let ack = match index {
        b'2' | b'3' | b'5' | b'6' => read_ack(&mut reader)?,
        _ => None,
    };

    let data = &data[reader.position() as usize..];
    let inner = match index {
        b'0' if data.is_empty() => PacketData::Connect(None),
        b'0' => match read_value(data)? {
            value @ PayloadValue::Object(_) => PacketData::Connect(Some(value)),
            _ => return Err(ParseError::InvalidData),
        },
        b'1' => PacketData::Disconnect,
        b'2' => {
            let (event, args) = read_event(data)?;
            PacketData::Event(event, args, ack)
        }
        b'3' => PacketData::EventAck(read_args(data)?, ack.ok_or(ParseError::InvalidAckId)?),
        b'4' => match read_value(data)? {
            value @ (PayloadValue::Object(_) | PayloadValue::String(_)) => {
                PacketData::ConnectError(value)
            }
            _ => return Err(ParseError::InvalidData),
        },
        b'5' => {
            let (event, args) = read_event(data)?;
            PacketData::BinaryEvent(event, args, ack)
        }
        b'6' => PacketData::BinaryAck(read_args(data)?, ack.ok_or(ParseError::InvalidAckId)?),
        _ => return Err(ParseError::InvalidPacketType),
    };
    Ok((Packet { inner, ns }, attachments))
}

fn read_value(data: &str) -> Result<PayloadValue, ParseError> {
    serde_json::from_str(data).map_err(|_| ParseError::InvalidData)
}

fn read_args(data: &str) -> Result<Vec<PayloadValue>, ParseError> {
    serde_json::from_str(data).map_err(|_| ParseError::InvalidData)
}

/// Read the `[event, ...args]` array of an event packet.
fn read_event(data: &str) -> Result<(Str, Vec<PayloadValue>), ParseError> {
    let mut args = read_args(data)?;
    if args.is_empty() {
        return Err(ParseError::InvalidEventName);
    }
    match args.remove(0) {
        PayloadValue::String(event) => Ok((Str::from(event), args)),
        _ => Err(ParseError::InvalidEventName),
    }
}

/// Read the attachments count of a binary packet.
///
/// Each attachment needs a placeholder object in the payload,
/// so a count larger than the packet itself is rejected.
fn read_attachments(reader: &mut Cursor<&str>) -> Option<usize> {
    let data = *reader.get_ref();
    let start_index = reader.position() as usize;
    loop {
        match reader.has_remaining().then(|| reader.get_u8()) {
            Some(c) if c.is_ascii_digit() => (),
            Some(b'-') if reader.position() as usize > start_index + 1 => {
                break data[start_index..reader.position() as usize - 1]
                    .parse()
                    .ok()
                    .filter(|&count: &usize| count <= data.len());
            }
            _ => break None,
        }
    }
}

/// Read the namespace up to the comma separator.
///
/// Some clients do not end the namespace with a comma when it is the end of the packet,
/// e.g `1/custom`. A payload starting before any comma is an invalid namespace.
fn read_nsp(reader: &mut Cursor<&str>, data: &Str) -> Result<Str, ParseError> {
    let start_index = reader.position() as usize;
    loop {
        match reader.has_remaining().then(|| reader.get_u8()) {
            Some(b',') => {
                break Ok(data.slice(start_index..reader.position() as usize - 1));
            }
            None => break Ok(data.slice(start_index..reader.position() as usize)),
            Some(b'[' | b'{' | b'"') => break Err(ParseError::InvalidNamespace),
            Some(_) => (),
        }
    }
}

/// Read the optional ack id. It must be followed by the json payload or by the end of the packet.
fn read_ack(reader: &mut Cursor<&str>) -> Result<Option<i64>, ParseError> {
    let start_index = reader.position() as usize;
    let data = *reader.get_ref();
    loop {
        match reader.has_remaining().then(|| reader.chunk()[0]) {
            Some(c) if c.is_ascii_digit() => reader.advance(1),
            None | Some(b'[' | b'{') if reader.position() as usize == start_index => {
                break Ok(None);
            }
            None | Some(b'[' | b'{') => {
                break data[start_index..reader.position() as usize]
                    .parse()
                    .map(Some)
                    .map_err(|_| ParseError::InvalidAckId);
            }
            _ => break Err(ParseError::InvalidAckId),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &'static str) -> Result<(Packet, Option<usize>), ParseError> {
        deserialize_packet(Str::from(data))
    }

    #[test]
    fn nsp_without_comma() {
        let (packet, _) = read("1/custom").unwrap();
        assert_eq!(packet, Packet::disconnect("/custom"));
    }

    #[test]
    fn invalid_packets() {
        assert_eq!(read("").unwrap_err(), ParseError::InvalidPacketType);
        assert_eq!(read("7[]").unwrap_err(), ParseError::InvalidPacketType);
        assert_eq!(read("5-[]").unwrap_err(), ParseError::InvalidAttachments);
        assert_eq!(read("5a-[]").unwrap_err(), ParseError::InvalidAttachments);
        assert_eq!(
            read("5300000000000000000-[\"a\"]").unwrap_err(),
            ParseError::InvalidAttachments
        );
        assert_eq!(
            read("599999999999999999999-[\"a\"]").unwrap_err(),
            ParseError::InvalidAttachments
        );
        assert_eq!(read("540-[\"a\"]").unwrap_err(), ParseError::InvalidAttachments);
        assert_eq!(read("2/admin[\"a\"]").unwrap_err(), ParseError::InvalidNamespace);
        assert_eq!(read("212a[\"a\"]").unwrap_err(), ParseError::InvalidAckId);
        assert_eq!(
            read("299999999999999999999[\"a\"]").unwrap_err(),
            ParseError::InvalidAckId
        );
        assert_eq!(read("3[\"a\"]").unwrap_err(), ParseError::InvalidAckId);
        assert_eq!(read("2€").unwrap_err(), ParseError::InvalidAckId);
        assert_eq!(read("€[]").unwrap_err(), ParseError::InvalidPacketType);
        assert_eq!(read("2[1]").unwrap_err(), ParseError::InvalidEventName);
        assert_eq!(read("2[]").unwrap_err(), ParseError::InvalidEventName);
        assert_eq!(read("2[\"a\"").unwrap_err(), ParseError::InvalidData);
        assert_eq!(read("2").unwrap_err(), ParseError::InvalidData);
        assert_eq!(read("0[1]").unwrap_err(), ParseError::InvalidData);
        assert_eq!(read("4").unwrap_err(), ParseError::InvalidData);
    }

    #[test]
    fn binary_header() {
        let (packet, attachments) = read("52-/admin™,12[\"a\"]").unwrap();
        assert_eq!(attachments, Some(2));
        assert_eq!(packet.ns, "/admin™");
        assert_eq!(
            packet.inner,
            PacketData::BinaryEvent("a".into(), vec![], Some(12))
        );
    }
}
