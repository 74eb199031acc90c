use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, ser::SerializeSeq};
use socketioxide_core::{
    PayloadValue, Str,
    packet::{Packet, PacketData},
    parser::EncodedPacket,
};

/// Serialize a packet to the common format. Binary attachments are replaced by
/// placeholders and returned separately, ordered by their index.
pub fn serialize_packet(packet: Packet) -> EncodedPacket {
    let mut buffer = BytesMut::with_capacity(get_size_hint(&packet)).writer();
    let attachments = collect_attachments(&packet.inner);

    let buf = buffer.get_mut();
    buf.put_u8(b'0' + packet.inner.index() as u8);
    if packet.inner.is_binary() {
        serialize_attachments(buf, attachments.len());
    }
    serialize_nsp(buf, &packet.ns);

    // Writing into a `BytesMut` can't fail and a `PayloadValue` is always a valid json value.
    let res = match &packet.inner {
        PacketData::Connect(Some(data)) | PacketData::ConnectError(data) => {
            serde_json::to_writer(&mut buffer, data)
        }
        PacketData::Connect(None) | PacketData::Disconnect => Ok(()),
        PacketData::Event(event, args, ack) | PacketData::BinaryEvent(event, args, ack) => {
            serialize_ack(buffer.get_mut(), *ack);
            serde_json::to_writer(&mut buffer, &EventArgs(Some(event), args))
        }
        PacketData::EventAck(args, ack) | PacketData::BinaryAck(args, ack) => {
            serialize_ack(buffer.get_mut(), Some(*ack));
            serde_json::to_writer(&mut buffer, &EventArgs(None, args))
        }
    };
    debug_assert!(res.is_ok(), "packet serialization failed: {res:?}");

    // SAFETY: the buffer only contains valid utf8 written from strings and serde_json
    let data = unsafe { Str::from_bytes_unchecked(buffer.into_inner().freeze()) };
    EncodedPacket { data, attachments }
}

/// The json array of an event: `[event, ...args]`, or `[...args]` for an ack.
struct EventArgs<'a>(Option<&'a Str>, &'a [PayloadValue]);
impl Serialize for EventArgs<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.1.len() + self.0.is_some() as usize;
        let mut seq = serializer.serialize_seq(Some(len))?;
        if let Some(event) = self.0 {
            seq.serialize_element(event.as_str())?;
        }
        for arg in self.1 {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

fn collect_attachments(data: &PacketData) -> Vec<Bytes> {
    let args = match data {
        PacketData::BinaryEvent(_, args, _) | PacketData::BinaryAck(args, _) => args,
        _ => return Vec::new(),
    };
    let mut attachments = Vec::new();
    for arg in args {
        arg.visit_binaries(&mut |num, data| attachments.push((num, data.clone())));
    }
    attachments.sort_by_key(|(num, _)| *num);
    attachments.into_iter().map(|(_, data)| data).collect()
}

fn serialize_attachments(buffer: &mut BytesMut, attachments: usize) {
    let mut itoa_buf = itoa::Buffer::new();
    buffer.put_slice(itoa_buf.format(attachments).as_bytes());
    buffer.put_u8(b'-');
}

fn serialize_nsp(buffer: &mut BytesMut, nsp: &str) {
    if !nsp.is_empty() && nsp != "/" {
        if !nsp.starts_with('/') {
            buffer.put_u8(b'/');
        }
        buffer.put_slice(nsp.as_bytes());
        buffer.put_u8(b',');
    }
}

fn serialize_ack(buffer: &mut BytesMut, ack: Option<i64>) {
    let mut itoa_buf = itoa::Buffer::new();
    if let Some(ack) = ack {
        buffer.put_slice(itoa_buf.format(ack).as_bytes());
    }
}

/// Size of the packet header, the json payload is written on top of it.
fn get_size_hint(packet: &Packet) -> usize {
    const PACKET_INDEX_SIZE: usize = 1;
    const BINARY_PUNCTUATION_SIZE: usize = 2;
    const NS_PUNCTUATION_SIZE: usize = 1;
    const ACK_SIZE: usize = 20;
    const PAYLOAD_SIZE: usize = 64;

    let ns_size = if packet.ns == "/" {
        0
    } else {
        packet.ns.len() + NS_PUNCTUATION_SIZE
    };
    let bin_size = if packet.inner.is_binary() {
        BINARY_PUNCTUATION_SIZE
    } else {
        0
    };
    PACKET_INDEX_SIZE + bin_size + ns_size + ACK_SIZE + PAYLOAD_SIZE
}
