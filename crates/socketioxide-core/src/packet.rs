//! Socket.io packet implementation.
//! The [`Packet`] is the base unit of data that is sent over the engine.io socket.

use serde::{Deserialize, Serialize};

use crate::{PayloadValue, Sid, Str};

/// The socket.io packet type.
/// Each packet has a type and a namespace
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The packet data
    pub inner: PacketData,
    /// The namespace the packet belongs to
    pub ns: Str,
}

impl Packet {
    /// Create a connect packet for the given namespace with an optional auth payload
    pub fn connect(ns: impl Into<Str>, auth: Option<PayloadValue>) -> Self {
        Self {
            inner: PacketData::Connect(auth),
            ns: ns.into(),
        }
    }

    /// Create a disconnect packet for the given namespace
    pub fn disconnect(ns: impl Into<Str>) -> Self {
        Self {
            inner: PacketData::Disconnect,
            ns: ns.into(),
        }
    }

    /// Create a connect error packet for the given namespace
    pub fn connect_error(ns: impl Into<Str>, data: PayloadValue) -> Self {
        Self {
            inner: PacketData::ConnectError(data),
            ns: ns.into(),
        }
    }

    /// Create an event packet for the given namespace.
    /// If there are binary attachments in the args, it will be a binary packet
    /// and the attachments are numbered in order of appearance.
    pub fn event(ns: impl Into<Str>, event: impl Into<Str>, mut args: Vec<PayloadValue>) -> Self {
        let inner = if number_binaries(&mut args) > 0 {
            PacketData::BinaryEvent(event.into(), args, None)
        } else {
            PacketData::Event(event.into(), args, None)
        };
        Self {
            inner,
            ns: ns.into(),
        }
    }

    /// Create an ack packet for the given namespace.
    /// If there are binary attachments in the args, it will be a binary packet
    /// and the attachments are numbered in order of appearance.
    pub fn ack(ns: impl Into<Str>, mut args: Vec<PayloadValue>, ack: i64) -> Self {
        let inner = if number_binaries(&mut args) > 0 {
            PacketData::BinaryAck(args, ack)
        } else {
            PacketData::EventAck(args, ack)
        };
        Self {
            inner,
            ns: ns.into(),
        }
    }
}

/// Set the index of every binary attachment, depth first. Returns the number of attachments.
fn number_binaries(args: &mut [PayloadValue]) -> usize {
    let mut count = 0;
    for arg in args {
        arg.visit_mut(&mut |v| {
            if let PayloadValue::Binary(num, _) = v {
                *num = count;
                count += 1;
            }
        });
    }
    count
}

/// | Type          | ID  | Usage                                                                                 |
/// |---------------|-----|---------------------------------------------------------------------------------------|
/// | CONNECT       | 0   | Used during the [connection to a namespace](#connection-to-a-namespace).              |
/// | DISCONNECT    | 1   | Used when [disconnecting from a namespace](#disconnection-from-a-namespace).          |
/// | EVENT         | 2   | Used to [send data](#sending-and-receiving-data) to the other side.                   |
/// | ACK           | 3   | Used to [acknowledge](#acknowledgement) an event.                                     |
/// | CONNECT_ERROR | 4   | Used during the [connection to a namespace](#connection-to-a-namespace).              |
/// | BINARY_EVENT  | 5   | Used to [send binary data](#sending-and-receiving-data) to the other side.            |
/// | BINARY_ACK    | 6   | Used to [acknowledge](#acknowledgement) an event (the response includes binary data). |
#[derive(Debug, Clone, PartialEq)]
pub enum PacketData {
    /// Connect packet with an optional payload.
    /// The client sends its auth payload, the server answers with a [`ConnectPacket`].
    Connect(Option<PayloadValue>),
    /// Disconnect packet, used to disconnect from a namespace
    Disconnect,
    /// Event packet with optional ack id, to request an ack from the other side
    Event(Str, Vec<PayloadValue>, Option<i64>),
    /// Event ack packet, to acknowledge an event
    EventAck(Vec<PayloadValue>, i64),
    /// Connect error packet, sent when the connection to a namespace is refused.
    /// It is either `{ message, data? }` or a bare string with older servers.
    ConnectError(PayloadValue),
    /// Binary event packet with optional ack id, to request an ack from the other side
    BinaryEvent(Str, Vec<PayloadValue>, Option<i64>),
    /// Binary ack packet, to acknowledge an event with binary data
    BinaryAck(Vec<PayloadValue>, i64),
}

impl PacketData {
    /// Returns the index of the packet type
    pub fn index(&self) -> usize {
        match self {
            PacketData::Connect(_) => 0,
            PacketData::Disconnect => 1,
            PacketData::Event(..) => 2,
            PacketData::EventAck(..) => 3,
            PacketData::ConnectError(_) => 4,
            PacketData::BinaryEvent(..) => 5,
            PacketData::BinaryAck(..) => 6,
        }
    }

    /// Set the ack id for the packet
    /// It will only set the ack id for the packets that support it
    pub fn set_ack_id(&mut self, ack_id: i64) {
        match self {
            PacketData::Event(_, _, ack) | PacketData::BinaryEvent(_, _, ack) => {
                *ack = Some(ack_id)
            }
            _ => {}
        };
    }

    /// Check if the packet is a binary packet (either binary event or binary ack)
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            PacketData::BinaryEvent(..) | PacketData::BinaryAck(..)
        )
    }

    /// The number of binary attachments carried by the packet
    pub fn attachments_count(&self) -> usize {
        let mut count = 0;
        let mut visit = |_: usize, _: &bytes::Bytes| count += 1;
        match self {
            PacketData::BinaryEvent(_, args, _) | PacketData::BinaryAck(args, _) => {
                args.iter().for_each(|arg| arg.visit_binaries(&mut visit))
            }
            _ => (),
        }
        count
    }
}

/// Connect packet sent by the server when the connection to a namespace is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPacket {
    /// The socket ID
    pub sid: Sid,
}
