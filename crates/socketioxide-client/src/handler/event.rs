use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::de::DeserializeOwned;
use socketioxide_core::{PayloadValue, Str, packet::Packet};

use crate::{errors::AckSendError, socket::Socket};

/// An event received from the server.
///
/// If the server requested an acknowledgement, it can be answered once with [`Event::ack`],
/// from any of the handlers receiving a clone of the event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The event name
    pub name: Str,
    /// The event arguments
    pub args: Vec<PayloadValue>,
    ack: Option<AckSender>,
}

impl Event {
    pub(crate) fn new(name: Str, args: Vec<PayloadValue>, ack: Option<AckSender>) -> Self {
        Self { name, args, ack }
    }

    /// Returns true if the server is waiting for an acknowledgement.
    pub fn needs_ack(&self) -> bool {
        self.ack.is_some()
    }

    /// Deserialize the first argument, a missing argument is `null`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self.args.first() {
            Some(arg) => arg.deserialize(),
            None => PayloadValue::Null.deserialize(),
        }
    }

    /// Answer the acknowledgement request of the server with `args`.
    ///
    /// # Errors
    /// * [`AckSendError::NotRequested`] if the server did not request an acknowledgement.
    /// * [`AckSendError::AlreadySent`] if this event was already acknowledged.
    /// * [`AckSendError::Socket`] if the packet could not be sent.
    pub fn ack(&self, args: Vec<PayloadValue>) -> Result<(), AckSendError> {
        let ack = self.ack.as_ref().ok_or(AckSendError::NotRequested)?;
        if ack.sent.swap(true, Ordering::SeqCst) {
            return Err(AckSendError::AlreadySent);
        }
        let packet = Packet::ack(ack.socket.ns().clone(), args, ack.id);
        ack.socket.send_packet(packet)?;
        Ok(())
    }
}

/// Sends the ack of an event, shared by every clone of the event.
#[derive(Clone)]
pub(crate) struct AckSender {
    socket: Socket,
    id: i64,
    sent: Arc<AtomicBool>,
}

impl AckSender {
    pub fn new(socket: Socket, id: i64) -> Self {
        Self {
            socket,
            id,
            sent: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl fmt::Debug for AckSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckSender")
            .field("ns", self.socket.ns())
            .field("id", &self.id)
            .field("sent", &self.sent)
            .finish()
    }
}
