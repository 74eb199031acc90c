//! The transport module holds the two halves of an engine.io connection.
//!
//! A transport is split in a [`TransportTx`], owned by the writer task of the session,
//! and a [`TransportRx`], owned by the reader task. Both halves can be swapped
//! independently during an upgrade from polling to websocket.
//!
//! Dropping both halves closes the underlying connection.

use engineioxide_core::{PacketBuf, TransportType};

use crate::errors::Error;

pub mod polling;
pub mod ws;

#[cfg(any(test, feature = "__test_harness"))]
use tokio::sync::mpsc;

/// The sending half of a transport.
#[derive(Debug)]
pub enum TransportTx {
    /// Http long-polling, each batch is sent in a POST request.
    Polling(polling::PollingTx),
    /// Websocket, each packet is sent in its own frame.
    Websocket(ws::WsTx),
    /// In memory transport used for testing.
    #[cfg(any(test, feature = "__test_harness"))]
    #[doc(hidden)]
    Piped(mpsc::Sender<engineioxide_core::Packet>, TransportType),
}

/// The receiving half of a transport.
#[derive(Debug)]
pub enum TransportRx {
    /// Http long-polling, each batch is the payload of a GET request.
    Polling(polling::PollingRx),
    /// Websocket, each batch holds one frame.
    Websocket(ws::WsRx),
    /// In memory transport used for testing.
    #[cfg(any(test, feature = "__test_harness"))]
    #[doc(hidden)]
    Piped(mpsc::Receiver<engineioxide_core::Packet>, TransportType),
}

impl TransportTx {
    /// The [`TransportType`] of this half.
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportTx::Polling(_) => TransportType::Polling,
            TransportTx::Websocket(_) => TransportType::Websocket,
            #[cfg(any(test, feature = "__test_harness"))]
            TransportTx::Piped(_, t) => *t,
        }
    }

    /// Send a batch of packets. With polling, the whole batch is sent in one request.
    pub async fn send(&mut self, packets: PacketBuf) -> Result<(), Error> {
        match self {
            TransportTx::Polling(tx) => tx.send(packets).await,
            TransportTx::Websocket(tx) => tx.send(packets).await,
            #[cfg(any(test, feature = "__test_harness"))]
            TransportTx::Piped(tx, _) => {
                for packet in packets {
                    tx.send(packet).await.map_err(|_| Error::TransportClosed)?;
                }
                Ok(())
            }
        }
    }
}

impl TransportRx {
    /// The [`TransportType`] of this half.
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportRx::Polling(_) => TransportType::Polling,
            TransportRx::Websocket(_) => TransportType::Websocket,
            #[cfg(any(test, feature = "__test_harness"))]
            TransportRx::Piped(_, t) => *t,
        }
    }

    /// Receive the next batch of packets.
    ///
    /// An empty batch is not an error, it means that the server had nothing to send
    /// before the polling timeout elapsed.
    /// [`Error::TransportClosed`] is returned once the remote end closed the connection.
    pub async fn recv(&mut self) -> Result<PacketBuf, Error> {
        match self {
            TransportRx::Polling(rx) => rx.recv().await,
            TransportRx::Websocket(rx) => rx.recv().await,
            #[cfg(any(test, feature = "__test_harness"))]
            TransportRx::Piped(rx, _) => match rx.recv().await {
                Some(packet) => Ok(smallvec::smallvec![packet]),
                None => Err(Error::TransportClosed),
            },
        }
    }
}
