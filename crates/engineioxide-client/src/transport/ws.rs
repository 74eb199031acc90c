//! Websocket transport.
//!
//! String packets are sent as text frames and binary packets as binary frames.
//! With the v3 protocol binary frames are prefixed by the `0x04` message packet type.
use bytes::Bytes;
use engineioxide_core::{OpenPacket, Packet, PacketBuf, ProtocolVersion, Sid, Str, TransportType};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use smallvec::smallvec;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest},
};

use crate::{config::EngineIoClientConfig, errors::Error};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a websocket on the engine.io endpoint.
///
/// A `sid` is given when the websocket is used to upgrade an existing session.
pub async fn connect(
    config: &EngineIoClientConfig,
    sid: Option<&Sid>,
) -> Result<(WsTx, WsRx), Error> {
    let url = config.endpoint(TransportType::Websocket, sid)?;
    let mut req = url.as_str().into_client_request()?;
    req.headers_mut().extend(config.headers.clone());

    let (ws, _res) = connect_async(req).await?;
    #[cfg(feature = "tracing")]
    tracing::debug!(?sid, "websocket connected: {}", _res.status());

    let (tx, rx) = ws.split();
    let tx = WsTx {
        inner: tx,
        protocol: config.protocol,
    };
    let rx = WsRx {
        inner: rx,
        protocol: config.protocol,
    };
    Ok((tx, rx))
}

/// Perform the engine.io handshake directly over a websocket.
///
/// The first frame sent by the server must be an open packet.
pub async fn handshake(config: &EngineIoClientConfig) -> Result<(OpenPacket, WsTx, WsRx), Error> {
    let (tx, mut rx) = connect(config, None).await?;
    match rx.recv().await?.into_iter().next() {
        Some(Packet::Open(open)) => Ok((open, tx, rx)),
        _ => Err(Error::Handshake("expected an open packet")),
    }
}

/// The sending half of a websocket transport.
#[derive(Debug)]
pub struct WsTx {
    inner: SplitSink<WsStream, Message>,
    protocol: ProtocolVersion,
}

impl WsTx {
    /// Send packets, the websocket is flushed once all of them are fed.
    pub async fn send(&mut self, packets: PacketBuf) -> Result<(), Error> {
        for packet in packets {
            let msg = match packet {
                Packet::Binary(data) if self.protocol == ProtocolVersion::V4 => {
                    Message::Binary(data)
                }
                Packet::Binary(data) | Packet::BinaryV3(data) => {
                    // v3 protocol requires the packet type as the first byte
                    let mut buf = Vec::with_capacity(data.len() + 1);
                    buf.push(0x04);
                    buf.extend_from_slice(&data);
                    Message::Binary(Bytes::from(buf))
                }
                packet => Message::Text(String::from(packet).into()),
            };
            self.inner.feed(msg).await?;
        }
        self.inner.flush().await?;
        Ok(())
    }
}

/// The receiving half of a websocket transport.
#[derive(Debug)]
pub struct WsRx {
    inner: SplitStream<WsStream>,
    protocol: ProtocolVersion,
}

impl WsRx {
    /// Wait for the next frame.
    ///
    /// Invalid text frames are dropped. A close frame is mapped to a [`Packet::Close`].
    pub async fn recv(&mut self) -> Result<PacketBuf, Error> {
        loop {
            let msg = match self.inner.next().await {
                Some(msg) => msg?,
                None => return Err(Error::TransportClosed),
            };
            let packet = match msg {
                // SAFETY: tungstenite checks that text frames are valid utf8
                Message::Text(msg) => match Packet::try_from(unsafe {
                    Str::from_bytes_unchecked(msg.into())
                }) {
                    Ok(packet) => packet,
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("dropping invalid websocket packet: {_e}");
                        continue;
                    }
                },
                Message::Binary(data) if self.protocol == ProtocolVersion::V3 => {
                    // The first byte is the message type, which we don't need.
                    Packet::BinaryV3(data.slice(1.min(data.len())..))
                }
                Message::Binary(data) => Packet::Binary(data),
                Message::Close(_) => Packet::Close,
                _ => continue,
            };
            return Ok(smallvec![packet]);
        }
    }
}
