//! Http long-polling transport.
//!
//! Packets are read with GET requests and written with POST requests on the engine.io
//! endpoint. Each request body is a payload of packets encoded according to the
//! protocol version (see [`engineioxide_core::payload`]).
use std::{collections::VecDeque, sync::Arc, time::Duration};

use bytes::Bytes;
use engineioxide_core::{
    OpenPacket, Packet, PacketBuf, ProtocolVersion, Str, TransportType, payload,
};
use http::{HeaderMap, Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use url::Url;

use crate::{config::EngineIoClientConfig, errors::Error};

/// The http client used by the polling transport, for `http` and `https` endpoints.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// The maximum size of a payload received from the server.
const MAX_RECV_PAYLOAD: u64 = 100_000_000;

/// State shared by the two halves of a polling transport.
#[derive(Debug)]
struct PollingClient {
    client: HttpClient,
    url: Url,
    headers: HeaderMap,
    protocol: ProtocolVersion,
}

impl PollingClient {
    async fn request(&self, method: Method, body: Bytes) -> Result<Str, Error> {
        let mut req = Request::builder().method(method).uri(self.url.as_str());
        if let Some(headers) = req.headers_mut() {
            headers.extend(self.headers.clone());
        }
        let req = req.body(Full::new(body))?;

        let res = self.client.request(req).await?;
        if !res.status().is_success() {
            return Err(Error::HttpStatus(res.status()));
        }
        let body = res.into_body().collect().await?.to_bytes();
        Ok(Str::from_utf8(body).map_err(engineioxide_core::PacketParseError::from)?)
    }

    /// Decode a payload, invalid packets are dropped.
    fn decode(&self, data: Str) -> impl Iterator<Item = Packet> {
        payload::decode(data, self.protocol, MAX_RECV_PAYLOAD).filter_map(|packet| match packet {
            Ok(packet) => Some(packet),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("dropping invalid polling packet: {_e}");
                None
            }
        })
    }
}

/// Perform the engine.io handshake with a GET request.
///
/// The first packet of the response must be an open packet. Other packets of the same
/// payload are kept and returned by the first [`PollingRx::recv`] call.
pub async fn handshake(
    client: HttpClient,
    config: &EngineIoClientConfig,
) -> Result<(OpenPacket, PollingTx, PollingRx), Error> {
    let url = config.endpoint(TransportType::Polling, None)?;
    let mut polling = PollingClient {
        client,
        url,
        headers: config.headers.clone(),
        protocol: config.protocol,
    };
    let data = polling.request(Method::GET, Bytes::new()).await?;
    let mut packets = polling.decode(data);
    let open = match packets.next() {
        Some(Packet::Open(open)) => open,
        _ => return Err(Error::Handshake("expected an open packet")),
    };
    let pending: VecDeque<Packet> = packets.collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(sid = ?open.sid, "polling handshake done");

    polling.url = config.endpoint(TransportType::Polling, Some(&open.sid))?;
    let timeout = polling_timeout(config, &open);
    let max_payload = open.max_payload;
    let polling = Arc::new(polling);
    let tx = PollingTx {
        inner: polling.clone(),
        max_payload,
    };
    let rx = PollingRx {
        inner: polling,
        pending,
        timeout,
    };
    Ok((open, tx, rx))
}

fn polling_timeout(config: &EngineIoClientConfig, open: &OpenPacket) -> Duration {
    config
        .polling_timeout
        .unwrap_or_else(|| Duration::from_millis(open.ping_interval + open.ping_timeout))
}

/// The sending half of a polling transport.
#[derive(Debug)]
pub struct PollingTx {
    inner: Arc<PollingClient>,
    max_payload: u64,
}

impl PollingTx {
    /// Send packets in POST requests.
    ///
    /// Packets are split in several requests if their encoded size exceeds
    /// the `maxPayload` advertised by the server.
    pub async fn send(&mut self, packets: PacketBuf) -> Result<(), Error> {
        let mut chunk = Vec::with_capacity(packets.len());
        let mut size = 0;
        for packet in packets {
            // the separator or the v3 length prefix
            let len = packet.get_size_hint(true) + 1;
            if !chunk.is_empty() && (size + len) as u64 > self.max_payload {
                self.post(std::mem::take(&mut chunk)).await?;
                size = 0;
            }
            size += len;
            chunk.push(packet);
        }
        if !chunk.is_empty() {
            self.post(chunk).await?;
        }
        Ok(())
    }

    async fn post(&self, packets: Vec<Packet>) -> Result<(), Error> {
        let body = payload::encode(packets, self.inner.protocol);
        #[cfg(feature = "tracing")]
        tracing::trace!("sending polling payload: {body:?}");
        self.inner.request(Method::POST, Bytes::from(body)).await?;
        Ok(())
    }
}

/// The receiving half of a polling transport.
#[derive(Debug)]
pub struct PollingRx {
    inner: Arc<PollingClient>,
    pending: VecDeque<Packet>,
    timeout: Duration,
}

impl PollingRx {
    /// Wait for the next payload with a GET request.
    ///
    /// If the server does not answer before the polling timeout, an empty batch is returned.
    pub async fn recv(&mut self) -> Result<PacketBuf, Error> {
        if !self.pending.is_empty() {
            return Ok(self.pending.drain(..).collect());
        }

        let data =
            match tokio::time::timeout(self.timeout, self.inner.request(Method::GET, Bytes::new()))
                .await
            {
                Ok(data) => data?,
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("polling request timed out");
                    return Ok(PacketBuf::new());
                }
            };
        Ok(self.inner.decode(data).collect())
    }
}
