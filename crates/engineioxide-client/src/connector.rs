//! ## A [`Connector`] opens the transports of an engine.io session.
//!
//! The [`DefaultConnector`] connects to a real server over http long-polling and websocket.
//! Other implementations can be provided to run a session over any medium.
use engineioxide_core::{OpenPacket, Sid};
use futures_util::future::BoxFuture;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::{
    config::{EngineIoClientConfig, TransportPolicy},
    errors::Error,
    transport::{TransportRx, TransportTx, polling, ws},
};

/// The result of a successful handshake.
#[derive(Debug)]
pub struct Opened {
    /// The open packet sent by the server.
    pub open: OpenPacket,
    /// The sending half of the transport.
    pub tx: TransportTx,
    /// The receiving half of the transport.
    pub rx: TransportRx,
}

/// Opens transports to an engine.io server.
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake of a new session with the transport chosen by the
    /// [`TransportPolicy`] of the config.
    fn open<'a>(&'a self, config: &'a EngineIoClientConfig) -> BoxFuture<'a, Result<Opened, Error>>;

    /// Open the websocket used to upgrade the session `sid`.
    fn open_upgrade<'a>(
        &'a self,
        config: &'a EngineIoClientConfig,
        sid: &'a Sid,
    ) -> BoxFuture<'a, Result<(TransportTx, TransportRx), Error>>;
}

/// The network [`Connector`], it uses a `hyper` client for http long-polling
/// and `tokio-tungstenite` for websockets.
///
/// Secure endpoints (`https` and `wss`) are verified against the webpki root certificates.
#[derive(Debug, Clone)]
pub struct DefaultConnector {
    client: polling::HttpClient,
}

impl Default for DefaultConnector {
    fn default() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(https_connector()),
        }
    }
}

fn https_connector() -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build()
}

impl Connector for DefaultConnector {
    fn open<'a>(&'a self, config: &'a EngineIoClientConfig) -> BoxFuture<'a, Result<Opened, Error>> {
        Box::pin(async move {
            match config.transport {
                TransportPolicy::Auto | TransportPolicy::PollingOnly => {
                    let (open, tx, rx) = polling::handshake(self.client.clone(), config).await?;
                    Ok(Opened {
                        open,
                        tx: TransportTx::Polling(tx),
                        rx: TransportRx::Polling(rx),
                    })
                }
                TransportPolicy::WebsocketOnly => {
                    let (open, tx, rx) = ws::handshake(config).await?;
                    Ok(Opened {
                        open,
                        tx: TransportTx::Websocket(tx),
                        rx: TransportRx::Websocket(rx),
                    })
                }
            }
        })
    }

    fn open_upgrade<'a>(
        &'a self,
        config: &'a EngineIoClientConfig,
        sid: &'a Sid,
    ) -> BoxFuture<'a, Result<(TransportTx, TransportRx), Error>> {
        Box::pin(async move {
            let (tx, rx) = ws::connect(config, Some(sid)).await?;
            Ok((TransportTx::Websocket(tx), TransportRx::Websocket(rx)))
        })
    }
}

#[cfg(any(test, feature = "__test_harness"))]
pub use piped::{PipedConnector, PipedSession};

#[cfg(any(test, feature = "__test_harness"))]
mod piped {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use engineioxide_core::{Packet, TransportType};
    use tokio::sync::mpsc;

    use super::*;

    /// The server side of a transport opened by a [`PipedConnector`].
    #[derive(Debug)]
    pub struct PipedSession {
        /// The transport the client asked for.
        pub transport: TransportType,
        /// Send packets to the client.
        pub tx: mpsc::Sender<Packet>,
        /// Receive packets sent by the client.
        pub rx: mpsc::Receiver<Packet>,
    }

    /// A [`Connector`] backed by in memory channels.
    ///
    /// The handshake is answered with the configured open packet and each opened
    /// transport is forwarded to the test as a [`PipedSession`].
    #[derive(Debug)]
    pub struct PipedConnector {
        open: Mutex<OpenPacket>,
        sessions: mpsc::UnboundedSender<PipedSession>,
        refuse: AtomicUsize,
    }

    impl PipedConnector {
        /// Create a connector answering handshakes with `open`.
        pub fn new(open: OpenPacket) -> (Arc<Self>, mpsc::UnboundedReceiver<PipedSession>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let connector = Self {
                open: Mutex::new(open),
                sessions: tx,
                refuse: AtomicUsize::new(0),
            };
            (Arc::new(connector), rx)
        }

        /// Refuse the next `n` handshakes.
        pub fn refuse_next(&self, n: usize) {
            self.refuse.store(n, Ordering::SeqCst);
        }

        /// Change the open packet sent for the next handshakes.
        pub fn set_open(&self, open: OpenPacket) {
            *self.open.lock().unwrap() = open;
        }

        fn pipe(&self, transport: TransportType) -> Result<(TransportTx, TransportRx), Error> {
            let (client_tx, server_rx) = mpsc::channel(1024);
            let (server_tx, client_rx) = mpsc::channel(1024);
            let session = PipedSession {
                transport,
                tx: server_tx,
                rx: server_rx,
            };
            self.sessions
                .send(session)
                .map_err(|_| Error::Handshake("connection refused"))?;
            Ok((
                TransportTx::Piped(client_tx, transport),
                TransportRx::Piped(client_rx, transport),
            ))
        }
    }

    impl Connector for PipedConnector {
        fn open<'a>(
            &'a self,
            config: &'a EngineIoClientConfig,
        ) -> BoxFuture<'a, Result<Opened, Error>> {
            Box::pin(async move {
                let refused = self
                    .refuse
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if refused {
                    return Err(Error::Handshake("connection refused"));
                }
                let transport = match config.transport {
                    TransportPolicy::WebsocketOnly => TransportType::Websocket,
                    _ => TransportType::Polling,
                };
                let (tx, rx) = self.pipe(transport)?;
                let open = self.open.lock().unwrap().clone();
                Ok(Opened { open, tx, rx })
            })
        }

        fn open_upgrade<'a>(
            &'a self,
            _config: &'a EngineIoClientConfig,
            _sid: &'a Sid,
        ) -> BoxFuture<'a, Result<(TransportTx, TransportRx), Error>> {
            Box::pin(async move { self.pipe(TransportType::Websocket) })
        }
    }
}
