//! ## A [`Socket`] represents an engine.io session with a server
//!
//! It can be used to :
//! * Emit binary or string data
//! * Get the session id and the handshake data sent by the server
//! * Close the session
//!
//! A session is made of several tasks:
//! * A reader task receiving packets from the transport and forwarding them to the
//!   [`EngineIoClientHandler`].
//! * A writer task, the only owner of the sending half of the transport.
//! * A heartbeat task checking that the connection is still alive.
//! * An upgrade task, probing a websocket when the server allows it.
use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use engineioxide_core::{
    OpenPacket, Packet, PacketBuf, ProtocolVersion, Sid, Str, TransportType,
};
use smallvec::{SmallVec, smallvec};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::{
    config::{EngineIoClientConfig, TransportPolicy},
    connector::{Connector, Opened},
    errors::Error,
    handler::EngineIoClientHandler,
    transport::{TransportRx, TransportTx},
};

/// A [`DisconnectReason`] represents the reason why a [`Socket`] was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server gracefully closed the connection
    TransportClose,
    /// An error occurred in the transport layer
    /// (e.g. the server closed the connection without sending a close packet)
    TransportError,
    /// The server did not respond to the heartbeat
    HeartbeatTimeout,
    /// A packet sent by the server could not be parsed
    PacketParsingError,
    /// The session was closed by the client
    ClientClose,
}

impl From<&Error> for DisconnectReason {
    fn from(err: &Error) -> Self {
        match err {
            Error::TransportClosed => DisconnectReason::TransportClose,
            Error::HeartbeatTimeout => DisconnectReason::HeartbeatTimeout,
            Error::PacketParse(_) => DisconnectReason::PacketParsingError,
            _ => DisconnectReason::TransportError,
        }
    }
}

/// A permit to emit a message to the server.
/// A permit holds a place in the internal channel to send one packet to the server.
pub struct Permit<'a> {
    inner: mpsc::Permit<'a, PacketBuf>,
    protocol: ProtocolVersion,
}
impl Permit<'_> {
    /// Consume the permit and emit a message to the server.
    #[inline]
    pub fn emit(self, msg: Str) {
        self.inner.send(smallvec![Packet::Message(msg)]);
    }
    /// Consume the permit and emit a binary message to the server.
    #[inline]
    pub fn emit_binary(self, data: Bytes) {
        let packet = binary_packet(self.protocol, data);
        self.inner.send(smallvec![packet]);
    }

    /// Consume the permit and emit a message with multiple binary data to the server.
    ///
    /// It can be used to ensure atomicity when sending a string packet with adjacent binary packets.
    pub fn emit_many(self, msg: Str, data: impl IntoIterator<Item = Bytes>) {
        let data = data.into_iter();
        let mut packets = SmallVec::with_capacity(data.size_hint().0 + 1);
        packets.push(Packet::Message(msg));
        for d in data {
            packets.push(binary_packet(self.protocol, d));
        }
        self.inner.send(packets);
    }
}

fn binary_packet(protocol: ProtocolVersion, data: Bytes) -> Packet {
    match protocol {
        ProtocolVersion::V3 => Packet::BinaryV3(data),
        ProtocolVersion::V4 => Packet::Binary(data),
    }
}

/// Channels and transports consumed by the session tasks when they start.
struct SessionIo {
    tx: TransportTx,
    rx: TransportRx,
    internal_rx: mpsc::Receiver<PacketBuf>,
    heartbeat_rx: mpsc::Receiver<()>,
}

/// A [`Socket`] represents an engine.io session with a server.
/// It is agnostic to the [`TransportType`].
pub struct Socket<H: EngineIoClientHandler> {
    /// The handshake data sent by the server
    open: OpenPacket,

    /// The protocol version used by the session
    protocol: ProtocolVersion,

    /// The transport type represented as a bitfield
    transport: AtomicU8,

    /// Whether the session is currently upgrading to a websocket.
    /// The heartbeat is paused while upgrading.
    upgrading: AtomicBool,

    closed: AtomicBool,

    config: EngineIoClientConfig,
    connector: Arc<dyn Connector>,
    handler: Arc<H>,

    /// Channel to send [`PacketBuf`] to the writer task
    internal_tx: mpsc::Sender<PacketBuf>,

    /// Notify the heartbeat task that a ping (v4) or a pong (v3) was received
    heartbeat_tx: mpsc::Sender<()>,

    io: Mutex<Option<SessionIo>>,
    /// Handles of the reader, heartbeat and upgrade tasks
    handles: Mutex<Vec<JoinHandle<()>>>,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<H: EngineIoClientHandler> Socket<H> {
    /// Open a new session with the given [`Connector`] and start it.
    ///
    /// Fails with [`Error::HandshakeTimeout`] if the handshake is not
    /// completed within the configured `connect_timeout`.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        config: EngineIoClientConfig,
        handler: Arc<H>,
    ) -> Result<Arc<Self>, Error> {
        let opened = tokio::time::timeout(config.connect_timeout, connector.open(&config))
            .await
            .map_err(|_| Error::HandshakeTimeout)??;
        let socket = Self::new(opened, config, connector, handler);
        socket.start();
        Ok(socket)
    }

    /// Create a session from an opened transport. No task is running until
    /// [`start`](Self::start) is called, so the socket can be registered before any
    /// handler call is made.
    pub fn new(
        opened: Opened,
        config: EngineIoClientConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<H>,
    ) -> Arc<Self> {
        let (internal_tx, internal_rx) = mpsc::channel(config.max_buffer_size);
        let (heartbeat_tx, heartbeat_rx) = mpsc::channel(1);

        #[cfg(feature = "tracing")]
        tracing::debug!(sid = ?opened.open.sid, transport = ?opened.tx.transport_type(), "new session");

        let socket = Socket {
            protocol: config.protocol,
            transport: AtomicU8::new(opened.tx.transport_type() as u8),
            upgrading: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            open: opened.open,
            config,
            connector,
            handler,
            internal_tx,
            heartbeat_tx,
            io: Mutex::new(Some(SessionIo {
                tx: opened.tx,
                rx: opened.rx,
                internal_rx,
                heartbeat_rx,
            })),
            handles: Mutex::new(Vec::new()),
            writer_handle: Mutex::new(None),
        };
        Arc::new(socket)
    }

    /// Spawn the session tasks. Calling it more than once has no effect.
    pub fn start(self: &Arc<Self>) {
        if self.is_closed() {
            return;
        }
        let Some(io) = self.io.lock().unwrap().take() else {
            return;
        };
        let mut handles = self.handles.lock().unwrap();
        let (writer_upgrade_tx, writer_upgrade_rx) = mpsc::channel(1);
        let (reader_upgrade_tx, reader_upgrade_rx) = mpsc::channel(1);

        let writer = tokio::spawn(self.clone().writer_job(io.tx, io.internal_rx, writer_upgrade_rx));
        self.writer_handle.lock().unwrap().replace(writer);

        handles.push(tokio::spawn(self.clone().reader_job(io.rx, reader_upgrade_rx)));
        handles.push(tokio::spawn(self.clone().heartbeat_job(io.heartbeat_rx)));
        if self.can_upgrade() {
            handles.push(tokio::spawn(
                self.clone()
                    .upgrade_job(writer_upgrade_tx, reader_upgrade_tx),
            ));
        }
    }

    fn can_upgrade(&self) -> bool {
        self.config.transport == TransportPolicy::Auto
            && self.transport_type() == TransportType::Polling
            && self.open.can_upgrade_to_ws()
    }

    /// The session id
    pub fn id(&self) -> &Sid {
        &self.open.sid
    }

    /// The handshake data sent by the server
    pub fn open_packet(&self) -> &OpenPacket {
        &self.open
    }

    /// The protocol version used by the session
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Returns the current [`TransportType`] of the [`Socket`]
    pub fn transport_type(&self) -> TransportType {
        TransportType::try_from(self.transport.load(Ordering::Relaxed))
            .unwrap_or(TransportType::Polling)
    }

    fn is_upgrading(&self) -> bool {
        self.upgrading.load(Ordering::Relaxed)
    }

    fn send(&self, packet: Packet) -> Result<(), TrySendError<()>> {
        if self.is_closed() {
            return Err(TrySendError::Closed(()));
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(sid = ?self.id(), "sending packet: {:?}", packet);
        self.internal_tx
            .try_send(smallvec![packet])
            .map_err(|e| match e {
                TrySendError::Full(_) => TrySendError::Full(()),
                TrySendError::Closed(_) => TrySendError::Closed(()),
            })
    }

    /// Reserve a permit to emit a message and ensure that there is enough
    /// space in the internal chan.
    ///
    /// If the internal chan is full, the function will return a [`TrySendError::Full`] error.
    /// If the socket is closed, the function will return a [`TrySendError::Closed`] error.
    #[inline]
    pub fn reserve(&self) -> Result<Permit<'_>, TrySendError<()>> {
        if self.is_closed() {
            return Err(TrySendError::Closed(()));
        }
        let permit = self.internal_tx.try_reserve()?;
        Ok(Permit {
            inner: permit,
            protocol: self.protocol,
        })
    }

    /// Emits a message to the server.
    ///
    /// ⚠️ If the buffer is full or the socket is closed, an error will be returned with the original data
    pub fn emit(&self, msg: impl Into<Str>) -> Result<(), TrySendError<Str>> {
        let msg = msg.into();
        self.send(Packet::Message(msg.clone())).map_err(|e| match e {
            TrySendError::Full(()) => TrySendError::Full(msg),
            TrySendError::Closed(()) => TrySendError::Closed(msg),
        })
    }

    /// Emits a binary message to the server.
    ///
    /// If the transport is in polling mode, the message is sent **encoded in base64**.
    ///
    /// ⚠️ If the buffer is full or the socket is closed, an error will be returned with the original data
    pub fn emit_binary<B: Into<Bytes>>(&self, data: B) -> Result<(), TrySendError<Bytes>> {
        let data = data.into();
        self.send(binary_packet(self.protocol, data.clone()))
            .map_err(|e| match e {
                TrySendError::Full(()) => TrySendError::Full(data),
                TrySendError::Closed(()) => TrySendError::Closed(data),
            })
    }

    /// Closes the session and notifies the handler with the given reason.
    ///
    /// With [`DisconnectReason::ClientClose`] a close packet is sent to the server first.
    /// Only the first call has an effect.
    pub fn close(&self, reason: DisconnectReason) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(sid = ?self.id(), ?reason, "closing session");

        for handle in self.handles.lock().unwrap().drain(..) {
            handle.abort();
        }
        // The session was never started
        self.io.lock().unwrap().take();

        let writer = self.writer_handle.lock().unwrap().take();
        let closing = reason == DisconnectReason::ClientClose
            && self.internal_tx.try_send(smallvec![Packet::Close]).is_ok();
        // The writer stops by itself once the close packet is sent
        if !closing {
            if let Some(writer) = writer {
                writer.abort();
            }
        }
        self.handler.on_disconnect(reason);
    }

    /// Returns true if the session is closed.
    /// It means that no more packets can be sent to the server
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for the writer task to be fully stopped
    pub async fn closed(&self) {
        self.internal_tx.closed().await
    }

    async fn writer_job(
        self: Arc<Self>,
        mut tx: TransportTx,
        mut internal_rx: mpsc::Receiver<PacketBuf>,
        mut upgrade_rx: mpsc::Receiver<TransportTx>,
    ) {
        let mut upgrade_done = false;
        loop {
            tokio::select! {
                biased;
                ws_tx = upgrade_rx.recv(), if !upgrade_done => {
                    upgrade_done = true;
                    let Some(mut ws_tx) = ws_tx else { continue };
                    if let Err(e) = ws_tx.send(smallvec![Packet::Upgrade]).await {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(sid = ?self.id(), "error sending upgrade packet: {e}");
                        self.close(DisconnectReason::from(&e));
                        return;
                    }
                    tx = ws_tx;
                    self.transport.store(TransportType::Websocket as u8, Ordering::Relaxed);
                    self.upgrading.store(false, Ordering::Relaxed);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(sid = ?self.id(), "session upgraded to websocket");
                    self.handler.on_upgrade(TransportType::Websocket);
                }
                packets = internal_rx.recv() => {
                    let Some(packets) = packets else { return };
                    let is_close = packets.iter().any(|p| matches!(p, Packet::Close));
                    if let Err(e) = tx.send(packets).await {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(sid = ?self.id(), "error sending packets: {e}");
                        self.close(DisconnectReason::from(&e));
                        return;
                    }
                    if is_close {
                        return;
                    }
                }
            }
        }
    }

    async fn reader_job(
        self: Arc<Self>,
        mut rx: TransportRx,
        mut upgrade_rx: mpsc::Receiver<TransportRx>,
    ) {
        loop {
            let packets = match rx.recv().await {
                Ok(packets) => packets,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(sid = ?self.id(), "error receiving packets: {e}");
                    self.close(DisconnectReason::from(&e));
                    return;
                }
            };
            for packet in packets {
                if let Err(reason) = self.handle_packet(packet) {
                    self.close(reason);
                    return;
                }
            }
            // The polling request in flight is now done, switch to the upgraded transport.
            if let Ok(ws_rx) = upgrade_rx.try_recv() {
                rx = ws_rx;
            }
        }
    }

    fn handle_packet(&self, packet: Packet) -> Result<(), DisconnectReason> {
        #[cfg(feature = "tracing")]
        tracing::trace!(sid = ?self.id(), "received packet: {:?}", packet);
        match packet {
            Packet::Message(msg) => self.handler.on_message(msg),
            Packet::Binary(data) | Packet::BinaryV3(data) => self.handler.on_binary(data),
            Packet::Ping if self.protocol == ProtocolVersion::V4 => {
                self.heartbeat_tx.try_send(()).ok();
                self.handler.on_ping();
                if self.send(Packet::Pong).is_ok() {
                    self.handler.on_pong();
                }
            }
            Packet::Pong if self.protocol == ProtocolVersion::V3 => {
                self.heartbeat_tx.try_send(()).ok();
                self.handler.on_pong();
            }
            Packet::Close => return Err(DisconnectReason::TransportClose),
            Packet::Noop => (),
            _packet => {
                #[cfg(feature = "tracing")]
                tracing::debug!(sid = ?self.id(), "unexpected packet: {:?}", _packet);
            }
        }
        Ok(())
    }

    async fn heartbeat_job(self: Arc<Self>, heartbeat_rx: mpsc::Receiver<()>) {
        let interval = Duration::from_millis(self.open.ping_interval);
        let timeout = Duration::from_millis(self.open.ping_timeout);
        let res = match self.protocol {
            ProtocolVersion::V3 => self.heartbeat_job_v3(heartbeat_rx, interval, timeout).await,
            ProtocolVersion::V4 => self.heartbeat_job_v4(heartbeat_rx, interval, timeout).await,
        };
        if let Err(_e) = res {
            #[cfg(feature = "tracing")]
            tracing::debug!(sid = ?self.id(), "heartbeat error: {_e}");
            self.close(DisconnectReason::HeartbeatTimeout);
        }
    }

    /// The server sends a ping every `interval`. If no ping is received within
    /// `interval + timeout`, the session is considered dead.
    async fn heartbeat_job_v4(
        &self,
        mut heartbeat_rx: mpsc::Receiver<()>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sid = ?self.id(), "heartbeat receiver routine started");

        loop {
            match tokio::time::timeout(interval + timeout, heartbeat_rx.recv()).await {
                Ok(Some(())) => (),
                Err(_) if self.is_upgrading() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(sid = ?self.id(), "heartbeat paused due to upgrade, skipping timeout");
                    continue;
                }
                _ => return Err(Error::HeartbeatTimeout),
            }
        }
    }

    /// A ping is sent every `interval` and the server is expected to respond within `timeout`.
    async fn heartbeat_job_v3(
        &self,
        mut heartbeat_rx: mpsc::Receiver<()>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sid = ?self.id(), "heartbeat sender routine started");

        let mut interval_tick = tokio::time::interval(interval);
        interval_tick.tick().await;
        loop {
            interval_tick.tick().await;
            if self.is_upgrading() {
                #[cfg(feature = "tracing")]
                tracing::debug!(sid = ?self.id(), "heartbeat paused due to upgrade, skipping");
                continue;
            }
            // Drop any pong that came after the previous timeout
            heartbeat_rx.try_recv().ok();

            #[cfg(feature = "tracing")]
            tracing::trace!(sid = ?self.id(), "emitting ping");
            self.send(Packet::Ping).map_err(|_| Error::HeartbeatTimeout)?;
            self.handler.on_ping();

            tokio::time::timeout(timeout, heartbeat_rx.recv())
                .await
                .map_err(|_| Error::HeartbeatTimeout)?
                .ok_or(Error::HeartbeatTimeout)?;

            #[cfg(feature = "tracing")]
            tracing::trace!(sid = ?self.id(), "pong received");
        }
    }

    async fn upgrade_job(
        self: Arc<Self>,
        writer_tx: mpsc::Sender<TransportTx>,
        reader_tx: mpsc::Sender<TransportRx>,
    ) {
        if let Err(_e) = self.upgrade(writer_tx, reader_tx).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(sid = ?self.id(), "upgrade failed, staying on polling: {_e}");
            self.upgrading.store(false, Ordering::Relaxed);
        }
    }

    /// Probe a websocket and hand it to the reader and then to the writer.
    ///
    /// The writer sends the upgrade packet once it owns the websocket. The reader switches
    /// when its in-flight polling request returns, which the server forces with a noop packet.
    async fn upgrade(
        &self,
        writer_tx: mpsc::Sender<TransportTx>,
        reader_tx: mpsc::Sender<TransportRx>,
    ) -> Result<(), Error> {
        let (mut tx, mut rx) = self.connector.open_upgrade(&self.config, self.id()).await?;
        self.upgrading.store(true, Ordering::Relaxed);

        tx.send(smallvec![Packet::PingUpgrade]).await?;
        let timeout = Duration::from_millis(self.open.ping_timeout);
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Ok(packets)) if packets.first() == Some(&Packet::PongUpgrade) => (),
            Ok(Err(e)) => return Err(e),
            _ => return Err(Error::Upgrade("invalid probe response")),
        }

        reader_tx
            .send(rx)
            .await
            .map_err(|_| Error::Upgrade("session closed"))?;
        writer_tx
            .send(tx)
            .await
            .map_err(|_| Error::Upgrade("session closed"))?;
        Ok(())
    }
}

impl<H: EngineIoClientHandler> fmt::Debug for Socket<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("sid", self.id())
            .field("protocol", &self.protocol)
            .field("transport", &self.transport_type())
            .field("upgrading", &self.upgrading)
            .field("closed", &self.closed)
            .field("internal_tx", &self.internal_tx)
            .finish()
    }
}
