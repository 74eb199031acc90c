//! A [`Socket`] is the client end of a socket.io namespace.
//!
//! Every namespace socket of a [`Client`](crate::Client) shares the same engine.io session.
//! A socket buffers the packets emitted before the namespace is connected and sends them
//! in order once the server accepted the connection.
use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard, RwLock},
    time::Duration,
};

use engineioxide_client::{DisconnectReason as EIoDisconnectReason, ProtocolVersion};
use serde::Serialize;
use socketioxide_core::{
    PayloadValue, Sid, Str,
    packet::{ConnectPacket, Packet, PacketData},
};

use crate::{
    ack::{AckResponse, PendingAcks},
    client::ClientInner,
    errors::{AckError, Error, SendError, SocketError},
    handler::{AckSender, Event, Handlers},
    state::NsStatus,
};

/// All the possible reasons for a [`Socket`] to be disconnected from a namespace.
///
/// It can be used as an enum or as a string with the [`Display`](fmt::Display) trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server gracefully closed the connection
    TransportClose,

    /// The connection was closed (example: the user has lost connection, or the network was changed from WiFi to 4G)
    TransportError,

    /// The server did not send a PING packet in time (v4), or did not answer to a PING packet (v3)
    HeartbeatTimeout,

    /// The server sent a packet that could not be parsed correctly
    PacketParsingError,

    /// The server disconnected the socket from the namespace
    ServerNSDisconnect,

    /// The socket was disconnected from the namespace with [`Socket::disconnect`]
    ClientNSDisconnect,

    /// The client was closed with [`Client::disconnect`](crate::Client::disconnect)
    ClientDisconnect,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DisconnectReason::*;
        let str: &'static str = match self {
            TransportClose => "server gracefully closed the connection",
            TransportError => "the connection was abruptly closed",
            HeartbeatTimeout => "server did not answer the heartbeat in time",
            PacketParsingError => "server sent a packet that could not be parsed",
            ServerNSDisconnect => "socket was forcefully disconnected from the namespace",
            ClientNSDisconnect => "client has manually disconnected the socket from the namespace",
            ClientDisconnect => "client has been closed",
        };
        f.write_str(str)
    }
}

impl From<EIoDisconnectReason> for DisconnectReason {
    fn from(reason: EIoDisconnectReason) -> Self {
        use DisconnectReason::*;
        match reason {
            EIoDisconnectReason::TransportClose => TransportClose,
            EIoDisconnectReason::TransportError => TransportError,
            EIoDisconnectReason::HeartbeatTimeout => HeartbeatTimeout,
            EIoDisconnectReason::PacketParsingError => PacketParsingError,
            EIoDisconnectReason::ClientClose => ClientDisconnect,
        }
    }
}

#[derive(Debug, Default)]
struct NsState {
    status: NsStatus,
    /// The socket id given by the server
    id: Option<Sid>,
    /// The namespace should be connected when the session is open
    active: bool,
    /// The namespace was disconnected with [`Socket::disconnect`]
    closed: bool,
    /// Packets emitted before the namespace is connected
    buffer: VecDeque<Packet>,
}

/// The state of a namespace, owned by the client.
pub(crate) struct NsSocket {
    ns: Str,
    state: Mutex<NsState>,
    handlers: RwLock<Handlers>,
    acks: Arc<PendingAcks>,
}

impl NsSocket {
    pub fn new(ns: Str) -> Self {
        Self {
            ns,
            state: Mutex::new(NsState {
                active: true,
                ..Default::default()
            }),
            handlers: RwLock::new(Handlers::default()),
            acks: Arc::new(PendingAcks::default()),
        }
    }
}

/// A socket connected to a namespace of the server.
///
/// It is cheap to clone, every clone refers to the same namespace socket.
/// Sockets are created with [`Client::socket`](crate::Client::socket)
/// and [`Client::of`](crate::Client::of).
#[derive(Clone)]
pub struct Socket {
    inner: Arc<NsSocket>,
    client: Arc<ClientInner>,
}

impl Socket {
    pub(crate) fn new(inner: Arc<NsSocket>, client: Arc<ClientInner>) -> Self {
        Self { inner, client }
    }

    /// The namespace of this socket
    pub fn ns(&self) -> &Str {
        &self.inner.ns
    }

    /// The socket id given by the server when the namespace connection was accepted.
    pub fn id(&self) -> Option<Sid> {
        self.inner.state.lock().unwrap().id.clone()
    }

    /// The current [`NsStatus`] of the socket
    pub fn state(&self) -> NsStatus {
        self.inner.state.lock().unwrap().status
    }

    /// Returns true if the namespace is connected
    pub fn is_connected(&self) -> bool {
        self.state() == NsStatus::Connected
    }

    /// Connect the socket to its namespace.
    ///
    /// Namespace sockets are connected by default when the client session is open, it is only
    /// needed after a [`disconnect`](Self::disconnect), a server disconnection or a refused connection.
    /// If the client is not connected yet, the namespace will be connected with the session.
    pub fn connect(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.closed = false;
        state.active = true;
        if state.status == NsStatus::Disconnected && self.client.is_session_open() {
            self.send_connect(&mut state);
        }
    }

    /// Disconnect the socket from its namespace.
    ///
    /// Its pending acknowledgements are cancelled and its emit buffer is dropped.
    /// Emitting on a disconnected socket returns [`SocketError::Closed`] until it is connected again.
    /// Calling it more than once has no effect.
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.closed {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(ns = ?self.inner.ns, "disconnecting socket from namespace");

        state.closed = true;
        state.active = false;
        state.buffer.clear();
        state.id = None;
        let status = std::mem::take(&mut state.status);
        if status != NsStatus::Disconnected {
            self.client.send(Packet::disconnect(self.inner.ns.clone())).ok();
        }
        drop(state);

        self.inner.acks.cancel(|_| false);
        if status == NsStatus::Connected {
            self.dispatch_disconnect(DisconnectReason::ClientNSDisconnect);
        }
    }

    // ==== Emitting ====

    /// Emit an event to the server with the given arguments.
    ///
    /// If the namespace is not connected yet, the packet is buffered and sent once the
    /// connection is accepted.
    ///
    /// # Errors
    /// * [`SocketError::Closed`] if the socket was disconnected with [`Socket::disconnect`].
    /// * [`SocketError::BufferFull`] if the namespace is not connected and its buffer is full.
    /// * [`SocketError::InternalChannelFull`] if the engine.io session cannot queue more packets.
    ///
    /// # Example
    /// ```no_run
    /// # use socketioxide_client::{Client, PayloadValue};
    /// # fn doc(client: Client) {
    /// let socket = client.of("/chat");
    /// socket.emit("message", vec!["hello".into(), 42.into()]).ok();
    /// # }
    /// ```
    pub fn emit(&self, event: impl Into<Str>, args: Vec<PayloadValue>) -> Result<(), SocketError> {
        self.send(Packet::event(self.inner.ns.clone(), event, args))
    }

    /// Serialize `data` and emit it as the single argument of an event.
    ///
    /// # Errors
    /// * [`SendError::Serialize`] if the data cannot be serialized.
    /// * [`SendError::Socket`] see [`Socket::emit`].
    pub fn emit_value<T: ?Sized + Serialize>(
        &self,
        event: impl Into<Str>,
        data: &T,
    ) -> Result<(), SendError> {
        let value = PayloadValue::from_serialize(data)?;
        self.emit(event, vec![value])?;
        Ok(())
    }

    /// Emit an event and wait for the server acknowledgement.
    ///
    /// The `timeout` defaults to the [`ack_timeout`](crate::ClientBuilder::ack_timeout)
    /// of the client, a zero timeout waits without limit.
    /// Errors are reported through the returned [`AckResponse`].
    pub fn emit_with_ack(
        &self,
        event: impl Into<Str>,
        args: Vec<PayloadValue>,
        timeout: Option<Duration>,
    ) -> AckResponse {
        let id = self.client.next_ack_id();
        let timeout = match timeout.unwrap_or(self.client.config.ack_timeout) {
            Duration::ZERO => Duration::MAX,
            timeout => timeout,
        };
        let res = PendingAcks::register(&self.inner.acks, id, timeout);

        let mut packet = Packet::event(self.inner.ns.clone(), event, args);
        packet.inner.set_ack_id(id);
        if let Err(e) = self.send(packet) {
            self.inner.acks.resolve(id, Err(AckError::Socket(e)));
        }
        res
    }

    /// Emit an event and call `callback` with the server acknowledgement
    /// or with the [`AckError`], from a spawned task.
    pub fn emit_with_ack_callback<F>(
        &self,
        event: impl Into<Str>,
        args: Vec<PayloadValue>,
        timeout: Option<Duration>,
        callback: F,
    ) where
        F: FnOnce(Result<Vec<PayloadValue>, AckError>) + Send + 'static,
    {
        let res = self.emit_with_ack(event, args, timeout);
        tokio::spawn(async move { callback(res.await) });
    }

    /// Send the packet or buffer it if the namespace is not connected.
    fn send(&self, packet: Packet) -> Result<(), SocketError> {
        let mut state = self.inner.state.lock().unwrap();
        if state.closed {
            return Err(SocketError::Closed);
        }
        if state.status == NsStatus::Connected {
            return self.client.send(packet);
        }
        if state.buffer.len() >= self.client.config.send_buffer_size {
            return Err(SocketError::BufferFull);
        }
        state.buffer.push_back(packet);
        Ok(())
    }

    /// Send a packet without buffering it.
    pub(crate) fn send_packet(&self, packet: Packet) -> Result<(), SocketError> {
        self.client.send(packet)
    }

    // ==== Handlers ====

    /// Register a handler for the given event.
    ///
    /// Handlers of the same event are called in registration order.
    ///
    /// # Example
    /// ```no_run
    /// # use socketioxide_client::{Client, Event, Socket};
    /// # fn doc(client: Client) {
    /// client.socket().on("sum", |_socket: &Socket, event: Event| {
    ///     let sum: i64 = event.args.iter().filter_map(|v| v.as_i64()).sum();
    ///     event.ack(vec![sum.into()]).ok();
    /// });
    /// # }
    /// ```
    pub fn on<F>(&self, event: impl Into<Str>, handler: F)
    where
        F: Fn(&Socket, Event) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .write()
            .unwrap()
            .events
            .entry(event.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Remove every handler of the given event.
    pub fn off(&self, event: &str) {
        self.inner.handlers.write().unwrap().events.remove(event);
    }

    /// Remove every handler of this socket, including the catch-all and lifecycle handlers.
    pub fn off_all(&self) {
        self.inner.handlers.write().unwrap().clear();
    }

    /// Register a handler called for every event, before the event handlers.
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&Socket, &Event) + Send + Sync + 'static,
    {
        self.inner.handlers.write().unwrap().any.push(Arc::new(handler));
    }

    /// Register a handler called each time the namespace connection is accepted.
    pub fn on_connect<F>(&self, handler: F)
    where
        F: Fn(&Socket) + Send + Sync + 'static,
    {
        self.inner.handlers.write().unwrap().connect.push(Arc::new(handler));
    }

    /// Register a handler called each time the socket is disconnected from its namespace.
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: Fn(&Socket, DisconnectReason) + Send + Sync + 'static,
    {
        self.inner.handlers.write().unwrap().disconnect.push(Arc::new(handler));
    }

    /// Register a handler called when the server refuses the namespace connection,
    /// with the payload of the `CONNECT_ERROR` packet.
    pub fn on_connect_error<F>(&self, handler: F)
    where
        F: Fn(&Socket, &PayloadValue) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .write()
            .unwrap()
            .connect_error
            .push(Arc::new(handler));
    }

    // ==== Client side ====

    /// Connect the namespace if needed, called when the session is open.
    pub(crate) fn open(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.active && state.status == NsStatus::Disconnected {
            self.send_connect(&mut state);
        }
    }

    fn send_connect(&self, state: &mut NsState) {
        state.status = NsStatus::Connecting;
        // v2 servers connect the default namespace with the session
        if self.client.protocol() == ProtocolVersion::V3 && self.inner.ns == "/" {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(ns = ?self.inner.ns, "connecting to namespace");

        let auth = match self.client.protocol() {
            ProtocolVersion::V3 => None,
            ProtocolVersion::V4 => self.client.config.auth.clone(),
        };
        if let Err(_e) = self.client.send(Packet::connect(self.inner.ns.clone(), auth)) {
            #[cfg(feature = "tracing")]
            tracing::warn!(ns = ?self.inner.ns, "error sending connect packet: {_e}");
        }
    }

    /// The engine.io session was closed.
    /// The namespace will be connected again with the next session if it is still active.
    ///
    /// When the client itself is closed, the emit buffer is dropped and every ack is cancelled.
    pub(crate) fn close(&self, reason: DisconnectReason) {
        let mut state = self.inner.state.lock().unwrap();
        let status = std::mem::take(&mut state.status);
        state.id = None;
        if reason == DisconnectReason::ClientDisconnect {
            if status == NsStatus::Connected {
                self.client.send(Packet::disconnect(self.inner.ns.clone())).ok();
            }
            state.buffer.clear();
        }
        self.cancel_sent_acks(state);
        if status == NsStatus::Connected {
            self.dispatch_disconnect(reason);
        }
    }

    pub(crate) fn recv(&self, packet: PacketData) {
        match packet {
            PacketData::Connect(data) => self.recv_connect(data),
            PacketData::Disconnect => self.recv_disconnect(),
            PacketData::Event(name, args, ack) | PacketData::BinaryEvent(name, args, ack) => {
                self.recv_event(name, args, ack)
            }
            PacketData::EventAck(args, id) | PacketData::BinaryAck(args, id) => {
                self.recv_ack(args, id)
            }
            PacketData::ConnectError(data) => self.recv_connect_error(data),
        }
    }

    fn recv_connect(&self, data: Option<PayloadValue>) {
        let mut state = self.inner.state.lock().unwrap();
        if state.status != NsStatus::Connecting {
            #[cfg(feature = "tracing")]
            tracing::debug!(ns = ?self.inner.ns, status = ?state.status, "unexpected connect packet");
            return;
        }
        // v2 servers do not send the socket id, it is the session id
        let id = data
            .and_then(|data| data.deserialize::<ConnectPacket>().ok())
            .map(|packet| packet.sid)
            .or_else(|| self.client.session_id());

        #[cfg(feature = "tracing")]
        tracing::debug!(ns = ?self.inner.ns, ?id, buffered = state.buffer.len(), "namespace connected");

        state.status = NsStatus::Connected;
        state.id = id;
        while let Some(packet) = state.buffer.pop_front() {
            let ack = ack_id(&packet);
            if let Err(e) = self.client.send(packet) {
                #[cfg(feature = "tracing")]
                tracing::warn!(ns = ?self.inner.ns, "error flushing buffered packet: {e}");
                if let Some(id) = ack {
                    self.inner.acks.resolve(id, Err(AckError::Socket(e)));
                }
            }
        }
        drop(state);

        let socket = self.clone();
        self.client.dispatch(move || {
            let handlers = socket.inner.handlers.read().unwrap().connect.clone();
            for handler in handlers {
                handler(&socket);
            }
        });
    }

    fn recv_disconnect(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.status == NsStatus::Disconnected {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(ns = ?self.inner.ns, "namespace disconnected by the server");

        let status = std::mem::take(&mut state.status);
        state.active = false;
        state.id = None;
        self.cancel_sent_acks(state);

        if status == NsStatus::Connected {
            self.dispatch_disconnect(DisconnectReason::ServerNSDisconnect);
        }
    }

    fn recv_event(&self, name: Str, args: Vec<PayloadValue>, ack: Option<i64>) {
        if !self.is_connected() {
            #[cfg(feature = "tracing")]
            tracing::debug!(ns = ?self.inner.ns, ?name, "event received on a disconnected namespace");
            return;
        }
        let ack = ack.map(|id| AckSender::new(self.clone(), id));
        let event = Event::new(name, args, ack);
        let socket = self.clone();
        self.client.dispatch(move || socket.call_handlers(event));
    }

    fn call_handlers(&self, event: Event) {
        let (any, handlers) = {
            let handlers = self.inner.handlers.read().unwrap();
            let events = handlers.events.get(&event.name).cloned().unwrap_or_default();
            (handlers.any.clone(), events)
        };
        for handler in any {
            handler(self, &event);
        }
        for handler in handlers {
            handler(self, event.clone());
        }
    }

    fn recv_ack(&self, args: Vec<PayloadValue>, id: i64) {
        if !self.inner.acks.resolve(id, Ok(args)) {
            #[cfg(feature = "tracing")]
            tracing::debug!(ns = ?self.inner.ns, id, "ack received for an unknown or expired id");
        }
    }

    fn recv_connect_error(&self, data: PayloadValue) {
        let mut state = self.inner.state.lock().unwrap();
        #[cfg(feature = "tracing")]
        tracing::debug!(ns = ?self.inner.ns, ?data, "namespace connection refused");

        state.status = NsStatus::Disconnected;
        state.active = false;
        state.id = None;
        self.cancel_sent_acks(state);

        self.client.report_error(Error::Auth {
            ns: self.inner.ns.clone(),
            data: data.clone(),
        });
        let socket = self.clone();
        self.client.dispatch(move || {
            let handlers = socket.inner.handlers.read().unwrap().connect_error.clone();
            for handler in handlers {
                handler(&socket, &data);
            }
        });
    }

    /// Cancel the acks of the packets already sent.
    /// Buffered packets are sent with the next namespace connection, their acks are kept.
    fn cancel_sent_acks(&self, state: MutexGuard<'_, NsState>) {
        let buffered: Vec<i64> = state.buffer.iter().filter_map(ack_id).collect();
        drop(state);
        self.inner.acks.cancel(|id| buffered.contains(&id));
    }

    fn dispatch_disconnect(&self, reason: DisconnectReason) {
        let socket = self.clone();
        self.client.dispatch(move || {
            let handlers = socket.inner.handlers.read().unwrap().disconnect.clone();
            for handler in handlers {
                handler(&socket, reason);
            }
        });
    }
}

fn ack_id(packet: &Packet) -> Option<i64> {
    match packet.inner {
        PacketData::Event(_, _, ack) | PacketData::BinaryEvent(_, _, ack) => ack,
        _ => None,
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().unwrap();
        f.debug_struct("Socket")
            .field("ns", &self.inner.ns)
            .field("id", &state.id)
            .field("status", &state.status)
            .field("buffered", &state.buffer.len())
            .finish()
    }
}

impl PartialEq for Socket {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
