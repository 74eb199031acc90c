use std::{
    collections::HashMap,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, RwLock, Weak,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use engineioxide_client::{
    DisconnectReason as EIoDisconnectReason, ProtocolVersion, Sid, Socket as EIoSocket, Str,
    connector::Connector, handler::EngineIoClientHandler,
};
use serde::Serialize;
use socketioxide_core::{
    PayloadValue,
    packet::Packet,
    parser::{EncodedPacket, Parse, ParseError, ParserState},
};
use socketioxide_parser_common::CommonParser;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use url::Url;

use crate::{
    ack::AckResponse,
    backoff::Backoff,
    config::{ClientBuilder, ClientConfig},
    errors::{AckError, EngineIoError, Error, SendError, SocketError},
    handler::{BoxedClientEventHandler, Event},
    socket::{DisconnectReason, NsSocket, Socket},
    state::ClientStatus,
};

/// An event of the [`Client`] connection, see [`Client::on_client_event`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The engine.io session is open
    Connect,
    /// The client started to connect
    Connecting,
    /// The engine.io session was closed
    Disconnect(DisconnectReason),
    /// An error occurred, see [`Error`]
    Error(Arc<Error>),
    /// The client reconnected after the given number of attempts
    Reconnect(u32),
    /// The client is trying to reconnect, with the attempt number
    ReconnectAttempt(u32),
    /// A heartbeat ping was received (v4) or sent (v3)
    Ping,
    /// A heartbeat pong was sent (v4) or received (v3)
    Pong,
}

type Job = Box<dyn FnOnce() + Send>;
type EngineSocket = EIoSocket<SessionHandler>;

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    connector: Arc<dyn Connector>,

    /// Only written by the supervisor task and by [`Client::disconnect`].
    status: watch::Sender<ClientStatus>,
    engine: RwLock<Option<Arc<EngineSocket>>>,
    nsps: RwLock<HashMap<Str, Arc<NsSocket>>>,
    observers: RwLock<Vec<BoxedClientEventHandler>>,
    last_error: Mutex<Option<Arc<Error>>>,

    ack_counter: AtomicI64,

    dispatch_tx: mpsc::UnboundedSender<Job>,
    dispatch_rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    pub(crate) fn protocol(&self) -> ProtocolVersion {
        self.config.engine_config.protocol
    }

    pub(crate) fn next_ack_id(&self) -> i64 {
        self.ack_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_session_open(&self) -> bool {
        self.engine
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|engine| !engine.is_closed())
    }

    pub(crate) fn session_id(&self) -> Option<Sid> {
        self.engine
            .read()
            .unwrap()
            .as_ref()
            .map(|engine| engine.id().clone())
    }

    /// Encode and send a packet with its attachments through the engine.io session.
    pub(crate) fn send(&self, packet: Packet) -> Result<(), SocketError> {
        let engine = self.engine.read().unwrap();
        let engine = engine.as_ref().ok_or(SocketError::Closed)?;
        let permit = engine.reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SocketError::InternalChannelFull,
            mpsc::error::TrySendError::Closed(_) => SocketError::Closed,
        })?;

        #[cfg(feature = "tracing")]
        tracing::trace!(sid = ?engine.id(), ?packet, "sending packet");

        let EncodedPacket { data, attachments } = CommonParser.encode(packet);
        permit.emit_many(data, attachments);
        Ok(())
    }

    /// Queue a job on the dispatcher task. Jobs run one at a time, in order.
    pub(crate) fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        self.dispatch_tx.send(Box::new(job)).ok();
    }

    fn emit_event(&self, event: ClientEvent) {
        let observers = self.observers.read().unwrap().clone();
        self.dispatch(move || {
            for observer in observers {
                observer(&event);
            }
        });
    }

    /// Keep the error as the last error and notify the observers.
    pub(crate) fn report_error(&self, err: Error) {
        let err = Arc::new(err);
        self.last_error.lock().unwrap().replace(err.clone());
        self.emit_event(ClientEvent::Error(err));
    }

    /// Returns true if the status was changed.
    fn set_status(&self, next: ClientStatus) -> bool {
        self.status.send_if_modified(|status| {
            if !status.can_transition_to(next) {
                #[cfg(feature = "tracing")]
                tracing::trace!(from = ?status, to = ?next, "ignored status transition");
                return false;
            }
            *status = next;
            true
        })
    }

    fn sockets(self: &Arc<Self>) -> Vec<Socket> {
        self.nsps
            .read()
            .unwrap()
            .values()
            .map(|ns| Socket::new(ns.clone(), self.clone()))
            .collect()
    }

    fn start_dispatcher(&self) {
        let Some(mut rx) = self.dispatch_rx.lock().unwrap().take() else {
            return;
        };
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("a handler panicked");
                }
            }
        });
    }

    fn recv_packet(self: &Arc<Self>, packet: Packet) {
        #[cfg(feature = "tracing")]
        tracing::trace!(?packet, "received packet");

        let ns = self.nsps.read().unwrap().get(&packet.ns).cloned();
        match ns {
            Some(ns) => Socket::new(ns, self.clone()).recv(packet.inner),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(ns = ?packet.ns, "packet received for an unknown namespace");
            }
        }
    }

    /// A packet of the session could not be decoded. It is dropped and the session is kept.
    fn protocol_error(&self, err: ParseError) {
        #[cfg(feature = "tracing")]
        tracing::debug!("packet decoding error: {err}");
        self.report_error(Error::Protocol(err));
    }

    /// Open a new engine.io session. It is not started so that the namespaces
    /// can queue their `CONNECT` packets first.
    async fn open_session(
        self: &Arc<Self>,
    ) -> Result<(Arc<EngineSocket>, oneshot::Receiver<EIoDisconnectReason>), Error> {
        let config = self.config.engine_config.clone();
        let opened = tokio::time::timeout(config.connect_timeout, self.connector.open(&config))
            .await
            .map_err(|_| EngineIoError::HandshakeTimeout)??;

        let (closed_tx, closed_rx) = oneshot::channel();
        let handler = Arc::new(SessionHandler {
            client: Arc::downgrade(self),
            parser_state: ParserState::default(),
            closed_tx: Mutex::new(Some(closed_tx)),
        });
        let engine = EIoSocket::new(opened, config, self.connector.clone(), handler);
        self.engine.write().unwrap().replace(engine.clone());
        Ok((engine, closed_rx))
    }

    /// The connection loop: open a session, wait for it to close and retry with backoff.
    async fn supervise(self: Arc<Self>) {
        let mut backoff = Backoff::new(&self.config.reconnection);
        loop {
            let last = match self.open_session().await {
                Ok((engine, closed_rx)) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(sid = ?engine.id(), "session open");

                    let attempts = backoff.attempts();
                    backoff.reset();
                    self.set_status(ClientStatus::Connected);
                    if attempts > 0 {
                        self.emit_event(ClientEvent::Reconnect(attempts));
                    }
                    self.emit_event(ClientEvent::Connect);
                    for socket in self.sockets() {
                        socket.open();
                    }
                    engine.start();

                    let reason = closed_rx.await.unwrap_or(EIoDisconnectReason::TransportError);
                    self.engine.write().unwrap().take();

                    #[cfg(feature = "tracing")]
                    tracing::debug!(sid = ?engine.id(), ?reason, "session closed");

                    for socket in self.sockets() {
                        socket.close(reason.into());
                    }
                    let err = Arc::new(Error::Transport(reason));
                    self.last_error.lock().unwrap().replace(err.clone());
                    if reason != EIoDisconnectReason::TransportClose {
                        self.emit_event(ClientEvent::Error(err.clone()));
                    }
                    if !self.config.reconnection.enabled {
                        self.set_status(ClientStatus::Disconnected);
                        self.emit_event(ClientEvent::Disconnect(reason.into()));
                        return;
                    }
                    self.set_status(ClientStatus::Reconnecting);
                    self.emit_event(ClientEvent::Disconnect(reason.into()));
                    err
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempts = backoff.attempts(), "connection error: {err}");

                    let err = Arc::new(err);
                    self.last_error.lock().unwrap().replace(err.clone());
                    if self.config.reconnection.enabled {
                        self.set_status(ClientStatus::Reconnecting);
                    }
                    err
                }
            };

            match backoff.next_delay() {
                Some(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(?delay, attempt = backoff.attempts(), "reconnecting");

                    tokio::time::sleep(delay).await;
                    self.emit_event(ClientEvent::ReconnectAttempt(backoff.attempts()));
                }
                None => {
                    self.set_status(ClientStatus::Disconnected);
                    let err = match backoff.attempts() {
                        0 => last,
                        attempts => Arc::new(Error::ReconnectFailed { attempts, last }),
                    };
                    self.last_error.lock().unwrap().replace(err.clone());
                    self.emit_event(ClientEvent::Error(err));
                    return;
                }
            }
        }
    }
}

/// The engine.io handler of one session.
struct SessionHandler {
    client: Weak<ClientInner>,
    parser_state: ParserState,
    /// Notify the supervisor that the session is closed
    closed_tx: Mutex<Option<oneshot::Sender<EIoDisconnectReason>>>,
}

impl SessionHandler {
    fn handle(&self, client: &Arc<ClientInner>, res: Result<Packet, ParseError>) {
        match res {
            Ok(packet) => client.recv_packet(packet),
            Err(ParseError::NeedsMoreBinaryData) => (),
            Err(err) => client.protocol_error(err),
        }
    }
}

impl EngineIoClientHandler for SessionHandler {
    fn on_message(&self, msg: Str) {
        let Some(client) = self.client.upgrade() else {
            return;
        };
        // A string message while attachments are expected means that the binary packet is incomplete
        if let Err(err) = CommonParser.finalize(&self.parser_state) {
            client.protocol_error(err);
        }
        self.handle(&client, CommonParser.decode_str(&self.parser_state, msg));
    }

    fn on_binary(&self, data: Bytes) {
        let Some(client) = self.client.upgrade() else {
            return;
        };
        self.handle(&client, CommonParser.decode_bin(&self.parser_state, data));
    }

    fn on_disconnect(&self, reason: EIoDisconnectReason) {
        if let Some(tx) = self.closed_tx.lock().unwrap().take() {
            tx.send(reason).ok();
        }
    }

    fn on_ping(&self) {
        if let Some(client) = self.client.upgrade() {
            client.emit_event(ClientEvent::Ping);
        }
    }

    fn on_pong(&self) {
        if let Some(client) = self.client.upgrade() {
            client.emit_event(ClientEvent::Pong);
        }
    }
}

/// A socket.io client.
///
/// It owns one engine.io session shared by every namespace [`Socket`] and reconnects it
/// when it is lost. The event methods of the client apply to its default socket,
/// see [`Client::socket`].
///
/// It is cheap to clone, every clone refers to the same client.
///
/// # Example
/// ```no_run
/// # use socketioxide_client::{Client, ClientEvent, Event, Socket};
/// # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder("http://localhost:3000".parse()?).build();
/// client.on("hello", |socket: &Socket, event: Event| {
///     println!("hello {:?}", event.args);
///     socket.emit("world", vec![]).ok();
/// });
/// client.on_client_event(|event: &ClientEvent| println!("{event:?}"));
/// client.connect();
/// client.connected().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
    socket: Socket,
}

impl Client {
    /// Create a [`ClientBuilder`] for the server at `url`.
    pub fn builder(url: Url) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub(crate) fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let ns = config.namespace.clone();
        let inner = Arc::new(ClientInner {
            config,
            connector,
            status: watch::Sender::new(ClientStatus::Disconnected),
            engine: RwLock::new(None),
            nsps: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            last_error: Mutex::new(None),
            ack_counter: AtomicI64::new(0),
            dispatch_tx,
            dispatch_rx: Mutex::new(Some(dispatch_rx)),
            supervisor: Mutex::new(None),
        });
        let socket = Self::get_or_create_ns(&inner, normalize_ns(ns));
        Self { inner, socket }
    }

    fn get_or_create_ns(inner: &Arc<ClientInner>, ns: Str) -> Socket {
        let ns = inner
            .nsps
            .write()
            .unwrap()
            .entry(ns.clone())
            .or_insert_with(|| Arc::new(NsSocket::new(ns)))
            .clone();
        Socket::new(ns, inner.clone())
    }

    /// Start connecting to the server, the connection and reconnections run on a background task.
    /// Calling it while the client is running has no effect.
    ///
    /// It must be called from a tokio runtime.
    pub fn connect(&self) {
        let mut supervisor = self.inner.supervisor.lock().unwrap();
        if supervisor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(url = %self.inner.config.engine_config.url, "connecting");

        self.inner.start_dispatcher();
        self.inner.set_status(ClientStatus::Connecting);
        self.inner.emit_event(ClientEvent::Connecting);
        supervisor.replace(tokio::spawn(self.inner.clone().supervise()));
    }

    /// Close the client. The connected namespaces are disconnected, the pending acknowledgements
    /// are cancelled and the client does not try to reconnect.
    ///
    /// Calling it more than once has no effect. The client can be connected again with [`Client::connect`].
    pub fn disconnect(&self) {
        let Some(supervisor) = self.inner.supervisor.lock().unwrap().take() else {
            return;
        };
        supervisor.abort();
        #[cfg(feature = "tracing")]
        tracing::debug!("disconnecting");

        for socket in self.inner.sockets() {
            socket.close(DisconnectReason::ClientDisconnect);
        }
        let engine = self.inner.engine.write().unwrap().take();
        if let Some(engine) = engine {
            engine.close(EIoDisconnectReason::ClientClose);
        }
        if self.inner.set_status(ClientStatus::Disconnected) {
            self.inner
                .emit_event(ClientEvent::Disconnect(DisconnectReason::ClientDisconnect));
        }
    }

    /// Returns true if the engine.io session is open.
    pub fn is_connected(&self) -> bool {
        self.status() == ClientStatus::Connected
    }

    /// The current [`ClientStatus`]
    pub fn status(&self) -> ClientStatus {
        *self.inner.status.borrow()
    }

    /// A receiver of the [`ClientStatus`] changes.
    pub fn status_receiver(&self) -> watch::Receiver<ClientStatus> {
        self.inner.status.subscribe()
    }

    /// Wait until the client is connected.
    pub async fn connected(&self) {
        let mut rx = self.inner.status.subscribe();
        rx.wait_for(|status| *status == ClientStatus::Connected)
            .await
            .ok();
    }

    /// The last error reported by the client.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.inner.last_error.lock().unwrap().clone()
    }

    /// The engine.io session id, if a session is open.
    pub fn session_id(&self) -> Option<Sid> {
        self.inner.session_id()
    }

    /// The socket of the default namespace.
    pub fn socket(&self) -> Socket {
        self.socket.clone()
    }

    /// Get the socket of the given namespace, it is created if it does not exist.
    ///
    /// A new socket is connected right away if the client is connected,
    /// otherwise it is connected with the session.
    pub fn of(&self, ns: impl Into<Str>) -> Socket {
        let ns = normalize_ns(ns.into());
        let exists = self.inner.nsps.read().unwrap().contains_key(&ns);
        let socket = Self::get_or_create_ns(&self.inner, ns);
        if !exists && self.inner.is_session_open() {
            socket.open();
        }
        socket
    }

    /// Register an observer of the [`ClientEvent`]s.
    pub fn on_client_event<F>(&self, handler: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.observers.write().unwrap().push(Arc::new(handler));
    }

    // ==== Default socket ====

    /// See [`Socket::on`].
    pub fn on<F>(&self, event: impl Into<Str>, handler: F)
    where
        F: Fn(&Socket, Event) + Send + Sync + 'static,
    {
        self.socket.on(event, handler)
    }

    /// See [`Socket::off`].
    pub fn off(&self, event: &str) {
        self.socket.off(event)
    }

    /// Remove every handler of the default socket and every client event observer.
    pub fn off_all(&self) {
        self.socket.off_all();
        self.inner.observers.write().unwrap().clear();
    }

    /// See [`Socket::on_any`].
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&Socket, &Event) + Send + Sync + 'static,
    {
        self.socket.on_any(handler)
    }

    /// See [`Socket::emit`].
    pub fn emit(&self, event: impl Into<Str>, args: Vec<PayloadValue>) -> Result<(), SocketError> {
        self.socket.emit(event, args)
    }

    /// See [`Socket::emit_value`].
    pub fn emit_value<T: ?Sized + Serialize>(
        &self,
        event: impl Into<Str>,
        data: &T,
    ) -> Result<(), SendError> {
        self.socket.emit_value(event, data)
    }

    /// See [`Socket::emit_with_ack`].
    pub fn emit_with_ack(
        &self,
        event: impl Into<Str>,
        args: Vec<PayloadValue>,
        timeout: Option<Duration>,
    ) -> AckResponse {
        self.socket.emit_with_ack(event, args, timeout)
    }

    /// See [`Socket::emit_with_ack_callback`].
    pub fn emit_with_ack_callback<F>(
        &self,
        event: impl Into<Str>,
        args: Vec<PayloadValue>,
        timeout: Option<Duration>,
        callback: F,
    ) where
        F: FnOnce(Result<Vec<PayloadValue>, AckError>) + Send + 'static,
    {
        self.socket
            .emit_with_ack_callback(event, args, timeout, callback)
    }
}

/// Namespaces always start with a slash.
fn normalize_ns(ns: Str) -> Str {
    if ns.starts_with('/') {
        ns
    } else {
        Str::from(format!("/{ns}"))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("status", &self.status())
            .field("ns", self.socket.ns())
            .field("sid", &self.session_id())
            .finish()
    }
}
