#![allow(dead_code)]

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use engineioxide_client::{
    OpenPacket, Packet as EIoPacket,
    connector::{PipedConnector, PipedSession},
};
use socketioxide_client::{Client, ClientBuilder, ClientEvent, Sid, Socket};
use socketioxide_core::{
    packet::Packet,
    parser::{Parse, ParseError, ParserState},
};
use socketioxide_parser_common::CommonParser;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[macro_export]
macro_rules! assert_ok {
    ($e:expr) => {
        assert_ok!($e,)
    };
    ($e:expr,) => {{
        use std::result::Result::*;
        match $e {
            Ok(v) => v,
            Err(e) => panic!("assertion failed: Err({:?})", e),
        }
    }};
    ($e:expr, $($arg:tt)+) => {{
        use std::result::Result::*;
        match $e {
            Ok(v) => v,
            Err(e) => panic!("assertion failed: Err({:?}): {}", e, format_args!($($arg)+)),
        }
    }};
}

#[macro_export]
macro_rules! assert_err {
    ($e:expr) => {
        assert_err!($e,)
    };
    ($e:expr,) => {{
        use std::result::Result::*;
        match $e {
            Ok(v) => panic!("assertion failed: Ok({:?})", v),
            Err(e) => e,
        }
    }};
    ($e:expr, $($arg:tt)+) => {{
        use std::result::Result::*;
        match $e {
            Ok(v) => panic!("assertion failed: Ok({:?}): {}", v, format_args!($($arg)+)),
            Err(e) => e,
        }
    }};
}

#[macro_export]
macro_rules! assert_some {
    ($e:expr) => {
        assert_some!($e,)
    };
    ($e:expr,) => {{
        use std::option::Option::*;
        match $e {
            Some(v) => v,
            None => panic!("assertion failed: None"),
        }
    }};
    ($e:expr, $($arg:tt)+) => {{
        use std::option::Option::*;
        match $e {
            Some(v) => v,
            None => panic!("assertion failed: None: {}", format_args!($($arg)+)),
        }
    }};
}

/// The engine.io session id given by the test server
pub const SID: &str = "lv_VI97HAXpY6yYWAAAC";
/// The socket id given when a namespace is connected
pub const NS_SID: &str = "HOnMvybGVFvQjz9AAAAB";

/// Larger than the heartbeat interval so that paused clock tests can wait for pings.
const TIMEOUT: Duration = Duration::from_secs(60);

pub fn open_packet(ping_interval: u64, ping_timeout: u64) -> OpenPacket {
    OpenPacket {
        sid: Sid::from_str(SID).unwrap(),
        upgrades: vec![],
        ping_interval,
        ping_timeout,
        max_payload: 100000,
    }
}

/// The server side of the in memory transports opened by the client.
pub struct Server {
    pub connector: Arc<PipedConnector>,
    sessions: UnboundedReceiver<PipedSession>,
}

impl Server {
    /// Wait for the next transport opened by the client.
    pub async fn accept(&mut self) -> Session {
        let session = tokio::time::timeout(TIMEOUT, self.sessions.recv())
            .await
            .expect("timeout waiting for a session")
            .expect("connector dropped");
        Session {
            inner: session,
            state: ParserState::default(),
        }
    }

    /// Returns the next transport opened by the client within `timeout`.
    pub async fn try_accept(&mut self, timeout: Duration) -> Option<Session> {
        let session = tokio::time::timeout(timeout, self.sessions.recv()).await.ok()??;
        Some(Session {
            inner: session,
            state: ParserState::default(),
        })
    }
}

/// One engine.io session seen from the server.
pub struct Session {
    inner: PipedSession,
    state: ParserState,
}

impl Session {
    /// Receive the next engine.io packet sent by the client.
    pub async fn recv_raw(&mut self) -> EIoPacket {
        tokio::time::timeout(TIMEOUT, self.inner.rx.recv())
            .await
            .expect("timeout waiting for a packet")
            .expect("session closed")
    }

    /// Receive and decode the next socket.io packet sent by the client.
    /// Heartbeat packets are skipped.
    pub async fn recv(&mut self) -> Packet {
        loop {
            let res = match self.recv_raw().await {
                EIoPacket::Message(msg) => CommonParser.decode_str(&self.state, msg),
                EIoPacket::Binary(data) => CommonParser.decode_bin(&self.state, data),
                EIoPacket::Ping | EIoPacket::Pong => continue,
                packet => panic!("unexpected engine.io packet: {packet:?}"),
            };
            match res {
                Ok(packet) => return packet,
                Err(ParseError::NeedsMoreBinaryData) => continue,
                Err(e) => panic!("invalid packet sent by the client: {e}"),
            }
        }
    }

    /// Send a raw socket.io message to the client.
    pub async fn send(&self, msg: &str) {
        self.send_raw(EIoPacket::Message(msg.to_string().into()))
            .await;
    }

    pub async fn send_binary(&self, data: Bytes) {
        self.send_raw(EIoPacket::Binary(data)).await;
    }

    pub async fn send_raw(&self, packet: EIoPacket) {
        self.inner.tx.send(packet).await.expect("client transport closed");
    }

    /// Wait for the `CONNECT` packet of `ns` and accept it.
    pub async fn accept_ns(&mut self, ns: &str) {
        let packet = self.recv().await;
        assert_eq!(packet.ns, ns, "unexpected packet: {packet:?}");
        assert_eq!(packet.inner.index(), 0, "expected a connect packet: {packet:?}");
        self.send(&connect_ack(ns)).await;
    }

    /// Drop the transport, the client sees a closed connection.
    pub fn close(self) {
        drop(self);
    }
}

/// The `CONNECT` packet accepting `ns`.
pub fn connect_ack(ns: &str) -> String {
    let prefix = match ns {
        "/" => String::new(),
        ns => format!("{ns},"),
    };
    format!("0{prefix}{{\"sid\":\"{NS_SID}\"}}")
}

/// Print the logs of a test with `RUST_LOG=socketioxide_client=trace`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Create a client connected to an in memory server answering handshakes with `open`.
pub fn create_client_with(
    open: OpenPacket,
    builder: impl FnOnce(ClientBuilder) -> ClientBuilder,
) -> (Client, Server) {
    init_tracing();
    let (connector, sessions) = PipedConnector::new(open);
    let client = builder(
        Client::builder("http://localhost:3000".parse().unwrap()).connector(connector.clone()),
    )
    .build();
    (
        client,
        Server {
            connector,
            sessions,
        },
    )
}

pub fn create_client(builder: impl FnOnce(ClientBuilder) -> ClientBuilder) -> (Client, Server) {
    create_client_with(open_packet(25000, 20000), builder)
}

/// Start the client and accept its session and its default namespace.
pub async fn connect(client: &Client, server: &mut Server) -> Session {
    client.connect();
    let mut session = server.accept().await;
    session.accept_ns("/").await;
    connected(&client.socket()).await;
    session
}

/// Wait until the socket is connected to its namespace.
pub async fn connected(socket: &Socket) {
    let res = tokio::time::timeout(TIMEOUT, async {
        while !socket.is_connected() {
            tokio::task::yield_now().await;
        }
    });
    res.await.expect("timeout waiting for the namespace connection");
}

/// Record the client events, formatted with [`describe`].
pub fn client_events(client: &Client) -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on_client_event(move |event: &ClientEvent| {
        tx.send(describe(event)).ok();
    });
    rx
}

pub fn describe(event: &ClientEvent) -> String {
    match event {
        ClientEvent::Connect => "connect".to_string(),
        ClientEvent::Connecting => "connecting".to_string(),
        ClientEvent::Disconnect(reason) => format!("disconnect: {reason}"),
        ClientEvent::Error(err) => format!("error: {err}"),
        ClientEvent::Reconnect(attempts) => format!("reconnect: {attempts}"),
        ClientEvent::ReconnectAttempt(attempt) => format!("reconnect attempt: {attempt}"),
        ClientEvent::Ping => "ping".to_string(),
        ClientEvent::Pong => "pong".to_string(),
    }
}

/// Receive the next recorded value.
pub async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("timeout waiting for a value")
        .expect("channel closed")
}

/// Collect values pushed from handlers.
pub fn recorder<T>() -> Arc<Mutex<Vec<T>>> {
    Arc::new(Mutex::new(Vec::new()))
}
