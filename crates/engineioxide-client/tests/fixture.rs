#![allow(dead_code)]

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use engineioxide_client::{
    DisconnectReason, Packet, ProtocolVersion, Str, TransportType,
    handler::EngineIoClientHandler,
};
use engineioxide_core::payload;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

pub const SID: &str = "lv_VI97HAXpY6yYWAAAC";

pub fn open_packet(upgrades: &[&str]) -> String {
    let upgrades = upgrades
        .iter()
        .map(|u| format!("\"{u}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "0{{\"sid\":\"{SID}\",\"upgrades\":[{upgrades}],\"pingInterval\":25000,\"pingTimeout\":20000,\"maxPayload\":1000000}}"
    )
}

#[derive(Debug, PartialEq)]
pub enum Event {
    Message(Str),
    Binary(Bytes),
    Disconnect(DisconnectReason),
    Upgrade(TransportType),
}

pub struct Handler(UnboundedSender<Event>);
impl Handler {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self(tx)), rx)
    }
}
impl EngineIoClientHandler for Handler {
    fn on_message(&self, msg: Str) {
        self.0.send(Event::Message(msg)).ok();
    }
    fn on_binary(&self, data: Bytes) {
        self.0.send(Event::Binary(data)).ok();
    }
    fn on_disconnect(&self, reason: DisconnectReason) {
        self.0.send(Event::Disconnect(reason)).ok();
    }
    fn on_upgrade(&self, transport: TransportType) {
        self.0.send(Event::Upgrade(transport)).ok();
    }
}

/// A minimal http long-polling server.
///
/// The handshake is answered with the given open packet, framed for the requested protocol.
/// Then each GET request waits for the next payload pushed with the returned sender and
/// each POST body is forwarded to the returned receiver.
pub struct PollingServer {
    pub addr: SocketAddr,
    pub push: mpsc::Sender<String>,
    pub posts: UnboundedReceiver<String>,
    pub requests: UnboundedReceiver<String>,
}

struct State {
    open: String,
    pull: tokio::sync::Mutex<mpsc::Receiver<String>>,
    posts: UnboundedSender<String>,
    requests: UnboundedSender<String>,
    handshake_done: Mutex<bool>,
}

/// Print the logs of a test with `RUST_LOG=engineioxide_client=trace`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub async fn polling_server(open: String) -> PollingServer {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (push, pull) = mpsc::channel(16);
    let (posts_tx, posts) = mpsc::unbounded_channel();
    let (requests_tx, requests) = mpsc::unbounded_channel();
    let state = Arc::new(State {
        open,
        pull: tokio::sync::Mutex::new(pull),
        posts: posts_tx,
        requests: requests_tx,
        handshake_done: Mutex::new(false),
    });

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let state = state.clone();
            tokio::spawn(async move {
                let svc = service_fn(move |req| handle(state.clone(), req));
                http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), svc)
                    .await
                    .ok();
            });
        }
    });

    PollingServer {
        addr,
        push,
        posts,
        requests,
    }
}

fn protocol(uri: &str) -> ProtocolVersion {
    if uri.contains("EIO=3") {
        ProtocolVersion::V3
    } else {
        ProtocolVersion::V4
    }
}

async fn handle(
    state: Arc<State>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let uri = req.uri().to_string();
    state.requests.send(uri.clone()).ok();
    let body = match *req.method() {
        Method::GET if !uri.contains("sid=") => {
            *state.handshake_done.lock().unwrap() = true;
            let open = Packet::try_from(state.open.clone()).unwrap();
            payload::encode([open], protocol(&uri))
        }
        Method::GET => match state.pull.lock().await.recv().await {
            Some(payload) => payload,
            None => payload::encode([Packet::Close], protocol(&uri)),
        },
        Method::POST => {
            let body = req.into_body().collect().await.unwrap().to_bytes();
            state
                .posts
                .send(String::from_utf8(body.to_vec()).unwrap())
                .ok();
            "ok".to_string()
        }
        _ => {
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Full::default())
                .unwrap());
        }
    };
    Ok(Response::new(Full::new(Bytes::from(body))))
}
