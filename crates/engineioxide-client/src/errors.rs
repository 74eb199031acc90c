use http::StatusCode;
use tokio_tungstenite::tungstenite;

pub use engineioxide_core::PacketParseError;

/// Errors that can occur while opening or running an engine.io session
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A packet could not be decoded
    #[error("error decoding packet: {0}")]
    PacketParse(#[from] PacketParseError),
    /// The websocket transport failed
    #[error("ws transport error: {0}")]
    WsTransport(#[from] Box<tungstenite::Error>),
    /// The http request could not be built
    #[error("http error: {0}")]
    Http(#[from] http::Error),
    /// The http request failed
    #[error("http client error: {0}")]
    HttpClient(#[from] hyper_util::client::legacy::Error),
    /// The http response body could not be read
    #[error("http body error: {0}")]
    HttpBody(#[from] hyper::Error),
    /// The server answered with a non success status
    #[error("unexpected http status: {0}")]
    HttpStatus(StatusCode),
    /// The endpoint url is invalid
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// The endpoint url scheme is not http(s) or ws(s)
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    /// The server did not answer the handshake with an open packet
    #[error("handshake error: {0}")]
    Handshake(&'static str),
    /// The handshake did not complete in time
    #[error("handshake timeout")]
    HandshakeTimeout,
    /// The transport was closed by the remote end
    #[error("transport closed")]
    TransportClosed,
    /// The heartbeat timed out
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
    /// The websocket upgrade failed
    #[error("upgrade error: {0}")]
    Upgrade(&'static str),
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        Error::WsTransport(Box::new(err))
    }
}
