//! ## Configuration for the engine.io client
//!
//! #### Example :
//! ```rust
//! # use engineioxide_client::config::{EngineIoClientConfig, TransportPolicy};
//! # use std::time::Duration;
//! let url = "http://localhost:3000".parse().unwrap();
//! let config = EngineIoClientConfig::builder(url)
//!     .path("/engine.io/")
//!     .query("token", "abc")
//!     .transport(TransportPolicy::PollingOnly)
//!     .connect_timeout(Duration::from_secs(5))
//!     .build();
//! ```

use std::time::Duration;

use engineioxide_core::{ProtocolVersion, Sid, TransportType};
use http::HeaderMap;
use url::Url;

use crate::errors::Error;

/// Which transports the client is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPolicy {
    /// Start with http long-polling and upgrade to websocket if the server allows it.
    #[default]
    Auto,
    /// Only use http long-polling, never upgrade.
    PollingOnly,
    /// Open the session directly over a websocket.
    WebsocketOnly,
}

/// Configuration of an engine.io client session.
#[derive(Debug, Clone)]
pub struct EngineIoClientConfig {
    /// The server url. If its path is empty or `/`, the [`path`](Self::path) is used.
    pub url: Url,
    /// The path of the engine.io endpoint.
    /// Defaults to "/engine.io/".
    pub path: String,
    /// Additional query parameters sent with every request.
    pub query: Vec<(String, String)>,
    /// Additional http headers sent with every request.
    pub headers: HeaderMap,
    /// The transports the client is allowed to use.
    /// Defaults to [`TransportPolicy::Auto`].
    pub transport: TransportPolicy,
    /// The engine.io protocol version.
    /// Defaults to [`ProtocolVersion::V4`].
    pub protocol: ProtocolVersion,
    /// The maximum time a polling request can stay pending.
    /// When elapsed without response the request is considered empty.
    ///
    /// Defaults to `pingInterval + pingTimeout` of the server handshake.
    pub polling_timeout: Option<Duration>,
    /// The maximum time to complete the handshake.
    /// Defaults to 20 seconds.
    pub connect_timeout: Duration,
    /// The maximum number of packets that can be buffered before being sent to the server.
    /// If the buffer if full the `emit()` method will return an error.
    /// Defaults to 128 packets.
    pub max_buffer_size: usize,
}

impl EngineIoClientConfig {
    /// Create a new builder with a default config for the given server url
    pub fn builder(url: Url) -> EngineIoClientConfigBuilder {
        EngineIoClientConfigBuilder::new(url)
    }

    /// Build the url of the engine.io endpoint for the given transport.
    ///
    /// The `sid` is appended once the session is opened.
    pub fn endpoint(&self, transport: TransportType, sid: Option<&Sid>) -> Result<Url, Error> {
        let mut url = self.url.clone();
        let scheme = match (url.scheme(), transport) {
            ("http" | "ws", TransportType::Polling) => "http",
            ("https" | "wss", TransportType::Polling) => "https",
            ("http" | "ws", TransportType::Websocket) => "ws",
            ("https" | "wss", TransportType::Websocket) => "wss",
            (scheme, _) => return Err(Error::UnsupportedScheme(scheme.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::UnsupportedScheme(scheme.to_string()))?;

        if url.path().is_empty() || url.path() == "/" {
            url.set_path(&self.path);
        }

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("EIO", self.protocol.as_str());
            pairs.append_pair("transport", transport.as_str());
            if let Some(sid) = sid {
                pairs.append_pair("sid", sid.as_str());
            }
        }
        Ok(url)
    }
}

/// Builder for [`EngineIoClientConfig`]
#[derive(Debug, Clone)]
pub struct EngineIoClientConfigBuilder {
    config: EngineIoClientConfig,
}

impl EngineIoClientConfigBuilder {
    /// Create a new builder with a default config for the given server url
    pub fn new(url: Url) -> Self {
        Self {
            config: EngineIoClientConfig {
                url,
                path: "/engine.io/".to_string(),
                query: Vec::new(),
                headers: HeaderMap::new(),
                transport: TransportPolicy::default(),
                protocol: ProtocolVersion::default(),
                polling_timeout: None,
                connect_timeout: Duration::from_secs(20),
                max_buffer_size: 128,
            },
        }
    }

    /// The path of the engine.io endpoint.
    /// Defaults to "/engine.io/".
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Add a query parameter sent with every request.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.query.push((key.into(), value.into()));
        self
    }

    /// Add an http header sent with every request.
    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.config.headers.append(name, value);
        self
    }

    /// The transports the client is allowed to use.
    pub fn transport(mut self, transport: TransportPolicy) -> Self {
        self.config.transport = transport;
        self
    }

    /// The engine.io protocol version.
    pub fn protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// The maximum time a polling request can stay pending.
    pub fn polling_timeout(mut self, timeout: Duration) -> Self {
        self.config.polling_timeout = Some(timeout);
        self
    }

    /// The maximum time to complete the handshake.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// The maximum number of packets that can be buffered before being sent to the server.
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.config.max_buffer_size = max_buffer_size;
        self
    }

    /// Build the config
    pub fn build(self) -> EngineIoClientConfig {
        self.config
    }
}
