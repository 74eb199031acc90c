//! Configuration of the socket.io [`Client`].
//!
//! The [`ClientBuilder`] wraps the [`EngineIoClientConfigBuilder`] of the underlying
//! engine.io session and adds the socket.io options on top of it.
use std::{fmt, sync::Arc, time::Duration};

use engineioxide_client::{
    ProtocolVersion,
    config::{EngineIoClientConfig, EngineIoClientConfigBuilder, TransportPolicy},
    connector::{Connector, DefaultConnector},
};
use socketioxide_core::{PayloadValue, Str};
use url::Url;

use crate::client::Client;

/// The reconnection policy of the [`Client`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionConfig {
    /// Whether the client reconnects after losing the connection.
    ///
    /// Defaults to `true`.
    pub enabled: bool,

    /// The maximum number of consecutive reconnection attempts, `None` means unbounded.
    ///
    /// Defaults to `None`.
    pub max_attempts: Option<u32>,

    /// The delay before the first reconnection attempt. It doubles with each attempt.
    ///
    /// Defaults to 1 second.
    pub delay: Duration,

    /// The upper bound of the delay between two attempts.
    ///
    /// Defaults to 5 seconds.
    pub max_delay: Duration,

    /// The jitter applied to each delay, between 0 and 1.
    ///
    /// Defaults to 0.5.
    pub randomization_factor: f64,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: None,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            randomization_factor: 0.5,
        }
    }
}

/// Configuration for the socket.io [`Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The inner engine.io config
    pub engine_config: EngineIoClientConfig,

    /// The namespace of the default socket, see [`Client::socket`].
    ///
    /// Defaults to `/`.
    pub namespace: Str,

    /// The payload sent with each `CONNECT` packet.
    pub auth: Option<PayloadValue>,

    /// The amount of time the client will wait for an acknowledgement from the server.
    /// A zero duration waits without limit.
    ///
    /// Defaults to 5 seconds.
    pub ack_timeout: Duration,

    /// The reconnection policy
    pub reconnection: ReconnectionConfig,

    /// The maximum number of packets buffered by a namespace socket while it is
    /// not connected.
    ///
    /// Defaults to 128 packets.
    pub send_buffer_size: usize,
}

/// A builder to create a [`Client`].
pub struct ClientBuilder {
    engine_config_builder: EngineIoClientConfigBuilder,
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    /// Create a new [`ClientBuilder`] for the server at `url`.
    /// The engine.io request path defaults to `/socket.io/`.
    pub fn new(url: Url) -> Self {
        let engine_config_builder = EngineIoClientConfig::builder(url).path("/socket.io/");
        Self {
            config: ClientConfig {
                engine_config: engine_config_builder.clone().build(),
                namespace: Str::from("/"),
                auth: None,
                ack_timeout: Duration::from_secs(5),
                reconnection: ReconnectionConfig::default(),
                send_buffer_size: 128,
            },
            engine_config_builder,
            connector: None,
        }
    }

    /// The namespace of the default socket.
    ///
    /// Defaults to `/`.
    pub fn namespace(mut self, ns: impl Into<Str>) -> Self {
        self.config.namespace = ns.into();
        self
    }

    /// The path of the engine.io endpoint.
    ///
    /// Defaults to `/socket.io/`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.engine_config_builder = self.engine_config_builder.path(path);
        self
    }

    /// Add a query parameter to every engine.io request.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.engine_config_builder = self.engine_config_builder.query(key, value);
        self
    }

    /// Add an http header to the polling requests and the websocket handshake.
    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.engine_config_builder = self.engine_config_builder.header(name, value);
        self
    }

    /// The transports used by the session.
    ///
    /// Defaults to [`TransportPolicy::Auto`].
    pub fn transport(mut self, transport: TransportPolicy) -> Self {
        self.engine_config_builder = self.engine_config_builder.transport(transport);
        self
    }

    /// The engine.io protocol version.
    ///
    /// [`ProtocolVersion::V3`] is used by socket.io v2 servers.
    pub fn protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.engine_config_builder = self.engine_config_builder.protocol(protocol);
        self
    }

    /// The payload sent with each `CONNECT` packet, it is ignored by socket.io v2 servers.
    pub fn auth(mut self, auth: impl Into<PayloadValue>) -> Self {
        self.config.auth = Some(auth.into());
        self
    }

    /// Enable or disable the reconnection.
    ///
    /// Defaults to `true`.
    pub fn reconnection(mut self, enabled: bool) -> Self {
        self.config.reconnection.enabled = enabled;
        self
    }

    /// The maximum number of consecutive reconnection attempts, `None` means unbounded.
    ///
    /// Defaults to `None`.
    pub fn reconnection_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.reconnection.max_attempts = attempts;
        self
    }

    /// The delay before the first reconnection attempt.
    ///
    /// Defaults to 1 second.
    pub fn reconnection_delay(mut self, delay: Duration) -> Self {
        self.config.reconnection.delay = delay;
        self
    }

    /// The upper bound of the delay between two reconnection attempts.
    ///
    /// Defaults to 5 seconds.
    pub fn reconnection_delay_max(mut self, delay: Duration) -> Self {
        self.config.reconnection.max_delay = delay;
        self
    }

    /// The jitter applied to the reconnection delays, clamped between 0 and 1.
    ///
    /// Defaults to 0.5.
    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.config.reconnection.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// The amount of time the client will wait for an acknowledgement from the server.
    /// A zero duration waits without limit.
    ///
    /// Defaults to 5 seconds.
    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.config.ack_timeout = ack_timeout;
        self
    }

    /// The timeout of a polling request.
    ///
    /// Defaults to `pingInterval + pingTimeout` of the session.
    pub fn polling_timeout(mut self, timeout: Duration) -> Self {
        self.engine_config_builder = self.engine_config_builder.polling_timeout(timeout);
        self
    }

    /// The timeout of the engine.io handshake.
    ///
    /// Defaults to 20 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.engine_config_builder = self.engine_config_builder.connect_timeout(timeout);
        self
    }

    /// The number of packets that can be queued in the engine.io session before
    /// emitting returns [`SocketError::InternalChannelFull`](crate::SocketError::InternalChannelFull).
    ///
    /// Defaults to 128 packets.
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.engine_config_builder = self.engine_config_builder.max_buffer_size(max_buffer_size);
        self
    }

    /// The number of packets a namespace socket can queue while it is not connected.
    ///
    /// Defaults to 128 packets.
    pub fn send_buffer_size(mut self, send_buffer_size: usize) -> Self {
        self.config.send_buffer_size = send_buffer_size;
        self
    }

    /// Use a custom [`Connector`] to open the engine.io transports.
    ///
    /// Defaults to the [`DefaultConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the [`Client`]. It is not connected until [`Client::connect`] is called.
    pub fn build(mut self) -> Client {
        self.config.engine_config = self.engine_config_builder.build();
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(DefaultConnector::default()));
        Client::new(self.config, connector)
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .finish()
    }
}
