use std::{fmt, str::FromStr};

/// The type of `transport` used to connect to the server.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportType {
    /// Polling transport
    Polling = 0x01,
    /// Websocket transport
    Websocket = 0x02,
}

impl TransportType {
    /// The name of the transport as used in the `transport` query parameter
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportType::Polling => "polling",
            TransportType::Websocket => "websocket",
        }
    }
}

impl TryFrom<u8> for TransportType {
    type Error = UnknownTransportError;
    fn try_from(t: u8) -> Result<Self, Self::Error> {
        match t {
            0x01 => Ok(TransportType::Polling),
            0x02 => Ok(TransportType::Websocket),
            _ => Err(UnknownTransportError),
        }
    }
}

/// Cannot determine the transport type.
#[derive(Debug, Copy, Clone)]
pub struct UnknownTransportError;
impl fmt::Display for UnknownTransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transport type")
    }
}
impl std::error::Error for UnknownTransportError {}

impl FromStr for TransportType {
    type Err = UnknownTransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "websocket" => Ok(TransportType::Websocket),
            "polling" => Ok(TransportType::Polling),
            _ => Err(UnknownTransportError),
        }
    }
}
impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cannot determine the protocol version.
#[derive(Debug)]
pub struct UnknownProtocolVersionError;
impl fmt::Display for UnknownProtocolVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown protocol version")
    }
}
impl std::error::Error for UnknownProtocolVersionError {}

/// The engine.io protocol version
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// The protocol version 3, the client drives the heartbeat.
    V3 = 3,
    /// The protocol version 4, the server drives the heartbeat.
    #[default]
    V4 = 4,
}

impl ProtocolVersion {
    /// The value of the `EIO` query parameter
    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V3 => "3",
            ProtocolVersion::V4 => "4",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = UnknownProtocolVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3" => Ok(ProtocolVersion::V3),
            "4" => Ok(ProtocolVersion::V4),
            _ => Err(UnknownProtocolVersionError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_type_names() {
        assert_eq!(TransportType::Polling.as_str(), "polling");
        assert_eq!(
            "websocket".parse::<TransportType>().unwrap(),
            TransportType::Websocket
        );
        assert!("flash".parse::<TransportType>().is_err());
        assert_eq!(TransportType::try_from(0x02).unwrap(), TransportType::Websocket);
        assert!(TransportType::try_from(0x09).is_err());
    }

    #[test]
    fn protocol_version_query() {
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::V4);
        assert_eq!(ProtocolVersion::V3.as_str(), "3");
        assert_eq!("4".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V4);
        assert!("5".parse::<ProtocolVersion>().is_err());
    }
}
