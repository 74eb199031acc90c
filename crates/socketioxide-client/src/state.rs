//! Connection states of the [`Client`](crate::Client) and of its namespace sockets.

/// The connection status of the [`Client`](crate::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientStatus {
    /// Not connected, either never connected, explicitly disconnected or
    /// every reconnection attempt failed.
    #[default]
    Disconnected,
    /// The first handshake is in progress.
    Connecting,
    /// The engine.io session is open.
    Connected,
    /// The connection was lost or the first handshake failed, the client is retrying.
    Reconnecting,
}

impl ClientStatus {
    /// Returns true if the client can move from `self` to `next`.
    pub fn can_transition_to(self, next: ClientStatus) -> bool {
        use ClientStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected | Reconnecting | Disconnected)
                | (Connected, Reconnecting | Disconnected)
                | (Reconnecting, Connected | Disconnected)
        )
    }
}

/// The connection status of a namespace [`Socket`](crate::Socket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NsStatus {
    /// Not connected to the namespace.
    #[default]
    Disconnected,
    /// A `CONNECT` packet was sent, waiting for the server answer.
    Connecting,
    /// The server accepted the connection.
    Connected,
}

#[cfg(test)]
mod tests {
    use super::ClientStatus::*;

    #[test]
    fn transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Reconnecting));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connected));
        assert!(Reconnecting.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Reconnecting));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Reconnecting.can_transition_to(Connecting));
        assert!(!Connected.can_transition_to(Connected));
    }
}
