use std::fmt;

/// Lifecycle state of a [`Connection`](crate::Connection).
///
/// A connection is in exactly one state at a time. `Closing` is terminal:
/// the engine tears the connection down on its next visit.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// Waiting for the resolver to map the host name to an address.
    Resolving,

    /// Accepting TCP connections, or receiving datagrams from anyone.
    Listening,

    /// A TCP connect is in progress.
    Connecting,

    /// The TLS handshake is in progress.
    TlsHandshaking,

    /// Exchanging data.
    #[default]
    Ready,

    /// Flushing the send buffer before closing.
    Draining,

    /// About to be torn down.
    Closing,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Resolving => "resolving",
            Self::Listening => "listening",
            Self::Connecting => "connecting",
            Self::TlsHandshaking => "tls-handshaking",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closing => "closing",
        };
        write!(f, "{s}")
    }
}
