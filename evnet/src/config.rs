//! Configuration for a [`Manager`](crate::Manager).
//!
//! ```rust
//! use evnet::ManagerConfig;
//! use std::time::Duration;
//!
//! let config = ManagerConfig::default()
//!     .with_resolver_url("udp://1.1.1.1:53")
//!     .with_resolve_timeout(Duration::from_millis(500));
//! assert_eq!(config.io_size, 2048);
//! ```

use std::time::Duration;

/// Default DNS server used for host name lookups
pub(crate) const DEFAULT_RESOLVER_URL: &str = "udp://8.8.8.8:53";

/// Default time a lookup may stay unanswered (3 seconds)
pub(crate) const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default growth quantum of connection buffers, also the size of one read
pub(crate) const DEFAULT_IO_SIZE: usize = 2048;

/// Default ceiling on a connection's receive buffer (3 MiB)
pub(crate) const DEFAULT_MAX_RECV_BUF_SIZE: usize = 3 * 1024 * 1024;

/// Default backlog passed to `listen(2)`
pub(crate) const DEFAULT_LISTEN_BACKLOG: i32 = 128;

/// TCP keep-alive idle time before the first probe
pub(crate) const KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

/// TCP keep-alive interval between probes
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// TCP keep-alive probes before the peer is considered dead
pub(crate) const KEEPALIVE_RETRIES: u32 = 3;

/// Engine-wide settings.
///
/// `resolver_url` is read when the resolver connection is first created;
/// changing it afterwards takes effect once that connection has closed.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// DNS server in `udp://ip:port` form. Must be an IP literal.
    pub resolver_url: String,
    /// How long a lookup may stay unanswered before its owner fails.
    pub resolve_timeout: Duration,
    /// Buffer growth quantum and maximum bytes moved per read.
    pub io_size: usize,
    /// Receive buffer ceiling. Reaching it is fatal for the connection.
    pub max_recv_buf_size: usize,
    pub listen_backlog: i32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            resolver_url: DEFAULT_RESOLVER_URL.to_owned(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            io_size: DEFAULT_IO_SIZE,
            max_recv_buf_size: DEFAULT_MAX_RECV_BUF_SIZE,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver_url(mut self, resolver_url: impl Into<String>) -> Self {
        self.resolver_url = resolver_url.into();
        self
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    /// Sets the buffer growth quantum. Zero is treated as one.
    pub fn with_io_size(mut self, io_size: usize) -> Self {
        self.io_size = io_size.max(1);
        self
    }

    pub fn with_max_recv_buf_size(mut self, max_recv_buf_size: usize) -> Self {
        self.max_recv_buf_size = max_recv_buf_size;
        self
    }

    pub fn with_listen_backlog(mut self, listen_backlog: i32) -> Self {
        self.listen_backlog = listen_backlog;
        self
    }
}
