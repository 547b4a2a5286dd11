#[cfg(test)]
#[path = "url_test.rs"]
mod url_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use shared::error::{Error, Result};

/// A connection address of the form `[scheme://][host][:port]`.
///
/// The scheme picks the transport: `udp` is UDP, anything else (or no
/// scheme) is TCP. IPv6 literals are written in brackets. A missing port
/// falls back to the scheme's well known port, or 0.
///
/// ```rust
/// use evnet::Url;
///
/// let url: Url = "udp://[::1]:5353".parse().unwrap();
/// assert!(url.is_udp());
/// assert_eq!(url.host(), "::1");
/// assert_eq!(url.port(), 5353);
///
/// let url = Url::parse("http://example.com").unwrap();
/// assert_eq!(url.port(), 80);
/// assert!(url.literal_addr().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    scheme: String,
    host: String,
    port: u16,
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "http" | "ws" => 80,
        "https" | "wss" => 443,
        "mqtt" => 1883,
        "mqtts" => 8883,
        _ => 0,
    }
}

fn parse_port(s: &str, url: &str) -> Result<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::ErrInvalidUrl(url.to_owned()));
    }
    s.parse::<u16>()
        .map_err(|_| Error::ErrInvalidUrl(url.to_owned()))
}

impl Url {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::ErrInvalidUrl(url.to_owned());

        let (scheme, rest) = match url.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("tcp".to_owned(), url),
        };
        if !scheme.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        // authority only: drop path and credentials
        let authority = rest.split('/').next().unwrap_or_default();
        let authority = authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host);
        if authority.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(invalid());
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            host.parse::<Ipv6Addr>().map_err(|_| invalid())?;
            let port = match tail {
                "" => None,
                _ => Some(parse_port(tail.strip_prefix(':').ok_or_else(invalid)?, url)?),
            };
            (host, port)
        } else if authority.parse::<Ipv6Addr>().is_ok() {
            (authority, None)
        } else if !authority.is_empty() && authority.bytes().all(|b| b.is_ascii_digit()) {
            ("", Some(parse_port(authority, url)?))
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, Some(parse_port(port, url)?)),
                None => (authority, None),
            }
        };

        Ok(Self {
            port: port.unwrap_or_else(|| default_port(&scheme)),
            scheme,
            host: host.to_owned(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_udp(&self) -> bool {
        self.scheme == "udp"
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_localhost(&self) -> bool {
        self.host.eq_ignore_ascii_case("localhost")
    }

    /// The socket address if the host needs no lookup: an IP literal,
    /// `localhost` (IPv4 loopback) or an empty host (any address).
    pub fn literal_addr(&self) -> Option<SocketAddr> {
        let ip = if self.host.is_empty() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else if self.is_localhost() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host.parse::<IpAddr>().ok()?
        };
        Some(SocketAddr::new(ip, self.port))
    }
}

impl FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Url::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}
