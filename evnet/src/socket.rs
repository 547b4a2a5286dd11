//! Non-blocking socket setup.
//!
//! Sockets are created through `socket2` so options can be applied before
//! `bind`/`listen`, then handed to `mio`. Both crates open sockets with
//! close-on-exec set.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use mio::event::Source;
use mio::net::{TcpListener, TcpStream, UdpSocket};
use socket2::{Domain, Protocol, SockRef, TcpKeepalive, Type};

use crate::config::{KEEPALIVE_IDLE, KEEPALIVE_INTERVAL, KEEPALIVE_RETRIES};
use crate::tls::RawIo;

/// Multicast DNS group address
pub(crate) const MDNS_MULTICAST_IPV4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// Multicast DNS port
pub(crate) const MDNS_PORT: u16 = 5353;

/// The transport under a connection.
#[derive(Debug)]
pub(crate) enum Socket {
    Listener(TcpListener),
    Stream(TcpStream),
    Datagram(UdpSocket),
}

fn unspecified(peer: &SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

fn new_socket(addr: &SocketAddr, ty: Type, protocol: Protocol) -> io::Result<socket2::Socket> {
    let socket = socket2::Socket::new(Domain::for_address(*addr), ty, Some(protocol))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Applies the per-stream options every accepted or connected TCP socket
/// carries: no Nagle delay and keep-alive probing.
pub(crate) fn set_stream_options(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let sock = SockRef::from(stream);
    sock.set_keepalive(true)?;
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_IDLE);
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd"
    ))]
    let keepalive = keepalive
        .with_interval(KEEPALIVE_INTERVAL)
        .with_retries(KEEPALIVE_RETRIES);
    sock.set_tcp_keepalive(&keepalive)
}

impl Socket {
    /// Opens a TCP listener on `addr`.
    pub(crate) fn listen_tcp(addr: SocketAddr, backlog: i32) -> io::Result<Self> {
        let socket = new_socket(&addr, Type::STREAM, Protocol::TCP)?;
        #[cfg(unix)]
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;
        Ok(Socket::Listener(TcpListener::from_std(socket.into())))
    }

    /// Opens a UDP socket bound to `addr` that receives from anyone.
    pub(crate) fn bind_udp(addr: SocketAddr) -> io::Result<Self> {
        let socket = new_socket(&addr, Type::DGRAM, Protocol::UDP)?;
        #[cfg(unix)]
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        Ok(Socket::Datagram(UdpSocket::from_std(socket.into())))
    }

    /// Starts a non-blocking TCP connect. Completion is reported as
    /// writability.
    pub(crate) fn connect_tcp(peer: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(peer)?;
        set_stream_options(&stream)?;
        Ok(Socket::Stream(stream))
    }

    /// Opens a UDP socket on an ephemeral port of `peer`'s address family.
    pub(crate) fn connect_udp(peer: SocketAddr) -> io::Result<Self> {
        let local = unspecified(&peer);
        let socket = new_socket(&local, Type::DGRAM, Protocol::UDP)?;
        socket.bind(&local.into())?;
        Ok(Socket::Datagram(UdpSocket::from_std(socket.into())))
    }

    /// Opens a UDP socket on the multicast DNS port that has joined the
    /// multicast DNS group on `interface`.
    pub(crate) fn mdns(interface: Ipv4Addr) -> io::Result<Self> {
        let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        // binding the group address only works on linux
        let local_ip = if cfg!(target_os = "linux") {
            MDNS_MULTICAST_IPV4
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        socket.bind(&SocketAddr::new(IpAddr::V4(local_ip), MDNS_PORT).into())?;
        socket.join_multicast_v4(&MDNS_MULTICAST_IPV4, &interface)?;

        Ok(Socket::Datagram(UdpSocket::from_std(socket.into())))
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Socket::Listener(s) => s.local_addr(),
            Socket::Stream(s) => s.local_addr(),
            Socket::Datagram(s) => s.local_addr(),
        }
    }

    pub(crate) fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        match self {
            Socket::Listener(s) => s.accept(),
            _ => Err(io::ErrorKind::Unsupported.into()),
        }
    }

    /// Outcome of a pending connect: `Ok(true)` once established,
    /// `Ok(false)` while still in progress.
    pub(crate) fn connect_result(&self) -> io::Result<bool> {
        let Socket::Stream(stream) = self else {
            return Ok(true);
        };
        if let Some(err) = stream.take_error()? {
            return Err(err);
        }
        match stream.peer_addr() {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match self {
            Socket::Datagram(s) => s.recv_from(buf),
            _ => Err(io::ErrorKind::Unsupported.into()),
        }
    }

    pub(crate) fn send_to(&self, buf: &[u8], peer: SocketAddr) -> io::Result<usize> {
        match self {
            Socket::Datagram(s) => s.send_to(buf, peer),
            _ => Err(io::ErrorKind::Unsupported.into()),
        }
    }

    pub(crate) fn source(&mut self) -> &mut dyn Source {
        match self {
            Socket::Listener(s) => s,
            Socket::Stream(s) => s,
            Socket::Datagram(s) => s,
        }
    }
}

impl RawIo for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Stream(s) => s.read(buf),
            Socket::Datagram(s) => s.recv(buf),
            Socket::Listener(_) => Err(io::ErrorKind::Unsupported.into()),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Stream(s) => s.write(buf),
            Socket::Datagram(s) => s.send(buf),
            Socket::Listener(_) => Err(io::ErrorKind::Unsupported.into()),
        }
    }
}
