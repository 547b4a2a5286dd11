#[cfg(test)]
mod connection_test;

pub mod state;

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use shared::error::{Error, Result};

use crate::event::{Event, SharedHandler};
use crate::iobuf::IoBuf;
use crate::socket::Socket;
use crate::tls::{RawIo, TlsSession};
use state::ConnState;

/// Identifies a connection for the lifetime of its [`Manager`](crate::Manager).
/// Ids are never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Events raised while handlers run, delivered once they return.
enum Deferred {
    Error(String),
    Write(usize),
    Protocol(Box<dyn Any>),
}

/// One socket and its buffers, handlers and lifecycle state.
///
/// Connections are owned by the [`Manager`](crate::Manager). Handlers
/// receive `&mut Connection` for the duration of an event.
pub struct Connection {
    id: ConnectionId,
    state: ConnState,
    peer: SocketAddr,
    local: SocketAddr,
    label: String,

    pub(crate) socket: Option<Socket>,
    recv: IoBuf,
    send: IoBuf,

    pub(crate) handlers: Vec<SharedHandler>,
    dispatching: bool,
    front_added: usize,
    deferred: VecDeque<Deferred>,
    closed: bool,

    udp: bool,
    client: bool,
    accepted: bool,
    hexdump: bool,
    drain_on_ready: bool,

    tls: Option<Box<dyn TlsSession>>,
    tls_established: bool,

    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("peer", &self.peer)
            .field("local", &self.local)
            .field("udp", &self.udp)
            .field("recv", &self.recv.len())
            .field("send", &self.send.len())
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, udp: bool, io_size: usize) -> Self {
        let unspecified = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        Self {
            id,
            state: ConnState::Ready,
            peer: unspecified,
            local: unspecified,
            label: String::new(),
            socket: None,
            recv: IoBuf::with_chunk_size(io_size),
            send: IoBuf::with_chunk_size(io_size),
            handlers: Vec::new(),
            dispatching: false,
            front_added: 0,
            deferred: VecDeque::new(),
            closed: false,
            udp,
            client: false,
            accepted: false,
            hexdump: false,
            drain_on_ready: false,
            tls: None,
            tls_established: false,
            readable: false,
            writable: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// The remote address. For UDP it is updated to the sender of each
    /// received datagram.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sets where data goes. Mostly useful on UDP listeners.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = peer;
    }

    pub fn local(&self) -> SocketAddr {
        self.local
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn is_udp(&self) -> bool {
        self.udp
    }

    pub fn is_client(&self) -> bool {
        self.client
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn is_listening(&self) -> bool {
        self.state == ConnState::Listening
    }

    pub fn is_resolving(&self) -> bool {
        self.state == ConnState::Resolving
    }

    pub fn is_closing(&self) -> bool {
        self.state == ConnState::Closing
    }

    /// Whether a TLS session is installed.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub fn is_tls_established(&self) -> bool {
        self.tls_established
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn hexdump(&self) -> bool {
        self.hexdump
    }

    /// Logs every byte read and written at `info` level.
    pub fn set_hexdump(&mut self, hexdump: bool) {
        self.hexdump = hexdump;
    }

    /// Received bytes not yet consumed. Handlers remove what they processed
    /// through [`recv_mut`](Self::recv_mut).
    pub fn recv(&self) -> &IoBuf {
        &self.recv
    }

    pub fn recv_mut(&mut self) -> &mut IoBuf {
        &mut self.recv
    }

    /// Bytes queued for sending.
    pub fn send_buf(&self) -> &IoBuf {
        &self.send
    }

    /// Appends a handler at the end of the chain.
    pub fn add_handler(&mut self, handler: SharedHandler) {
        self.handlers.push(handler);
    }

    /// Inserts a protocol handler at the front of the chain, so it sees
    /// every event before the handlers already attached.
    pub fn push_protocol_handler(&mut self, handler: SharedHandler) {
        self.handlers.insert(0, handler);
        if self.dispatching {
            self.front_added += 1;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Queues `data` for sending.
    ///
    /// An open UDP socket transmits `data` right away as one datagram.
    /// Fails with [`Error::ErrConnectionClosed`] once the connection is
    /// closing.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.state == ConnState::Closing {
            return Err(Error::ErrConnectionClosed);
        }

        if self.udp && self.send.is_empty() {
            if let Some(socket) = self.socket.as_ref() {
                match socket.send_to(data, self.peer) {
                    Ok(n) => {
                        self.log_io("->", &data[..n]);
                        self.queue_event(Deferred::Write(n));
                        return Ok(());
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }

        self.send.append(data)
    }

    /// Closes the connection once everything queued has been sent.
    pub fn drain(&mut self) {
        match self.state {
            ConnState::Ready => self.state = ConnState::Draining,
            ConnState::Resolving | ConnState::Connecting | ConnState::TlsHandshaking => {
                self.drain_on_ready = true
            }
            ConnState::Listening => self.state = ConnState::Closing,
            ConnState::Draining | ConnState::Closing => {}
        }
    }

    /// Closes the connection on the next poll, discarding unsent data.
    pub fn close(&mut self) {
        self.state = ConnState::Closing;
    }

    /// Reports a fatal error: fires [`Event::Error`] and closes the
    /// connection. Does nothing once the connection is closing.
    pub fn fail(&mut self, reason: impl fmt::Display) {
        let msg = reason.to_string();
        if self.state == ConnState::Closing {
            log::debug!("{} already closing: {msg}", self.id);
            return;
        }
        log::error!("{} {msg}", self.id);
        self.state = ConnState::Closing;
        self.queue_event(Deferred::Error(msg));
    }

    /// Delivers `payload` as [`Event::Protocol`] to every handler of this
    /// connection, after the current event when called from a handler.
    pub fn emit<T: Any>(&mut self, payload: T) {
        self.queue_event(Deferred::Protocol(Box::new(payload)));
    }

    /// Installs a TLS session.
    ///
    /// On an established connection the handshake starts on the next poll;
    /// on one still resolving or connecting it starts once connected.
    pub fn start_tls(&mut self, session: Box<dyn TlsSession>) -> Result<()> {
        if self.udp || self.state == ConnState::Listening {
            return Err(Error::ErrTls(
                "sessions attach to TCP streams only".to_owned(),
            ));
        }
        if self.tls.is_some() {
            return Err(Error::ErrTls("session already installed".to_owned()));
        }
        self.tls = Some(session);
        match self.state {
            ConnState::Ready => self.state = ConnState::TlsHandshaking,
            ConnState::Draining => {
                self.drain_on_ready = true;
                self.state = ConnState::TlsHandshaking;
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn set_state(&mut self, state: ConnState) {
        self.state = state;
    }

    pub(crate) fn set_client(&mut self) {
        self.client = true;
    }

    pub(crate) fn set_accepted(&mut self) {
        self.accepted = true;
    }

    /// Adopts `socket`, refreshing the local address.
    pub(crate) fn attach(&mut self, socket: Socket) {
        if let Ok(local) = socket.local_addr() {
            self.local = local;
        }
        self.socket = Some(socket);
    }

    /// Leaves the waiting states once the transport is usable.
    pub(crate) fn become_ready(&mut self) {
        self.state = if self.tls.is_some() && !self.tls_established {
            ConnState::TlsHandshaking
        } else if self.drain_on_ready {
            ConnState::Draining
        } else {
            ConnState::Ready
        };
    }

    pub(crate) fn wants_read(&self) -> bool {
        self.socket.is_some()
            && !matches!(self.state, ConnState::Resolving | ConnState::Closing)
    }

    pub(crate) fn wants_write(&self) -> bool {
        if self.socket.is_none() {
            return false;
        }
        match self.state {
            ConnState::Connecting | ConnState::TlsHandshaking => true,
            ConnState::Ready | ConnState::Draining => !self.send.is_empty(),
            ConnState::Listening => self.udp && !self.send.is_empty(),
            ConnState::Resolving | ConnState::Closing => false,
        }
    }

    /// Whether the next poll step would make progress without waiting.
    pub(crate) fn has_pending_work(&self) -> bool {
        !self.deferred.is_empty()
            || self.state == ConnState::Closing
            || (self.state == ConnState::Draining && self.send.is_empty())
            || (self.readable && self.wants_read())
            || (self.writable && self.wants_write())
            || self.tls.as_ref().is_some_and(|tls| tls.pending() > 0)
    }

    fn queue_event(&mut self, event: Deferred) {
        self.deferred.push_back(event);
        if !self.dispatching {
            self.flush_deferred();
        }
    }

    /// Fires `event`, then anything the handlers raised meanwhile.
    pub(crate) fn call(&mut self, event: &Event<'_>) {
        self.dispatch(event);
        self.flush_deferred();
    }

    pub(crate) fn flush_deferred(&mut self) {
        while let Some(event) = self.deferred.pop_front() {
            match event {
                Deferred::Error(msg) => self.dispatch(&Event::Error(&msg)),
                Deferred::Write(n) => self.dispatch(&Event::Write(n)),
                Deferred::Protocol(payload) => self.dispatch(&Event::Protocol(&*payload)),
            }
        }
    }

    /// Fires the final [`Event::Close`]. Nothing is delivered afterwards.
    pub(crate) fn call_close(&mut self) {
        self.flush_deferred();
        self.dispatch(&Event::Close);
        self.closed = true;
        self.deferred.clear();
    }

    fn dispatch(&mut self, event: &Event<'_>) {
        if self.closed {
            return;
        }
        if !matches!(event, Event::Poll(_)) {
            log::trace!("{} {event}", self.id);
        }

        let handlers = std::mem::take(&mut self.handlers);
        self.dispatching = true;
        self.front_added = 0;
        for handler in &handlers {
            match handler.try_borrow_mut() {
                Ok(mut handler) => handler.handle_event(self, event),
                Err(_) => log::warn!("{} handler busy, {event} not delivered", self.id),
            }
        }
        self.dispatching = false;

        let mut added = std::mem::replace(&mut self.handlers, handlers);
        if !added.is_empty() {
            let back = added.split_off(self.front_added);
            added.append(&mut self.handlers);
            added.extend(back);
            self.handlers = added;
        }
        self.front_added = 0;
    }

    fn log_io(&self, dir: &str, data: &[u8]) {
        log::trace!("{} {dir} {} bytes", self.id, data.len());
        if self.hexdump {
            log::info!(
                "{} {} {dir} {} {} bytes\n{}",
                self.id,
                self.local,
                self.peer,
                data.len(),
                hex::encode(data)
            );
        }
    }

    /// Probes a pending TCP connect.
    pub(crate) fn connect_step(&mut self) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        match socket.connect_result() {
            Ok(false) => {
                self.readable = false;
                self.writable = false;
            }
            Ok(true) => {
                if let Ok(local) = socket.local_addr() {
                    self.local = local;
                }
                log::debug!("{} {} connected to {}", self.id, self.local, self.peer);
                self.become_ready();
                self.call(&Event::Connect);
                if self.state == ConnState::TlsHandshaking {
                    self.handshake_step();
                }
            }
            Err(err) => self.fail(Error::ErrSocketError(err.to_string())),
        }
    }

    /// Drives the TLS handshake one step.
    pub(crate) fn handshake_step(&mut self) {
        let (Some(tls), Some(socket)) = (self.tls.as_mut(), self.socket.as_mut()) else {
            return;
        };
        match tls.handshake(socket) {
            Ok(true) => {
                log::debug!("{} TLS handshake done", self.id);
                self.tls_established = true;
                // readiness may have been consumed while waiting; retry writes
                self.writable = true;
                self.state = if self.drain_on_ready {
                    ConnState::Draining
                } else {
                    ConnState::Ready
                };
            }
            Ok(false) => {
                self.readable = false;
                self.writable = false;
            }
            Err(err) => self.fail(err),
        }
    }

    /// Reads once into `scratch`, appends to `recv` and fires
    /// [`Event::Read`]. With TLS, keeps going while the session holds
    /// decrypted data.
    pub(crate) fn read_step(&mut self, scratch: &mut [u8], max_recv_buf_size: usize) {
        loop {
            if self.recv.len() >= max_recv_buf_size {
                self.fail(Error::ErrMaxRecvBufSize);
                return;
            }

            let tls = self.tls.is_some();
            let res: Result<usize> = match (self.tls.as_mut(), self.socket.as_mut()) {
                (_, None) => return,
                (Some(session), Some(socket)) => session.recv(socket, scratch),
                (None, Some(socket)) if self.udp => match socket.recv_from(scratch) {
                    Ok((n, from)) => {
                        self.peer = from;
                        Ok(n)
                    }
                    Err(err) => Err(err.into()),
                },
                (None, Some(socket)) => RawIo::read(socket, scratch).map_err(Error::from),
            };

            let n = match res {
                Ok(0) if tls => {
                    self.readable = false;
                    return;
                }
                Ok(0) if self.udp => return,
                Ok(0) => {
                    log::debug!("{} closed by peer", self.id);
                    self.state = ConnState::Closing;
                    return;
                }
                Ok(n) => n,
                Err(err) if err.is_would_block() => {
                    self.readable = false;
                    return;
                }
                Err(err) => {
                    self.fail(err);
                    return;
                }
            };

            let data = &scratch[..n];
            self.log_io("<-", data);
            if let Err(err) = self.recv.append(data) {
                self.fail(err);
                return;
            }
            self.call(&Event::Read(data));

            let more = self
                .tls
                .as_ref()
                .is_some_and(|session| session.pending() > 0);
            if !more || self.state == ConnState::Closing {
                return;
            }
        }
    }

    /// Writes as much of `send` as the transport takes and fires
    /// [`Event::Write`].
    pub(crate) fn write_step(&mut self) {
        if self.send.is_empty() {
            return;
        }
        let res: Result<usize> = match (self.tls.as_mut(), self.socket.as_mut()) {
            (_, None) => return,
            (Some(session), Some(socket)) => session.send(socket, self.send.as_slice()),
            (None, Some(socket)) if self.udp => socket
                .send_to(self.send.as_slice(), self.peer)
                .map_err(Error::from),
            (None, Some(socket)) => RawIo::write(socket, self.send.as_slice()).map_err(Error::from),
        };

        match res {
            Ok(0) => self.writable = false,
            Ok(n) => {
                let n = n.min(self.send.len());
                self.log_io("->", &self.send.as_slice()[..n]);
                self.call(&Event::Write(n));
                self.send.delete(0, n);
            }
            Err(err) if err.is_would_block() => self.writable = false,
            Err(err) => self.fail(err),
        }
    }

    /// Tears down the transport: frees the TLS session and hands the socket
    /// back for deregistration.
    pub(crate) fn release(&mut self) -> Option<Socket> {
        if let Some(mut session) = self.tls.take() {
            session.free();
        }
        self.recv.clear();
        self.send.clear();
        self.socket.take()
    }
}
