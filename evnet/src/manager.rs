#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use dns::{Resolver, ResolverEvent};
use sansio::Protocol;
use shared::error::{Error, Result};
use shared::{TaggedBytesMut, TransportContext, TransportProtocol};
use slab::Slab;

use crate::config::ManagerConfig;
use crate::connection::state::ConnState;
use crate::connection::{Connection, ConnectionId};
use crate::event::{Event, SharedHandler, shared_handler};
use crate::mdns::MdnsResponder;
use crate::poller::{Poller, Readiness};
use crate::socket::{Socket, set_stream_options};
use crate::timer::{TimerFlags, TimerId, Timers};
use crate::url::Url;

/// The connection engine.
///
/// A `Manager` owns every connection, the timer list and the DNS resolver.
/// Nothing happens in the background: each call to [`poll`](Self::poll)
/// waits for readiness, fires due timers and advances every connection by
/// at most one step, delivering events to their handlers.
///
/// Connections are visited newest first.
///
/// ```rust,no_run
/// use evnet::{Event, Manager, ManagerConfig};
///
/// let mut mgr = Manager::new(ManagerConfig::default()).unwrap();
/// mgr.listen("tcp://0.0.0.0:8000", |conn, event| {
///     if let Event::Read(data) = event {
///         let _ = conn.send(data);
///         let n = conn.recv().len();
///         conn.recv_mut().delete(0, n);
///     }
/// })
/// .unwrap();
/// loop {
///     mgr.poll(1000);
/// }
/// ```
pub struct Manager {
    config: ManagerConfig,
    poller: Poller,
    ready: Vec<Readiness>,

    conns: Slab<Connection>,
    // slab keys, newest first
    order: Vec<usize>,
    ids: HashMap<ConnectionId, usize>,
    next_id: u64,

    resolver: Resolver,
    resolver_conn: Option<ConnectionId>,

    timers: Timers,
    scratch: Vec<u8>,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let scratch = vec![0u8; config.io_size.max(1)];
        Ok(Self {
            poller: Poller::new()?,
            ready: Vec::new(),
            conns: Slab::new(),
            order: Vec::new(),
            ids: HashMap::new(),
            next_id: 1,
            resolver: Resolver::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53)),
            resolver_conn: None,
            timers: Timers::new(),
            scratch,
            config,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Changes the configuration. The resolver address is picked up the
    /// next time the resolver connection is created.
    pub fn config_mut(&mut self) -> &mut ManagerConfig {
        &mut self.config
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.ids.get(&id).and_then(|&key| self.conns.get(key))
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.ids.get(&id).and_then(|&key| self.conns.get_mut(key))
    }

    /// Ids of all live connections, newest first.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.order
            .iter()
            .filter_map(|&key| self.conns.get(key).map(|c| c.id()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The UDP connection carrying DNS queries, once one was needed.
    pub fn resolver_connection(&self) -> Option<ConnectionId> {
        self.resolver_conn
    }

    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    pub fn add_timer<F>(&mut self, period_ms: u64, flags: TimerFlags, callback: F) -> TimerId
    where
        F: FnMut() + 'static,
    {
        self.timers.add(period_ms, flags, callback)
    }

    pub fn remove_timer(&mut self, id: TimerId) -> bool {
        self.timers.remove(id)
    }

    /// Opens a listener on `url`, which must name an IP address (or no host
    /// for all addresses). TCP listeners accept connections that share
    /// `handler`; UDP listeners receive datagrams from anyone.
    pub fn listen<F>(&mut self, url: &str, handler: F) -> Result<ConnectionId>
    where
        F: FnMut(&mut Connection, &Event<'_>) + 'static,
    {
        let url = Url::parse(url)?;
        let addr = url
            .literal_addr()
            .ok_or_else(|| Error::ErrInvalidUrl(format!("{url}: cannot listen on a host name")))?;
        let socket = if url.is_udp() {
            Socket::bind_udp(addr)?
        } else {
            Socket::listen_tcp(addr, self.config.listen_backlog)?
        };
        self.open_listener(socket, url.is_udp(), shared_handler(handler))
    }

    /// Answers multicast DNS queries for `name` (`.local` is appended when
    /// missing) with `ip`.
    ///
    /// The listener joins the multicast DNS group on all interfaces. More
    /// handlers can be attached to it through
    /// [`connection_mut`](Self::connection_mut).
    pub fn mdns_listen(&mut self, name: &str, ip: Ipv4Addr) -> Result<ConnectionId> {
        let socket = Socket::mdns(Ipv4Addr::UNSPECIFIED)?;
        let responder = MdnsResponder::new(name, ip);
        log::debug!("mDNS responder for {} at {ip}", responder.name());
        self.open_listener(socket, true, shared_handler(responder))
    }

    fn open_listener(
        &mut self,
        socket: Socket,
        udp: bool,
        handler: SharedHandler,
    ) -> Result<ConnectionId> {
        let key = self.alloc(udp);
        let conn = &mut self.conns[key];
        conn.attach(socket);
        conn.set_state(ConnState::Listening);
        conn.add_handler(handler);
        if let Err(err) = self.register(key) {
            self.discard(key);
            return Err(err.into());
        }

        let conn = &mut self.conns[key];
        log::debug!(
            "{} listening on {}://{}",
            conn.id(),
            if udp { "udp" } else { "tcp" },
            conn.local()
        );
        conn.call(&Event::Open);
        Ok(conn.id())
    }

    /// Opens an outbound connection to `url`.
    ///
    /// `Open` fires before this returns. Literal addresses and `localhost`
    /// are used as is; other host names go through the resolver first.
    /// UDP connections fire `Resolve` and `Connect` as soon as the address
    /// is known; TCP connections fire `Connect` once the handshake
    /// completes. Failures after `Open` are reported as `Error` then
    /// `Close`; only URL errors are returned here.
    pub fn connect<F>(&mut self, url: &str, handler: F) -> Result<ConnectionId>
    where
        F: FnMut(&mut Connection, &Event<'_>) + 'static,
    {
        let url = Url::parse(url)?;
        let key = self.alloc(url.is_udp());
        let conn = &mut self.conns[key];
        conn.set_client();
        conn.set_state(ConnState::Resolving);
        conn.set_peer(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            url.port(),
        ));
        conn.add_handler(shared_handler(handler));
        log::debug!("{} connecting to {url}", conn.id());
        conn.call(&Event::Open);

        let id = conn.id();
        if conn.is_closing() {
            return Ok(id);
        }
        match url.literal_addr() {
            Some(addr) => {
                conn.set_peer(addr);
                self.connect_resolved(key);
            }
            None => self.resolve(key, url.host()),
        }
        Ok(id)
    }

    /// Runs one iteration of the engine, waiting at most `timeout_ms` for
    /// readiness. The wait is skipped when some connection can already make
    /// progress.
    pub fn poll(&mut self, timeout_ms: u64) {
        let timeout = self.poll_timeout(Duration::from_millis(timeout_ms));

        let mut ready = std::mem::take(&mut self.ready);
        ready.clear();
        self.poller.wait(timeout, &mut ready);
        for r in &ready {
            if let Some(conn) = self.conns.get_mut(r.key) {
                conn.readable |= r.readable;
                conn.writable |= r.writable;
            }
        }
        self.ready = ready;

        let now = shared::time::millis();
        self.timers.poll(now);

        let snapshot: Vec<(usize, ConnectionId)> = self
            .order
            .iter()
            .filter_map(|&key| self.conns.get(key).map(|c| (key, c.id())))
            .collect();
        for (key, id) in snapshot {
            // closed earlier in this iteration
            if self.conns.get(key).map(|c| c.id()) != Some(id) {
                continue;
            }
            self.step(key, now);
        }
    }

    /// Marks every connection closing and tears them all down, firing
    /// `Close` on each. Also drops all timers.
    pub fn close_all(&mut self) {
        let keys = self.order.clone();
        for &key in &keys {
            if let Some(conn) = self.conns.get_mut(key) {
                conn.close();
            }
        }
        for key in keys {
            if self.conns.contains(key) {
                self.close_conn(key);
            }
        }
        self.timers.clear();
    }

    fn poll_timeout(&mut self, max: Duration) -> Duration {
        if self.conns.iter().any(|(_, c)| c.has_pending_work()) {
            return Duration::ZERO;
        }
        let mut timeout = max;
        if let Some(due) = self.timers.next_due_in(shared::time::millis()) {
            timeout = timeout.min(Duration::from_millis(due));
        }
        if let Some(deadline) = self.resolver.poll_timeout() {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }
        timeout
    }

    fn alloc(&mut self, udp: bool) -> usize {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let key = self
            .conns
            .insert(Connection::new(id, udp, self.config.io_size));
        self.order.insert(0, key);
        self.ids.insert(id, key);
        key
    }

    fn register(&mut self, key: usize) -> io::Result<()> {
        let conn = &mut self.conns[key];
        let listener = conn.is_listening() && !conn.is_udp();
        match conn.socket.as_mut() {
            Some(socket) => self.poller.register(socket.source(), key, listener),
            None => Ok(()),
        }
    }

    fn unlink(&mut self, key: usize) {
        let mut conn = self.conns.remove(key);
        if let Some(mut socket) = conn.release() {
            if let Err(err) = self.poller.deregister(socket.source()) {
                log::trace!("{} deregister: {err}", conn.id());
            }
        }
        self.order.retain(|&k| k != key);
        self.ids.remove(&conn.id());
    }

    // Drops a connection that never fired Open.
    fn discard(&mut self, key: usize) {
        self.unlink(key);
    }

    fn close_conn(&mut self, key: usize) {
        let id = self.conns[key].id();
        self.resolver.cancel(id.as_u64());
        if self.resolver_conn == Some(id) {
            self.resolver_conn = None;
            if let Err(err) = self.resolver.close() {
                log::warn!("{id} resolver close: {err}");
            }
            self.drain_resolver_events();
        }

        log::debug!("{id} closed");
        self.conns[key].call_close();
        self.unlink(key);
    }

    fn step(&mut self, key: usize, now: u64) {
        let id = self.conns[key].id();
        let is_resolver = self.resolver_conn == Some(id);

        let conn = &mut self.conns[key];
        conn.flush_deferred();
        conn.call(&Event::Poll(now));
        if is_resolver {
            if let Err(err) = self.resolver.handle_timeout(Instant::now()) {
                log::warn!("{id} resolver timeout: {err}");
            }
            self.drain_resolver_events();
        }

        let max_recv_buf_size = self.config.max_recv_buf_size;
        let conn = &mut self.conns[key];
        match conn.state() {
            ConnState::Resolving | ConnState::Closing => {}
            ConnState::Listening if !conn.is_udp() => {
                if conn.readable {
                    self.accept(key);
                }
            }
            ConnState::Connecting => {
                if conn.readable || conn.writable {
                    conn.connect_step();
                }
            }
            ConnState::TlsHandshaking => {
                if conn.readable || conn.writable {
                    conn.handshake_step();
                }
            }
            _ => {
                if conn.readable {
                    conn.read_step(&mut self.scratch, max_recv_buf_size);
                }
                if is_resolver {
                    self.feed_resolver(key);
                }
                let conn = &mut self.conns[key];
                if conn.writable && !conn.is_closing() {
                    conn.write_step();
                }
            }
        }

        let conn = &mut self.conns[key];
        if conn.state() == ConnState::Draining && conn.send_buf().is_empty() {
            conn.set_state(ConnState::Closing);
        }
        if conn.is_closing() {
            self.close_conn(key);
        }
    }

    fn accept(&mut self, key: usize) {
        let listener = &mut self.conns[key];
        let Some(socket) = listener.socket.as_ref() else {
            return;
        };
        let (stream, peer) = match socket.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                listener.readable = false;
                return;
            }
            // readiness is edge-triggered; stay readable so the next poll retries
            Err(err) => {
                log::error!("{} accept: {err}", listener.id());
                return;
            }
        };
        let listener_id = listener.id();
        let handlers = listener.handlers.clone();
        let hexdump = listener.hexdump();

        if let Err(err) = set_stream_options(&stream) {
            log::debug!("{listener_id} socket options for {peer}: {err}");
        }

        let new_key = self.alloc(false);
        let conn = &mut self.conns[new_key];
        conn.handlers = handlers;
        conn.set_hexdump(hexdump);
        conn.set_accepted();
        conn.set_peer(peer);
        conn.attach(Socket::Stream(stream));
        conn.set_state(ConnState::Ready);
        if let Err(err) = self.register(new_key) {
            log::error!("{listener_id} accept {peer}: {err}");
            self.discard(new_key);
            return;
        }

        let conn = &mut self.conns[new_key];
        log::debug!("{} accepted {} on {listener_id}", conn.id(), peer);
        conn.call(&Event::Open);
        conn.call(&Event::Accept);
    }

    /// Creates the transport once the peer address is known.
    fn connect_resolved(&mut self, key: usize) {
        let conn = &mut self.conns[key];
        let peer = conn.peer();
        if conn.is_udp() {
            match Socket::connect_udp(peer) {
                Ok(socket) => conn.attach(socket),
                Err(err) => {
                    conn.fail(Error::ErrSocketError(format!("socket: {err}")));
                    return;
                }
            }
        } else {
            match Socket::connect_tcp(peer) {
                Ok(socket) => conn.attach(socket),
                Err(err) => {
                    conn.fail(Error::ErrSocketError(format!("connect: {err}")));
                    return;
                }
            }
        }
        if let Err(err) = self.register(key) {
            self.conns[key].fail(Error::ErrSocketError(format!("register: {err}")));
            return;
        }

        let conn = &mut self.conns[key];
        if conn.is_udp() {
            conn.become_ready();
            conn.call(&Event::Resolve);
            conn.call(&Event::Connect);
        } else {
            log::debug!("{} {} -> {} pending", conn.id(), conn.local(), peer);
            conn.set_state(ConnState::Connecting);
            conn.call(&Event::Resolve);
        }
    }

    fn resolve(&mut self, key: usize, host: &str) {
        let resolver_key = match self.resolver_key() {
            Ok(resolver_key) => resolver_key,
            Err(err) => {
                self.conns[key].fail(err);
                return;
            }
        };

        let id = self.conns[key].id();
        match self.resolver.query(
            id.as_u64(),
            host,
            Instant::now(),
            self.config.resolve_timeout,
        ) {
            Ok(txid) => log::debug!(
                "{id} resolving {host} @ {}, txid {txid}",
                self.resolver.server()
            ),
            Err(err) => {
                self.conns[key].fail(err);
                return;
            }
        }

        let dns = &mut self.conns[resolver_key];
        while let Some(transmit) = self.resolver.poll_write() {
            dns.set_peer(transmit.transport.peer_addr);
            if let Err(err) = dns.send(&transmit.message) {
                dns.fail(Error::ErrSocketError(format!("DNS send: {err}")));
                break;
            }
        }
    }

    /// The resolver connection, created on first use.
    fn resolver_key(&mut self) -> Result<usize> {
        if let Some(key) = self.resolver_conn.and_then(|id| self.ids.get(&id).copied()) {
            return Ok(key);
        }

        let url = Url::parse(&self.config.resolver_url)?;
        let server = match url.literal_addr() {
            Some(server) if url.is_udp() && !url.host().is_empty() => server,
            _ => return Err(Error::ErrInvalidResolver(self.config.resolver_url.clone())),
        };
        let socket = Socket::connect_udp(server)?;

        let key = self.alloc(true);
        let conn = &mut self.conns[key];
        conn.set_client();
        conn.set_label("resolver");
        conn.set_peer(server);
        conn.attach(socket);
        if let Err(err) = self.register(key) {
            self.discard(key);
            return Err(err.into());
        }

        let conn = &mut self.conns[key];
        conn.become_ready();
        let id = conn.id();
        log::debug!("{id} resolver connection to {server}");
        conn.call(&Event::Open);
        conn.call(&Event::Resolve);
        conn.call(&Event::Connect);

        self.resolver.set_server(server);
        self.resolver_conn = Some(id);
        Ok(key)
    }

    fn feed_resolver(&mut self, key: usize) {
        let conn = &mut self.conns[key];
        // reads record the sender as peer; queries only ever go to the server
        let from = conn.peer();
        conn.set_peer(self.resolver.server());
        if conn.recv().is_empty() {
            return;
        }
        let msg = TaggedBytesMut {
            now: Instant::now(),
            transport: TransportContext {
                local_addr: conn.local(),
                peer_addr: from,
                transport_protocol: TransportProtocol::UDP,
            },
            message: BytesMut::from(conn.recv().as_slice()),
        };
        conn.recv_mut().clear();

        if let Err(err) = self.resolver.handle_read(msg) {
            log::warn!("{} resolver: {err}", conn.id());
        }
        self.drain_resolver_events();
    }

    fn drain_resolver_events(&mut self) {
        while let Some(event) = self.resolver.poll_event() {
            let owner = ConnectionId(event.owner());
            let Some(&key) = self.ids.get(&owner) else {
                log::debug!("{owner} gone before its lookup finished");
                continue;
            };
            let conn = &mut self.conns[key];
            match event {
                ResolverEvent::Resolved { name, addr, .. } => {
                    if !conn.is_resolving() {
                        log::debug!("{owner} {name} already resolved");
                        continue;
                    }
                    log::debug!("{owner} {name} is {addr}");
                    let port = conn.peer().port();
                    conn.set_peer(SocketAddr::new(IpAddr::V4(addr), port));
                    self.connect_resolved(key);
                }
                ResolverEvent::NotFound { name, .. } => conn.fail(Error::ErrDnsLookupFailed(name)),
                ResolverEvent::TimedOut { name, .. } => conn.fail(Error::ErrDnsTimeout(name)),
                ResolverEvent::Aborted { .. } => conn.fail(Error::ErrResolverClosed),
            }
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.close_all();
    }
}
