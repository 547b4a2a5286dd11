//! Sans-I/O DNS resolver.
//!
//! [`Resolver`] tracks outstanding queries for many owners over a single UDP
//! flow. It implements [`sansio::Protocol`]: the caller hands it datagrams
//! received from the DNS server through
//! [`handle_read()`](sansio::Protocol::handle_read), sends whatever
//! [`poll_write()`](sansio::Protocol::poll_write) returns to the server, calls
//! [`handle_timeout()`](sansio::Protocol::handle_timeout) periodically and
//! acts on [`ResolverEvent`]s from [`poll_event()`](sansio::Protocol::poll_event).
//!
//! ```rust
//! use evnet_dns::{Resolver, ResolverEvent};
//! use sansio::Protocol;
//! use std::time::{Duration, Instant};
//!
//! let mut resolver = Resolver::new("8.8.8.8:53".parse().unwrap());
//! let now = Instant::now();
//! let txid = resolver.query(42, "example.com", now, Duration::from_secs(3)).unwrap();
//!
//! let packet = resolver.poll_write().expect("query datagram");
//! assert_eq!(packet.transport.peer_addr.to_string(), "8.8.8.8:53");
//! assert_eq!(&packet.message[..2], &txid.to_be_bytes());
//!
//! resolver.handle_timeout(now + Duration::from_secs(4)).unwrap();
//! assert!(matches!(
//!     resolver.poll_event(),
//!     Some(ResolverEvent::TimedOut { owner: 42, .. })
//! ));
//! ```

use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use shared::error::{Error, Result};
use shared::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};

use crate::message::Message;
use crate::message::builder::build_query;

/// Identifies whoever is waiting on a query; the engine uses connection ids.
pub type OwnerId = u64;

/// A pending query.
#[derive(Debug, Clone)]
pub struct Query {
    /// Transaction id carried in the request header.
    pub txid: u16,
    /// Who is waiting for the answer.
    pub owner: OwnerId,
    /// The name being resolved, as given by the caller.
    pub name: String,
    /// When the query fails if still unanswered.
    pub deadline: Instant,
}

/// Outcomes reported by the resolver.
///
/// Each pending query yields exactly one event, after which it is no longer
/// tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    /// The server answered with an IPv4 address.
    Resolved {
        owner: OwnerId,
        txid: u16,
        name: String,
        addr: Ipv4Addr,
    },
    /// The server answered without an IPv4 address.
    NotFound {
        owner: OwnerId,
        txid: u16,
        name: String,
    },
    /// No answer arrived before the deadline.
    TimedOut {
        owner: OwnerId,
        txid: u16,
        name: String,
    },
    /// The resolver was closed while the query was pending.
    Aborted {
        owner: OwnerId,
        txid: u16,
        name: String,
    },
}

impl ResolverEvent {
    pub fn owner(&self) -> OwnerId {
        match self {
            ResolverEvent::Resolved { owner, .. }
            | ResolverEvent::NotFound { owner, .. }
            | ResolverEvent::TimedOut { owner, .. }
            | ResolverEvent::Aborted { owner, .. } => *owner,
        }
    }
}

/// Sans-I/O DNS client shared by every lookup of one engine.
///
/// Transaction ids come from a plain counter that starts at 1, wraps around
/// and never yields 0. They are predictable; do not rely on them against an
/// on-path attacker.
pub struct Resolver {
    server: SocketAddr,
    queries: Vec<Query>,
    next_txid: u16,
    write_outs: VecDeque<TaggedBytesMut>,
    event_outs: VecDeque<ResolverEvent>,
}

impl Resolver {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            queries: Vec::new(),
            next_txid: 1,
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Changes the server future queries are addressed to.
    pub fn set_server(&mut self, server: SocketAddr) {
        self.server = server;
    }

    /// The transaction id the next query will use.
    ///
    /// Ids are sequential and therefore predictable; replies are only
    /// accepted from [`server()`](Resolver::server).
    pub fn next_txid(&self) -> u16 {
        self.next_txid
    }

    /// Starts a lookup of `name` on behalf of `owner` and queues the request
    /// datagram. Returns the transaction id.
    ///
    /// Fails without queuing anything if `name` cannot be encoded.
    pub fn query(
        &mut self,
        owner: OwnerId,
        name: &str,
        now: Instant,
        timeout: Duration,
    ) -> Result<u16> {
        let txid = self.next_txid;
        let raw = build_query(txid, name)?;
        self.next_txid = match self.next_txid.wrapping_add(1) {
            0 => 1,
            n => n,
        };

        self.queries.push(Query {
            txid,
            owner,
            name: name.to_owned(),
            deadline: now + timeout,
        });

        log::debug!("resolver: query {txid:#06x} for {name} (owner {owner})");
        self.write_outs.push_back(TransportMessage {
            now,
            transport: TransportContext {
                peer_addr: self.server,
                transport_protocol: TransportProtocol::UDP,
                ..Default::default()
            },
            message: BytesMut::from(&raw[..]),
        });

        Ok(txid)
    }

    /// Drops every query owned by `owner` without emitting events.
    pub fn cancel(&mut self, owner: OwnerId) {
        self.queries.retain(|q| q.owner != owner);
    }

    pub fn is_pending(&self, owner: OwnerId) -> bool {
        self.queries.iter().any(|q| q.owner == owner)
    }

    pub fn pending_query_count(&self) -> usize {
        self.queries.len()
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    fn process_message(&mut self, data: &[u8]) {
        let msg = match Message::unpack(data) {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!(
                    "resolver: unexpected DNS response ({err}): {}",
                    hex::encode(data)
                );
                return;
            }
        };

        if !msg.header.response {
            log::warn!("resolver: ignoring DNS query {:#06x}", msg.header.id);
            return;
        }

        let txid = msg.header.id;
        let Some(pos) = self.queries.iter().position(|q| q.txid == txid) else {
            log::warn!("resolver: stray DNS reply {txid:#06x}");
            return;
        };

        let Query {
            owner, name, txid, ..
        } = self.queries.remove(pos);
        let event = match msg.ipv4() {
            Some(addr) => {
                log::debug!("resolver: {name} is {addr} (owner {owner})");
                ResolverEvent::Resolved {
                    owner,
                    txid,
                    name,
                    addr,
                }
            }
            None => {
                log::debug!("resolver: no address for {name} (owner {owner})");
                ResolverEvent::NotFound { owner, txid, name }
            }
        };
        self.event_outs.push_back(event);
    }
}

impl sansio::Protocol<TaggedBytesMut, (), ()> for Resolver {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = ResolverEvent;
    type Error = Error;
    type Time = Instant;

    /// Process a datagram from the DNS server.
    ///
    /// Datagrams from anywhere but the configured server, malformed
    /// datagrams and replies that match no pending query are logged and
    /// dropped; they never fail the resolver.
    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if msg.transport.peer_addr != self.server {
            log::warn!(
                "resolver: ignoring {} bytes from {}, expected {}",
                msg.message.len(),
                msg.transport.peer_addr,
                self.server
            );
            return Ok(());
        }
        self.process_message(&msg.message);
        Ok(())
    }

    /// Answers are delivered through `poll_event()`.
    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Queries are started with [`query()`](Resolver::query).
    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    /// Get the next datagram to send to the server.
    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    /// Expire every query whose deadline has passed.
    fn handle_timeout(&mut self, now: Self::Time) -> Result<()> {
        let mut i = 0;
        while i < self.queries.len() {
            if self.queries[i].deadline > now {
                i += 1;
                continue;
            }
            let Query {
                owner, name, txid, ..
            } = self.queries.remove(i);
            log::debug!("resolver: query {txid:#06x} for {name} timed out");
            self.event_outs
                .push_back(ResolverEvent::TimedOut { owner, txid, name });
        }
        Ok(())
    }

    /// The earliest deadline among pending queries.
    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.queries.iter().map(|q| q.deadline).min()
    }

    /// Abandon every pending query.
    ///
    /// Each one is reported as [`ResolverEvent::Aborted`] so its owner can be
    /// told. Queued datagrams are dropped. The transaction id counter keeps
    /// its value, and the resolver accepts new queries afterwards.
    fn close(&mut self) -> Result<()> {
        self.write_outs.clear();
        for Query {
            owner, name, txid, ..
        } in self.queries.drain(..)
        {
            self.event_outs
                .push_back(ResolverEvent::Aborted { owner, txid, name });
        }
        Ok(())
    }
}

#[cfg(test)]
mod resolver_test;
