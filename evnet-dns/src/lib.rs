//! # evnet-dns
//!
//! DNS support for the evnet connection engine.
//!
//! The crate has two halves:
//!
//! - a small DNS wire codec ([`Message`], [`Question`], [`Resource`]). Its
//!   decoder is built for untrusted input: datagrams outside the 12..=512
//!   byte range are rejected, as are messages declaring more than two
//!   questions or five answers, and compression pointers are followed at
//!   most five levels deep.
//! - [`Resolver`], a sans-I/O DNS client implementing [`sansio::Protocol`].
//!   It multiplexes any number of lookups over one UDP flow. The caller owns
//!   the socket and the clock.
//!
//! ## Building a query
//!
//! ```rust
//! use evnet_dns::{Message, build_query};
//!
//! let raw = build_query(1, "example.com").unwrap();
//! let msg = Message::unpack(&raw).unwrap();
//! assert_eq!(msg.questions.len(), 2);
//! assert!(msg.header.recursion_desired);
//! ```
//!
//! ## Event loop pattern
//!
//! ```rust,ignore
//! loop {
//!     while let Some(pkt) = resolver.poll_write() {
//!         socket.send_to(&pkt.message, pkt.transport.peer_addr)?;
//!     }
//!     // read a datagram, then
//!     resolver.handle_read(tagged_datagram)?;
//!     resolver.handle_timeout(Instant::now())?;
//!     while let Some(event) = resolver.poll_event() {
//!         // ResolverEvent::Resolved / NotFound / TimedOut / Aborted
//!     }
//! }
//! ```

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub(crate) mod message;
pub(crate) mod resolver;

pub use message::builder::{MDNS_RESPONSE_TTL, build_mdns_answer, build_query};
pub use message::header::Header;
pub use message::name::Name;
pub use message::question::Question;
pub use message::resource::{Resource, ResourceBody, ResourceHeader};
pub use message::{
    DNSCLASS_ANY, DNSCLASS_INET, DnsClass, DnsType, HEADER_LEN, MAX_ANSWERS, MAX_MESSAGE_LEN,
    MAX_QUESTIONS, Message, OpCode, RCode,
};
pub use resolver::{OwnerId, Query, Resolver, ResolverEvent};
