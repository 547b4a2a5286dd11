//! # evnet
//!
//! A single-threaded, event-driven connection engine.
//!
//! A [`Manager`] multiplexes TCP and UDP sockets and drives each
//! [`Connection`] through a small state machine
//! ([`ConnState`]). Protocol layers and applications observe connections
//! through [`EventHandler`]s, which receive an [`Event`] for every step of a
//! connection's life:
//!
//! ```text
//! Open -> Resolve? -> Connect | Accept -> {Read, Write, Poll}* -> Error? -> Close
//! ```
//!
//! There are no background threads. Everything happens inside
//! [`Manager::poll`], which the application calls in a loop:
//!
//! - host names are resolved by a built-in asynchronous DNS client before
//!   connecting, multiplexed over a single UDP connection;
//! - timers ([`Timers`]) are owned by the manager and fired from the loop;
//! - receive and send queues are [`IoBuf`]s that grow in fixed quanta;
//! - TLS plugs in through the [`TlsSession`] hooks.
//!
//! ## Example
//!
//! ```rust,no_run
//! use evnet::{Event, Manager, ManagerConfig};
//!
//! let mut mgr = Manager::new(ManagerConfig::default()).unwrap();
//! mgr.connect("tcp://example.com:80", |conn, event| match event {
//!     Event::Connect => {
//!         let _ = conn.send(b"GET / HTTP/1.0\r\n\r\n");
//!     }
//!     Event::Read(data) => println!("{}", String::from_utf8_lossy(data)),
//!     Event::Error(msg) => eprintln!("{msg}"),
//!     _ => {}
//! })
//! .unwrap();
//!
//! for _ in 0..50 {
//!     mgr.poll(100);
//! }
//! ```

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod config;
pub mod connection;
pub mod event;
pub mod iobuf;
pub mod manager;
pub mod mdns;
pub(crate) mod poller;
pub(crate) mod socket;
pub mod timer;
pub mod tls;
pub mod url;

pub use config::ManagerConfig;
pub use connection::state::ConnState;
pub use connection::{Connection, ConnectionId};
pub use event::{Event, EventHandler, SharedHandler, shared_handler};
pub use iobuf::IoBuf;
pub use manager::Manager;
pub use mdns::MdnsResponder;
pub use timer::{TimerFlags, TimerId, Timers};
pub use tls::{RawIo, TlsSession};
pub use url::Url;
