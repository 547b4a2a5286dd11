use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::connection::Connection;

/// Events delivered to a connection's handlers.
///
/// For one connection they arrive in the order
/// `Open, Resolve?, Connect | Accept, {Read, Write, Poll, Protocol}*, Error?, Close`.
/// `Close` is always last and fires exactly once for every `Open`.
#[derive(Clone, Copy)]
pub enum Event<'a> {
    /// A fatal error; `Close` follows.
    Error(&'a str),
    /// The connection was created.
    Open,
    /// Fired on every poll iteration with the current time in milliseconds.
    Poll(u64),
    /// The host name was resolved to [`Connection::peer`].
    Resolve,
    /// An outbound connection is established.
    Connect,
    /// A listener accepted this connection.
    Accept,
    /// Newly received bytes. They are also appended to [`Connection::recv`].
    Read(&'a [u8]),
    /// Bytes written to the transport.
    Write(usize),
    /// The connection is being torn down.
    Close,
    /// An event defined by a protocol layer, see [`Connection::emit`].
    Protocol(&'a dyn Any),
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Error(msg) => f.debug_tuple("Error").field(msg).finish(),
            Event::Open => f.write_str("Open"),
            Event::Poll(now) => f.debug_tuple("Poll").field(now).finish(),
            Event::Resolve => f.write_str("Resolve"),
            Event::Connect => f.write_str("Connect"),
            Event::Accept => f.write_str("Accept"),
            Event::Read(data) => f.debug_tuple("Read").field(&data.len()).finish(),
            Event::Write(n) => f.debug_tuple("Write").field(n).finish(),
            Event::Close => f.write_str("Close"),
            Event::Protocol(_) => f.write_str("Protocol"),
        }
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Event::Error(_) => "ERROR",
            Event::Open => "OPEN",
            Event::Poll(_) => "POLL",
            Event::Resolve => "RESOLVE",
            Event::Connect => "CONNECT",
            Event::Accept => "ACCEPT",
            Event::Read(_) => "READ",
            Event::Write(_) => "WRITE",
            Event::Close => "CLOSE",
            Event::Protocol(_) => "PROTOCOL",
        };
        write!(f, "{s}")
    }
}

/// Something that reacts to connection events.
///
/// Handlers get mutable access to the connection for the duration of the
/// call. Closures `FnMut(&mut Connection, &Event<'_>)` implement this trait.
pub trait EventHandler {
    fn handle_event(&mut self, conn: &mut Connection, event: &Event<'_>);
}

impl<F> EventHandler for F
where
    F: FnMut(&mut Connection, &Event<'_>),
{
    fn handle_event(&mut self, conn: &mut Connection, event: &Event<'_>) {
        self(conn, event)
    }
}

/// A handler that may be attached to many connections, e.g. a listener and
/// everything it accepts.
pub type SharedHandler = Rc<RefCell<dyn EventHandler>>;

/// Wraps a handler so it can be attached to connections.
pub fn shared_handler<H: EventHandler + 'static>(handler: H) -> SharedHandler {
    Rc::new(RefCell::new(handler))
}
