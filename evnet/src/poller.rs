use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

const EVENTS_CAPACITY: usize = 1024;

/// Readiness reported for one registered socket.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Readiness {
    pub(crate) key: usize,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

/// Readiness multiplexer over `mio`, which picks epoll, kqueue or IOCP for
/// the platform.
///
/// Notifications are edge-triggered: a socket is reported once when it
/// becomes ready, and callers keep the flags until an operation would block.
pub(crate) struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_CAPACITY),
        })
    }

    pub(crate) fn register(&self, source: &mut dyn Source, key: usize, listener: bool) -> io::Result<()> {
        let interest = if listener {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };
        self.poll.registry().register(source, Token(key), interest)
    }

    pub(crate) fn deregister(&self, source: &mut dyn Source) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Waits up to `timeout` and appends what became ready to `ready`.
    ///
    /// A failed wait is logged and reported as nothing ready.
    pub(crate) fn wait(&mut self, timeout: Duration, ready: &mut Vec<Readiness>) {
        if let Err(err) = self.poll.poll(&mut self.events, Some(timeout)) {
            if err.kind() != io::ErrorKind::Interrupted {
                log::error!("poll: {err}");
            }
            return;
        }
        for event in self.events.iter() {
            let closed = event.is_error() || event.is_read_closed() || event.is_write_closed();
            ready.push(Readiness {
                key: event.token().0,
                readable: event.is_readable() || closed,
                writable: event.is_writable() || event.is_error() || event.is_write_closed(),
            });
        }
    }
}
