use super::*;
use crate::event::shared_handler;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn recorder(tag: &'static str, log: &Log) -> SharedHandler {
    let log = Rc::clone(log);
    shared_handler(move |_: &mut Connection, event: &Event<'_>| {
        let entry = match event {
            Event::Error(msg) => format!("{tag}:ERROR({msg})"),
            Event::Write(n) => format!("{tag}:WRITE({n})"),
            Event::Protocol(p) => match p.downcast_ref::<u32>() {
                Some(v) => format!("{tag}:PROTOCOL({v})"),
                None => format!("{tag}:PROTOCOL"),
            },
            other => format!("{tag}:{other}"),
        };
        log.borrow_mut().push(entry);
    })
}

fn conn() -> Connection {
    Connection::new(ConnectionId(7), false, 16)
}

#[test]
fn test_protocol_handler_runs_first() {
    let log = Log::default();
    let mut c = conn();
    c.add_handler(recorder("user", &log));
    c.push_protocol_handler(recorder("proto", &log));
    c.push_protocol_handler(recorder("outer", &log));
    assert_eq!(c.handler_count(), 3);

    c.call(&Event::Open);
    assert_eq!(*log.borrow(), vec!["outer:OPEN", "proto:OPEN", "user:OPEN"]);
}

#[test]
fn test_fail_from_handler_is_delivered_after_current_event() {
    let log = Log::default();
    let mut c = conn();
    c.add_handler(shared_handler(|conn: &mut Connection, event: &Event<'_>| {
        if let Event::Read(_) = event {
            conn.fail("bad frame");
        }
    }));
    c.add_handler(recorder("user", &log));

    c.call(&Event::Read(b"xyz"));
    assert_eq!(*log.borrow(), vec!["user:READ", "user:ERROR(bad frame)"]);
    assert!(c.is_closing());

    // a second failure is not reported
    c.fail("again");
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn test_fail_outside_handlers_fires_immediately() {
    let log = Log::default();
    let mut c = conn();
    c.add_handler(recorder("user", &log));
    c.fail(Error::ErrDnsTimeout("example.invalid".to_owned()));
    assert_eq!(
        *log.borrow(),
        vec!["user:ERROR(example.invalid DNS lookup failed: timeout)"]
    );
    assert_eq!(c.state(), ConnState::Closing);
}

#[test]
fn test_emit_reaches_whole_chain() {
    let log = Log::default();
    let mut c = conn();
    c.add_handler(shared_handler(|conn: &mut Connection, event: &Event<'_>| {
        if let Event::Read(data) = event {
            conn.emit(data.len() as u32);
        }
    }));
    c.add_handler(recorder("user", &log));

    c.call(&Event::Read(b"hello"));
    assert_eq!(*log.borrow(), vec!["user:READ", "user:PROTOCOL(5)"]);

    c.emit(9u32);
    assert_eq!(log.borrow().last().map(String::as_str), Some("user:PROTOCOL(9)"));
}

#[test]
fn test_handler_added_during_dispatch() {
    let log = Log::default();
    let mut c = conn();
    let added = Rc::new(RefCell::new(false));
    let (l, a) = (Rc::clone(&log), Rc::clone(&added));
    c.add_handler(shared_handler(move |conn: &mut Connection, event: &Event<'_>| {
        if let Event::Open = event {
            if !*a.borrow() {
                *a.borrow_mut() = true;
                conn.push_protocol_handler(recorder("proto", &l));
                conn.add_handler(recorder("late", &l));
            }
        }
    }));
    c.add_handler(recorder("user", &log));

    c.call(&Event::Open);
    assert_eq!(*log.borrow(), vec!["user:OPEN"]);
    assert_eq!(c.handler_count(), 4);

    log.borrow_mut().clear();
    c.call(&Event::Connect);
    assert_eq!(
        *log.borrow(),
        vec!["proto:CONNECT", "user:CONNECT", "late:CONNECT"]
    );
}

#[test]
fn test_nothing_after_close() {
    let log = Log::default();
    let mut c = conn();
    c.add_handler(recorder("user", &log));
    c.add_handler(shared_handler(|conn: &mut Connection, event: &Event<'_>| {
        if let Event::Close = event {
            conn.emit(1u32);
        }
    }));

    c.call_close();
    c.call(&Event::Poll(1));
    c.emit(2u32);
    assert_eq!(*log.borrow(), vec!["user:CLOSE"]);
}

#[test]
fn test_drain_transitions() {
    let mut c = conn();
    c.drain();
    assert_eq!(c.state(), ConnState::Draining);

    let mut c = conn();
    c.set_state(ConnState::Connecting);
    c.drain();
    assert_eq!(c.state(), ConnState::Connecting);
    c.become_ready();
    assert_eq!(c.state(), ConnState::Draining);

    let mut c = conn();
    c.set_state(ConnState::Listening);
    c.drain();
    assert_eq!(c.state(), ConnState::Closing);
}

#[test]
fn test_send_buffers_and_refuses_when_closing() {
    let mut c = conn();
    c.send(b"abc").unwrap();
    c.send(b"def").unwrap();
    assert_eq!(c.send_buf().as_slice(), b"abcdef");
    assert!(!c.has_pending_work());

    c.close();
    assert_eq!(c.send(b"x"), Err(Error::ErrConnectionClosed));
    assert!(c.has_pending_work());
}

#[test]
fn test_udp_send_without_socket_buffers() {
    let mut c = Connection::new(ConnectionId(1), true, 16);
    c.set_state(ConnState::Resolving);
    c.send(b"query").unwrap();
    assert_eq!(c.send_buf().len(), 5);
    assert!(!c.wants_write());
}

struct NullTls;

impl TlsSession for NullTls {
    fn handshake(&mut self, _io: &mut dyn RawIo) -> Result<bool> {
        Ok(true)
    }
    fn recv(&mut self, io: &mut dyn RawIo, buf: &mut [u8]) -> Result<usize> {
        Ok(io.read(buf)?)
    }
    fn send(&mut self, io: &mut dyn RawIo, buf: &[u8]) -> Result<usize> {
        Ok(io.write(buf)?)
    }
}

#[test]
fn test_start_tls_transitions() {
    let mut c = conn();
    c.start_tls(Box::new(NullTls)).unwrap();
    assert!(c.is_tls());
    assert_eq!(c.state(), ConnState::TlsHandshaking);
    assert!(c.start_tls(Box::new(NullTls)).is_err());

    let mut c = conn();
    c.set_state(ConnState::Connecting);
    c.start_tls(Box::new(NullTls)).unwrap();
    assert_eq!(c.state(), ConnState::Connecting);
    c.become_ready();
    assert_eq!(c.state(), ConnState::TlsHandshaking);

    let mut c = Connection::new(ConnectionId(2), true, 16);
    assert!(matches!(
        c.start_tls(Box::new(NullTls)),
        Err(Error::ErrTls(_))
    ));
}

#[test]
fn test_wants_nothing_without_socket() {
    let mut c = conn();
    c.readable = true;
    c.writable = true;
    c.send(b"data").unwrap();
    assert!(!c.wants_read());
    assert!(!c.wants_write());
    assert!(!c.has_pending_work());
}
