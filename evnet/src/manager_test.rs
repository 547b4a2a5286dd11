use super::*;

fn listener_with(mgr: &mut Manager, socket: Socket) -> usize {
    let key = mgr.alloc(false);
    let conn = &mut mgr.conns[key];
    conn.attach(socket);
    conn.set_state(ConnState::Listening);
    conn.readable = true;
    key
}

#[test]
fn test_accept_error_keeps_listener_readable() {
    let mut mgr = Manager::new(ManagerConfig::default()).unwrap();
    // a datagram socket refuses accept with something other than WouldBlock
    let socket = Socket::bind_udp("127.0.0.1:0".parse().unwrap()).unwrap();
    let key = listener_with(&mut mgr, socket);

    mgr.accept(key);

    assert!(mgr.conns[key].is_readable());
    assert_eq!(mgr.conns[key].state(), ConnState::Listening);
    assert_eq!(mgr.len(), 1);
    assert_eq!(mgr.poll_timeout(Duration::from_secs(1)), Duration::ZERO);

    // and the next attempt goes through the same path again
    mgr.accept(key);
    assert!(mgr.conns[key].is_readable());
    assert_eq!(mgr.len(), 1);
}

#[test]
fn test_accept_would_block_clears_readable() {
    let mut mgr = Manager::new(ManagerConfig::default()).unwrap();
    let socket = Socket::listen_tcp("127.0.0.1:0".parse().unwrap(), 8).unwrap();
    let key = listener_with(&mut mgr, socket);

    mgr.accept(key);

    assert!(!mgr.conns[key].is_readable());
    assert_eq!(mgr.len(), 1);
    assert!(!mgr.conns[key].has_pending_work());
}
