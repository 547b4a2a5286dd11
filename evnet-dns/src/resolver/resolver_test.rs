use super::*;
use crate::message::header::Header;
use crate::message::name::Name;
use crate::message::question::Question;
use crate::message::resource::{Resource, ResourceBody, ResourceHeader};
use crate::message::{DNSCLASS_INET, DnsType};
use sansio::Protocol;

fn server() -> SocketAddr {
    "192.0.2.53:53".parse().unwrap()
}

fn reply(txid: u16, name: &str, addr: Option<[u8; 4]>) -> TaggedBytesMut {
    let answers = addr
        .map(|a| {
            vec![Resource {
                header: ResourceHeader {
                    name: Name::new(name).unwrap(),
                    typ: DnsType::A,
                    class: DNSCLASS_INET,
                    ttl: 30,
                    ..Default::default()
                },
                body: ResourceBody::A(a),
            }]
        })
        .unwrap_or_default();
    let msg = Message {
        header: Header {
            id: txid,
            response: true,
            ..Default::default()
        },
        questions: vec![Question {
            name: Name::new(name).unwrap(),
            typ: DnsType::A,
            class: DNSCLASS_INET,
        }],
        answers,
    };
    tagged(&msg.pack().unwrap())
}

fn tagged(data: &[u8]) -> TaggedBytesMut {
    TransportMessage {
        now: Instant::now(),
        transport: TransportContext {
            peer_addr: server(),
            ..Default::default()
        },
        message: BytesMut::from(data),
    }
}

#[test]
fn test_query_queues_datagram() {
    let mut resolver = Resolver::new(server());
    let now = Instant::now();

    let txid = resolver
        .query(1, "example.com", now, Duration::from_secs(3))
        .unwrap();
    assert_eq!(txid, 1);
    assert!(resolver.is_pending(1));
    assert_eq!(resolver.poll_timeout(), Some(now + Duration::from_secs(3)));

    let packet = resolver.poll_write().unwrap();
    assert_eq!(packet.transport.peer_addr, server());
    assert_eq!(packet.message[..], build_query(txid, "example.com").unwrap()[..]);
    assert!(resolver.poll_write().is_none());
}

#[test]
fn test_consecutive_txids() {
    let mut resolver = Resolver::new(server());
    let now = Instant::now();
    let n = resolver.next_txid();

    let a = resolver.query(1, "a.example", now, Duration::from_secs(1)).unwrap();
    let b = resolver.query(2, "b.example", now, Duration::from_secs(1)).unwrap();

    assert_eq!(a, n);
    assert_eq!(b, n + 1);
    assert_eq!(resolver.pending_query_count(), 2);
}

#[test]
fn test_txid_wraps_past_zero() {
    let mut resolver = Resolver::new(server());
    resolver.next_txid = u16::MAX;
    let now = Instant::now();

    let last = resolver.query(1, "a.example", now, Duration::from_secs(1)).unwrap();
    let wrapped = resolver.query(2, "b.example", now, Duration::from_secs(1)).unwrap();

    assert_eq!(last, u16::MAX);
    assert_eq!(wrapped, 1);
}

#[test]
fn test_invalid_name_does_not_consume_txid() {
    let mut resolver = Resolver::new(server());
    let now = Instant::now();
    let n = resolver.next_txid();

    assert!(resolver.query(1, "bad..name", now, Duration::from_secs(1)).is_err());
    assert_eq!(resolver.next_txid(), n);
    assert_eq!(resolver.pending_query_count(), 0);
    assert!(resolver.poll_write().is_none());
}

#[test]
fn test_answer_resolves_owner() {
    let mut resolver = Resolver::new(server());
    let txid = resolver
        .query(7, "example.com", Instant::now(), Duration::from_secs(3))
        .unwrap();

    resolver
        .handle_read(reply(txid, "example.com", Some([192, 0, 2, 1])))
        .unwrap();

    assert_eq!(
        resolver.poll_event(),
        Some(ResolverEvent::Resolved {
            owner: 7,
            txid,
            name: "example.com".to_owned(),
            addr: Ipv4Addr::new(192, 0, 2, 1),
        })
    );
    assert!(!resolver.is_pending(7));
}

#[test]
fn test_answer_without_address() {
    let mut resolver = Resolver::new(server());
    let txid = resolver
        .query(7, "nx.example", Instant::now(), Duration::from_secs(3))
        .unwrap();

    resolver.handle_read(reply(txid, "nx.example", None)).unwrap();

    let event = resolver.poll_event().unwrap();
    assert!(matches!(event, ResolverEvent::NotFound { owner: 7, .. }));
    assert_eq!(resolver.pending_query_count(), 0);
}

#[test]
fn test_stray_and_malformed_replies_are_ignored() {
    let mut resolver = Resolver::new(server());
    let txid = resolver
        .query(7, "example.com", Instant::now(), Duration::from_secs(3))
        .unwrap();

    resolver
        .handle_read(reply(txid.wrapping_add(100), "example.com", Some([1, 1, 1, 1])))
        .unwrap();
    resolver.handle_read(tagged(&[0xde, 0xad])).unwrap();
    resolver.handle_read(tagged(&[0u8; 600])).unwrap();

    assert!(resolver.poll_event().is_none());
    assert!(resolver.is_pending(7));
}

#[test]
fn test_reply_from_other_source_is_ignored() {
    let mut resolver = Resolver::new(server());
    let txid = resolver
        .query(7, "example.com", Instant::now(), Duration::from_secs(3))
        .unwrap();

    let mut forged = reply(txid, "example.com", Some([6, 6, 6, 6]));
    forged.transport.peer_addr = "198.51.100.9:53".parse().unwrap();
    resolver.handle_read(forged).unwrap();
    assert!(resolver.poll_event().is_none());
    assert!(resolver.is_pending(7));

    resolver
        .handle_read(reply(txid, "example.com", Some([1, 2, 3, 4])))
        .unwrap();
    match resolver.poll_event() {
        Some(ResolverEvent::Resolved { owner, addr, .. }) => {
            assert_eq!(owner, 7);
            assert_eq!(addr, Ipv4Addr::new(1, 2, 3, 4));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_query_message_is_not_an_answer() {
    let mut resolver = Resolver::new(server());
    let txid = resolver
        .query(7, "example.com", Instant::now(), Duration::from_secs(3))
        .unwrap();

    let echoed = resolver.poll_write().unwrap();
    resolver.handle_read(tagged(&echoed.message)).unwrap();

    assert!(resolver.poll_event().is_none());
    assert!(resolver.queries().iter().any(|q| q.txid == txid));
}

#[test]
fn test_timeout_fires_once() {
    let mut resolver = Resolver::new(server());
    let start = Instant::now();
    let txid = resolver
        .query(9, "slow.example", start, Duration::from_millis(100))
        .unwrap();

    resolver
        .handle_timeout(start + Duration::from_millis(50))
        .unwrap();
    assert!(resolver.poll_event().is_none());
    assert!(resolver.is_pending(9));

    resolver
        .handle_timeout(start + Duration::from_millis(150))
        .unwrap();
    assert_eq!(
        resolver.poll_event(),
        Some(ResolverEvent::TimedOut {
            owner: 9,
            txid,
            name: "slow.example".to_owned(),
        })
    );
    assert!(resolver.poll_timeout().is_none());

    // A late answer is a stray reply now.
    resolver
        .handle_read(reply(txid, "slow.example", Some([10, 1, 1, 1])))
        .unwrap();
    assert!(resolver.poll_event().is_none());
}

#[test]
fn test_cancel_drops_query_silently() {
    let mut resolver = Resolver::new(server());
    let now = Instant::now();
    let txid = resolver
        .query(3, "example.com", now, Duration::from_millis(10))
        .unwrap();

    resolver.cancel(3);
    resolver.handle_timeout(now + Duration::from_secs(1)).unwrap();
    resolver
        .handle_read(reply(txid, "example.com", Some([1, 2, 3, 4])))
        .unwrap();

    assert!(resolver.poll_event().is_none());
    assert_eq!(resolver.pending_query_count(), 0);
}

#[test]
fn test_close_aborts_pending_queries() {
    let mut resolver = Resolver::new(server());
    let now = Instant::now();
    resolver.query(1, "a.example", now, Duration::from_secs(1)).unwrap();
    resolver.query(2, "b.example", now, Duration::from_secs(1)).unwrap();
    let next = resolver.next_txid();

    resolver.close().unwrap();

    assert!(resolver.poll_write().is_none());
    let mut owners = Vec::new();
    while let Some(event) = resolver.poll_event() {
        assert!(matches!(event, ResolverEvent::Aborted { .. }));
        owners.push(event.owner());
    }
    assert_eq!(owners, vec![1, 2]);

    // Still usable, and ids keep counting.
    let txid = resolver.query(3, "c.example", now, Duration::from_secs(1)).unwrap();
    assert_eq!(txid, next);
}
