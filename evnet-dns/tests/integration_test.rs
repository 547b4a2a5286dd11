//! Integration tests driving the sans-I/O resolver over real loopback sockets.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use evnet_dns::{
    DNSCLASS_INET, DnsType, Header, Message, Name, Resolver, ResolverEvent, Resource,
    ResourceBody, ResourceHeader,
};
use sansio::Protocol;
use shared::{TransportContext, TransportMessage, TransportProtocol};

fn bind() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    socket
}

/// Answers one query with `addr` for its first question, echoing the id.
fn serve_once(server: &UdpSocket, addr: Option<Ipv4Addr>) -> Message {
    let mut buf = [0u8; 512];
    let (n, from) = server.recv_from(&mut buf).unwrap();
    let query = Message::unpack(&buf[..n]).unwrap();

    let question = query.questions[0].clone();
    let answers = addr
        .map(|a| {
            vec![Resource {
                header: ResourceHeader {
                    name: question.name.clone(),
                    typ: DnsType::A,
                    class: DNSCLASS_INET,
                    ttl: 60,
                    ..Default::default()
                },
                body: ResourceBody::A(a.octets()),
            }]
        })
        .unwrap_or_default();
    let reply = Message {
        header: Header {
            id: query.header.id,
            response: true,
            recursion_desired: true,
            recursion_available: true,
            ..Default::default()
        },
        questions: vec![question],
        answers,
    };
    server.send_to(&reply.pack().unwrap(), from).unwrap();
    query
}

fn pump(resolver: &mut Resolver, client: &UdpSocket) {
    while let Some(packet) = resolver.poll_write() {
        client
            .send_to(&packet.message, packet.transport.peer_addr)
            .unwrap();
    }
}

fn receive(resolver: &mut Resolver, client: &UdpSocket) {
    let mut buf = [0u8; 512];
    let (n, from) = client.recv_from(&mut buf).unwrap();
    resolver
        .handle_read(TransportMessage {
            now: Instant::now(),
            transport: TransportContext {
                local_addr: client.local_addr().unwrap(),
                peer_addr: from,
                transport_protocol: TransportProtocol::UDP,
            },
            message: BytesMut::from(&buf[..n]),
        })
        .unwrap();
}

#[test]
fn test_lookup_round_trip() {
    let server = bind();
    let client = bind();
    let server_addr: SocketAddr = server.local_addr().unwrap();

    let mut resolver = Resolver::new(server_addr);
    let txid = resolver
        .query(11, "host.example", Instant::now(), Duration::from_secs(3))
        .unwrap();
    pump(&mut resolver, &client);

    let query = serve_once(&server, Some(Ipv4Addr::new(198, 51, 100, 7)));
    assert_eq!(query.header.id, txid);
    assert_eq!(query.questions.len(), 2);
    assert_eq!(query.questions[0].typ, DnsType::A);
    assert_eq!(query.questions[1].typ, DnsType::Aaaa);
    assert!(query.questions[1].name.matches("host.example"));

    receive(&mut resolver, &client);
    assert_eq!(
        resolver.poll_event(),
        Some(ResolverEvent::Resolved {
            owner: 11,
            txid,
            name: "host.example".to_owned(),
            addr: Ipv4Addr::new(198, 51, 100, 7),
        })
    );
    assert_eq!(resolver.pending_query_count(), 0);
}

#[test]
fn test_concurrent_lookups_are_matched_by_txid() {
    let server = bind();
    let client = bind();

    let mut resolver = Resolver::new(server.local_addr().unwrap());
    let now = Instant::now();
    let first = resolver
        .query(1, "one.example", now, Duration::from_secs(3))
        .unwrap();
    let second = resolver
        .query(2, "two.example", now, Duration::from_secs(3))
        .unwrap();
    assert_eq!(second, first + 1);
    pump(&mut resolver, &client);

    // Answer the first query with no address and the second with one.
    let q1 = serve_once(&server, None);
    let q2 = serve_once(&server, Some(Ipv4Addr::new(203, 0, 113, 2)));
    assert_eq!(q1.header.id, first);
    assert_eq!(q2.header.id, second);

    receive(&mut resolver, &client);
    receive(&mut resolver, &client);

    let events: Vec<ResolverEvent> = std::iter::from_fn(|| resolver.poll_event()).collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ResolverEvent::NotFound { owner: 1, .. }));
    assert!(matches!(
        events[1],
        ResolverEvent::Resolved { owner: 2, addr, .. } if addr == Ipv4Addr::new(203, 0, 113, 2)
    ));
}

#[test]
fn test_name_compression_in_query() {
    let client = bind();
    let server = bind();
    let mut resolver = Resolver::new(server.local_addr().unwrap());
    resolver
        .query(5, "a.b.c", Instant::now(), Duration::from_secs(1))
        .unwrap();
    pump(&mut resolver, &client);

    let mut buf = [0u8; 512];
    let (n, _) = server.recv_from(&mut buf).unwrap();
    let raw = &buf[..n];
    // header + 1a1b1c0 + type/class + pointer + type/class
    assert_eq!(n, 12 + 7 + 4 + 2 + 4);
    assert_eq!(&raw[n - 6..], &[0xc0, 0x0c, 0x00, 0x1c, 0x00, 0x01]);
    assert!(Name::new("a.b.c").unwrap().matches("A.B.C."));
}
