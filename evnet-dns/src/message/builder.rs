use std::net::Ipv4Addr;

use super::name::Name;
use super::*;

/// TTL used for multicast DNS answers, in seconds.
pub const MDNS_RESPONSE_TTL: u32 = 120;

/// Builds a recursive query for `name` carrying transaction id `id`.
///
/// The datagram holds two questions back to back: an A question followed by
/// an AAAA question whose name is a compression pointer to the first.
pub fn build_query(id: u16, name: &str) -> Result<Vec<u8>> {
    let name = Name::new(name)?;
    let msg = Message {
        header: Header {
            id,
            recursion_desired: true,
            ..Default::default()
        },
        questions: vec![
            Question {
                name: name.clone(),
                typ: DnsType::A,
                class: DNSCLASS_INET,
            },
            Question {
                name,
                typ: DnsType::Aaaa,
                class: DNSCLASS_INET,
            },
        ],
        ..Default::default()
    };
    msg.pack()
}

/// Builds an authoritative multicast DNS answer mapping `name` to `addr`.
///
/// Multicast answers carry id 0; unicast answers echo the query's id.
pub fn build_mdns_answer(id: u16, name: &str, addr: Ipv4Addr) -> Result<Vec<u8>> {
    let msg = Message {
        header: Header {
            id,
            response: true,
            authoritative: true,
            ..Default::default()
        },
        answers: vec![Resource {
            header: ResourceHeader {
                name: Name::new(name)?,
                typ: DnsType::A,
                class: DNSCLASS_INET,
                ttl: MDNS_RESPONSE_TTL,
                ..Default::default()
            },
            body: ResourceBody::A(addr.octets()),
        }],
        ..Default::default()
    };
    msg.pack()
}
