use std::collections::HashMap;
use std::fmt;

use super::name::*;
use super::packer::*;
use super::*;

/// The body of a resource record.
///
/// Only address records are interpreted; every other type is skipped over
/// using the length in its header.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub enum ResourceBody {
    A([u8; 4]),
    Aaaa([u8; 16]),
    #[default]
    Unknown,
}

impl fmt::Display for ResourceBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceBody::A(a) => write!(f, "dnsmessage.AResource{{A: {}}}", Ipv4Addr::from(*a)),
            ResourceBody::Aaaa(aaaa) => write!(
                f,
                "dnsmessage.AAAAResource{{AAAA: {}}}",
                std::net::Ipv6Addr::from(*aaaa)
            ),
            ResourceBody::Unknown => write!(f, "dnsmessage.UnknownResource"),
        }
    }
}

impl ResourceBody {
    fn wire(&self) -> &[u8] {
        match self {
            ResourceBody::A(a) => a,
            ResourceBody::Aaaa(aaaa) => aaaa,
            ResourceBody::Unknown => &[],
        }
    }
}

/// Header for a DNS resource record.
///
/// ```text
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      NAME                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TYPE                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                     CLASS                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TTL                      |
/// |                                               |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                   RDLENGTH                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ResourceHeader {
    pub name: Name,
    pub typ: DnsType,
    pub class: DnsClass,
    pub ttl: u32,
    /// Length of the record data, filled in when unpacking.
    pub length: u16,
}

impl fmt::Display for ResourceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dnsmessage.ResourceHeader{{Name: {}, Type: {}, Class: {}, TTL: {}, Length: {}}}",
            self.name, self.typ, self.class, self.ttl, self.length,
        )
    }
}

// A Resource is a DNS resource record.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub header: ResourceHeader,
    pub body: ResourceBody,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dnsmessage.Resource{{Header: {}, Body: {}}}",
            self.header, self.body
        )
    }
}

impl Resource {
    // pack appends the wire format of the Resource to msg.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let data = self.body.wire();
        msg = self.header.name.pack(msg, compression, compression_off)?;
        msg = self.header.typ.pack(msg);
        msg = self.header.class.pack(msg);
        msg = pack_uint32(msg, self.header.ttl);
        msg = pack_uint16(msg, data.len() as u16);
        msg.extend_from_slice(data);
        Ok(msg)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Resource, usize)> {
        let (name, off) = Name::unpack(msg, off)?;
        let mut header = ResourceHeader {
            name,
            ..Default::default()
        };
        let off = header.typ.unpack(msg, off)?;
        let off = header.class.unpack(msg, off)?;
        let (ttl, off) = unpack_uint32(msg, off)?;
        header.ttl = ttl;
        let (length, off) = unpack_uint16(msg, off)?;
        header.length = length;

        let end = off + length as usize;
        if end > msg.len() {
            return Err(Error::ErrResourceLen);
        }

        let data = &msg[off..end];
        let body = match (header.typ, data.len()) {
            (DnsType::A, 4) => ResourceBody::A([data[0], data[1], data[2], data[3]]),
            (DnsType::Aaaa, 16) => {
                let mut aaaa = [0u8; 16];
                aaaa.copy_from_slice(data);
                ResourceBody::Aaaa(aaaa)
            }
            _ => ResourceBody::Unknown,
        };

        Ok((Resource { header, body }, end))
    }

    /// Returns the IPv4 address carried by an Internet-class A record.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self.body {
            ResourceBody::A(a) if self.header.class == DNSCLASS_INET => Some(Ipv4Addr::from(a)),
            _ => None,
        }
    }
}
