
pub(crate) mod builder;
pub(crate) mod header;
pub(crate) mod name;
mod packer;
pub(crate) mod question;
pub(crate) mod resource;

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use header::*;
use packer::*;
use question::*;
use resource::*;

use shared::error::*;

// Message formats

// A Type is a type of DNS request and response.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum DnsType {
    // ResourceHeader.Type and question.Type
    A = 1,
    Ns = 2,
    Cname = 5,
    Soa = 6,
    Ptr = 12,
    Mx = 15,
    Txt = 16,
    Aaaa = 28,
    Srv = 33,
    Opt = 41,

    // question.Type
    All = 255,

    #[default]
    Unsupported = 0,
}

impl From<u16> for DnsType {
    fn from(v: u16) -> Self {
        match v {
            1 => DnsType::A,
            2 => DnsType::Ns,
            5 => DnsType::Cname,
            6 => DnsType::Soa,
            12 => DnsType::Ptr,
            15 => DnsType::Mx,
            16 => DnsType::Txt,
            28 => DnsType::Aaaa,
            33 => DnsType::Srv,
            41 => DnsType::Opt,
            255 => DnsType::All,
            _ => DnsType::Unsupported,
        }
    }
}

impl fmt::Display for DnsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DnsType::A => "A",
            DnsType::Ns => "NS",
            DnsType::Cname => "CNAME",
            DnsType::Soa => "SOA",
            DnsType::Ptr => "PTR",
            DnsType::Mx => "MX",
            DnsType::Txt => "TXT",
            DnsType::Aaaa => "AAAA",
            DnsType::Srv => "SRV",
            DnsType::Opt => "OPT",
            DnsType::All => "ALL",
            _ => "Unsupported",
        };
        write!(f, "{s}")
    }
}

impl DnsType {
    // pack_type appends the wire format of field to msg.
    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_uint16(msg, *self as u16)
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (t, o) = unpack_uint16(msg, off)?;
        *self = DnsType::from(t);
        Ok(o)
    }
}

/// DNS class of a question or resource record.
///
/// In practice only [`DNSCLASS_INET`] is used. Multicast DNS borrows the top
/// bit: in a question it requests a unicast response, in an answer it is the
/// cache-flush flag.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct DnsClass(pub u16);

/// Internet class (IN).
pub const DNSCLASS_INET: DnsClass = DnsClass(1);

/// Any class (*), only valid in questions.
pub const DNSCLASS_ANY: DnsClass = DnsClass(255);

const MDNS_CLASS_FLAG: u16 = 0x8000;

impl fmt::Display for DnsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let other = format!("{}", self.0);
        let s = match *self {
            DNSCLASS_INET => "ClassINET",
            DNSCLASS_ANY => "ClassANY",
            _ => other.as_str(),
        };
        write!(f, "{s}")
    }
}

impl DnsClass {
    // pack_class appends the wire format of field to msg.
    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_uint16(msg, self.0)
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (c, o) = unpack_uint16(msg, off)?;
        *self = DnsClass(c);
        Ok(o)
    }

    /// Whether a multicast DNS question asks for a unicast response.
    pub fn unicast_response(&self) -> bool {
        self.0 & MDNS_CLASS_FLAG != 0
    }
}

// An OpCode is a DNS operation code.
pub type OpCode = u16;

// An RCode is a DNS response status code.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum RCode {
    // Message.Rcode
    #[default]
    Success = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
    Unsupported,
}

impl From<u8> for RCode {
    fn from(v: u8) -> Self {
        match v {
            0 => RCode::Success,
            1 => RCode::FormatError,
            2 => RCode::ServerFailure,
            3 => RCode::NameError,
            4 => RCode::NotImplemented,
            5 => RCode::Refused,
            _ => RCode::Unsupported,
        }
    }
}

impl fmt::Display for RCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RCode::Success => "RCodeSuccess",
            RCode::FormatError => "RCodeFormatError",
            RCode::ServerFailure => "RCodeServerFailure",
            RCode::NameError => "RCodeNameError",
            RCode::NotImplemented => "RCodeNotImplemented",
            RCode::Refused => "RCodeRefused",
            RCode::Unsupported => "RCodeUnsupported",
        };
        write!(f, "{s}")
    }
}

// Internal constants.

// UINT16LEN is the length (in bytes) of a uint16.
const UINT16LEN: usize = 2;

// UINT32LEN is the length (in bytes) of a uint32.
const UINT32LEN: usize = 4;

// HEADER_LEN is the length (in bytes) of a DNS header.
//
// A header is comprised of 6 uint16s and no padding.
pub const HEADER_LEN: usize = 6 * UINT16LEN;

/// Largest datagram the decoder accepts.
pub const MAX_MESSAGE_LEN: usize = 512;

/// Most questions a decodable message may declare.
pub const MAX_QUESTIONS: usize = 2;

/// Most answers a decodable message may declare.
pub const MAX_ANSWERS: usize = 5;

const HEADER_BIT_QR: u16 = 1 << 15; // query/response (response=1)
const HEADER_BIT_AA: u16 = 1 << 10; // authoritative
const HEADER_BIT_TC: u16 = 1 << 9; // truncated
const HEADER_BIT_RD: u16 = 1 << 8; // recursion desired
const HEADER_BIT_RA: u16 = 1 << 7; // recursion available

// Message is a representation of a DNS message.
//
// Only the question and answer sections are modelled; authority and
// additional records are neither produced nor read.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Resource>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = "dnsmessage.Message{Header: ".to_owned();
        s += self.header.to_string().as_str();

        s += ", Questions: ";
        let v: Vec<String> = self.questions.iter().map(|q| q.to_string()).collect();
        s += &v.join(", ");

        s += ", Answers: ";
        let v: Vec<String> = self.answers.iter().map(|q| q.to_string()).collect();
        s += &v.join(", ");

        write!(f, "{s}")
    }
}

impl Message {
    /// Decodes an untrusted datagram.
    ///
    /// Messages shorter than the header, longer than [`MAX_MESSAGE_LEN`], or
    /// declaring more than [`MAX_QUESTIONS`] questions or [`MAX_ANSWERS`]
    /// answers are rejected. Answer decoding stops at the first Internet
    /// A record; later records are not looked at.
    pub fn unpack(msg: &[u8]) -> Result<Message> {
        if msg.len() < HEADER_LEN {
            return Err(Error::ErrShortMessage);
        }
        if msg.len() > MAX_MESSAGE_LEN {
            return Err(Error::ErrMessageTooLarge);
        }

        let mut h = HeaderInternal::default();
        let mut off = h.unpack(msg, 0)?;
        if h.questions as usize > MAX_QUESTIONS {
            return Err(Error::ErrTooManyQuestions);
        }
        if h.answers as usize > MAX_ANSWERS {
            return Err(Error::ErrTooManyAnswers);
        }

        let mut m = Message {
            header: h.header(),
            ..Default::default()
        };

        for _ in 0..h.questions {
            let (q, new_off) = Question::unpack(msg, off)?;
            m.questions.push(q);
            off = new_off;
        }

        for _ in 0..h.answers {
            let (r, new_off) = Resource::unpack(msg, off)?;
            let done = r.ipv4().is_some();
            m.answers.push(r);
            off = new_off;
            if done {
                break;
            }
        }

        Ok(m)
    }

    /// Packs a full Message.
    pub fn pack(&self) -> Result<Vec<u8>> {
        self.append_pack(Vec::with_capacity(MAX_MESSAGE_LEN))
    }

    // append_pack is like pack but appends the full Message to b and returns the
    // extended buffer.
    pub(crate) fn append_pack(&self, b: Vec<u8>) -> Result<Vec<u8>> {
        if self.questions.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyQuestions);
        }
        if self.answers.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAnswers);
        }

        let (id, bits) = self.header.pack();
        let h = HeaderInternal {
            id,
            bits,
            questions: self.questions.len() as u16,
            answers: self.answers.len() as u16,
            ..Default::default()
        };

        let compression_off = b.len();
        let mut msg = h.pack(b);

        // Compression is always on; RFC 1035 requires every decoder to
        // understand it.
        let mut compression = Some(HashMap::new());

        for question in &self.questions {
            msg = question.pack(msg, &mut compression, compression_off)?;
        }
        for answer in &self.answers {
            msg = answer.pack(msg, &mut compression, compression_off)?;
        }

        Ok(msg)
    }

    /// The address from the first Internet-class A answer, if any.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.answers.iter().find_map(Resource::ipv4)
    }
}
