use std::collections::HashMap;
use std::fmt;

use super::packer::*;
use super::*;

const NAME_LEN: usize = 255;

// Compression pointers followed while decoding a single name.
pub(crate) const MAX_POINTER_DEPTH: usize = 5;

/// A Name is a non-encoded domain name, always stored with a trailing dot.
#[derive(Default, PartialEq, Eq, Debug, Clone)]
pub struct Name {
    pub data: String,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl Name {
    pub fn new(data: &str) -> Result<Self> {
        let data = if data.ends_with('.') {
            data.to_owned()
        } else {
            format!("{data}.")
        };
        if data.len() > NAME_LEN {
            return Err(Error::ErrNameTooLong);
        }
        Ok(Name { data })
    }

    /// Compares against a dotted name, ignoring ASCII case and the trailing dot.
    pub fn matches(&self, other: &str) -> bool {
        let a = self.data.trim_end_matches('.');
        let b = other.trim_end_matches('.');
        a.eq_ignore_ascii_case(b)
    }

    // pack appends the wire format of the Name to msg.
    //
    // Domain names are a sequence of counted strings split at the dots. They end
    // in a zero-length string. Suffixes already present in the compression map
    // are replaced with a pointer.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        // Allow root domain.
        if self.data == "." || self.data.is_empty() {
            msg.push(0);
            return Ok(msg);
        }

        let bytes = self.data.as_bytes();
        let mut begin = 0;
        for i in 0..bytes.len() {
            if bytes[i] != b'.' {
                continue;
            }
            if i == begin {
                return Err(Error::ErrZeroSegLen);
            }
            if i - begin >= 1 << 6 {
                return Err(Error::ErrSegTooLong);
            }

            if let Some(comp) = compression {
                let suffix = &self.data[begin..];
                if let Some(&ptr) = comp.get(suffix) {
                    return Ok(pack_uint16(msg, (ptr as u16) | 0xC000));
                }
                let off = msg.len() - compression_off;
                if off <= 0x3FFF {
                    comp.insert(suffix.to_owned(), off);
                }
            }

            msg.push((i - begin) as u8);
            msg.extend_from_slice(&bytes[begin..i]);
            begin = i + 1;
        }
        msg.push(0);

        Ok(msg)
    }

    // unpack decodes a name starting at off and returns it together with the
    // offset just past its wire form in msg.
    //
    // A compression pointer whose target is out of range, or itself a pointer,
    // ends the name where it stands instead of failing the whole message.
    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Name, usize)> {
        let mut labels = Vec::new();
        let n = unpack_labels(msg, off, 0, &mut labels)?;
        let data = if labels.is_empty() {
            ".".to_owned()
        } else {
            let mut data = labels.join(".");
            data.push('.');
            data
        };
        Ok((Name { data }, off + n))
    }
}

fn unpack_labels(
    msg: &[u8],
    off: usize,
    depth: usize,
    labels: &mut Vec<String>,
) -> Result<usize> {
    if depth > MAX_POINTER_DEPTH {
        return Err(Error::ErrTooManyPtr);
    }

    let mut i = 0;
    loop {
        let c = *msg.get(off + i).ok_or(Error::ErrBaseLen)? as usize;
        if c == 0 {
            i += 1;
            break;
        }

        if c & 0xC0 != 0 {
            let lo = *msg.get(off + i + 1).ok_or(Error::ErrBaseLen)? as usize;
            let ptr = ((c & 0x3F) << 8) | lo;
            if ptr + 1 < msg.len() && msg[ptr] & 0xC0 == 0 {
                unpack_labels(msg, ptr, depth + 1, labels)?;
            } else {
                log::trace!("dns: pointer {ptr} at offset {} not followed", off + i);
            }
            i += 2;
            break;
        }

        if off + i + c + 1 >= msg.len() {
            return Err(Error::ErrSegTooLong);
        }
        let label = &msg[off + i + 1..off + i + 1 + c];
        labels.push(String::from_utf8_lossy(label).into_owned());
        i += c + 1;
    }

    Ok(i)
}
