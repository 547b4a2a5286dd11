#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod error;
pub mod time;
pub(crate) mod transport;

pub use transport::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
