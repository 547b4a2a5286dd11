//! DNS Lookup Example
//!
//! Resolves one host name with the sans-I/O evnet-dns resolver over a
//! blocking std UDP socket.
//!
//! # Usage
//!
//! ```
//! cargo run --package evnet-dns --example dns_lookup -- --name example.com
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use clap::Parser;
use evnet_dns::{Resolver, ResolverEvent};
use sansio::Protocol;
use shared::{TaggedBytesMut, TransportContext, TransportProtocol};

#[derive(Parser, Debug)]
#[command(name = "DNS Lookup")]
#[command(version = "0.1.0")]
#[command(about = "An example of DNS lookup using the sans-I/O evnet-dns resolver")]
struct Args {
    /// DNS server address
    #[arg(long, default_value = "8.8.8.8:53")]
    server: String,

    /// Host name to resolve
    #[arg(long, default_value = "example.com")]
    name: String,

    /// Lookup timeout in milliseconds
    #[arg(long, default_value = "3000")]
    timeout: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let server: SocketAddr = args.server.parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(Duration::from_millis(100)))?;
    let local_addr = socket.local_addr()?;

    let mut resolver = Resolver::new(server);
    let txid = resolver.query(
        1,
        &args.name,
        Instant::now(),
        Duration::from_millis(args.timeout),
    )?;
    log::info!("Resolving '{}' via {} (txid={:#06x})", args.name, server, txid);

    let mut buf = vec![0u8; 1500];
    loop {
        while let Some(transmit) = resolver.poll_write() {
            socket.send_to(&transmit.message, transmit.transport.peer_addr)?;
        }

        match socket.recv_from(&mut buf) {
            Ok((n, peer_addr)) => {
                resolver.handle_read(TaggedBytesMut {
                    now: Instant::now(),
                    transport: TransportContext {
                        local_addr,
                        peer_addr,
                        transport_protocol: TransportProtocol::UDP,
                    },
                    message: BytesMut::from(&buf[..n]),
                })?;
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(err) => return Err(err.into()),
        }

        resolver.handle_timeout(Instant::now())?;

        if let Some(event) = resolver.poll_event() {
            match event {
                ResolverEvent::Resolved { name, addr, .. } => {
                    log::info!("{name} is {addr}");
                }
                ResolverEvent::NotFound { name, .. } => {
                    log::warn!("{name}: no IPv4 address");
                }
                ResolverEvent::TimedOut { name, .. } => {
                    log::warn!("{name}: timed out");
                }
                ResolverEvent::Aborted { name, .. } => {
                    log::warn!("{name}: aborted");
                }
            }
            break;
        }
    }

    resolver.close()?;

    Ok(())
}
