//! Echo Server Example
//!
//! Echoes back everything received on a TCP (or UDP) listener, optionally
//! answering multicast DNS queries for a `.local` name.
//!
//! # Usage
//!
//! ```
//! cargo run --package evnet --example echo_server -- --port 8000
//! ```
//!
//! With an mDNS responder and wire dumps:
//! ```
//! cargo run --package evnet --example echo_server -- --mdns evnet-echo --hexdump --debug
//! ```

use std::cell::Cell;
use std::io::Write;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use evnet::{Event, Manager, ManagerConfig, TimerFlags};

#[derive(Parser)]
#[command(name = "Echo Server")]
#[command(version = "0.1.0")]
#[command(about = "An example of echo server using the evnet connection engine", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("0.0.0.0"))]
    host: String,
    #[arg(long, default_value_t = 8000)]
    port: u16,
    /// Listen on UDP instead of TCP
    #[arg(long)]
    udp: bool,
    /// Log every byte sent and received
    #[arg(long)]
    hexdump: bool,
    /// Also answer mDNS queries for this name
    #[arg(long)]
    mdns: Option<String>,
    /// Address advertised over mDNS
    #[arg(long, default_value_t = Ipv4Addr::LOCALHOST)]
    mdns_ip: Ipv4Addr,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let mut mgr = Manager::new(ManagerConfig::default())?;

    let echoed = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&echoed);
    let url = format!(
        "{}://{}:{}",
        if cli.udp { "udp" } else { "tcp" },
        cli.host,
        cli.port
    );
    let listener = mgr.listen(&url, move |conn, event| match event {
        Event::Accept => println!("{} accepted {}", conn.id(), conn.peer()),
        Event::Read(data) => {
            if conn.send(data).is_ok() {
                counter.set(counter.get() + data.len());
            }
            let n = conn.recv().len();
            conn.recv_mut().delete(0, n);
        }
        Event::Error(msg) => eprintln!("{} error: {msg}", conn.id()),
        Event::Close if conn.is_accepted() => println!("{} closed", conn.id()),
        _ => {}
    })?;
    if let Some(conn) = mgr.connection_mut(listener) {
        conn.set_hexdump(cli.hexdump);
    }
    println!("listening on {url}...");

    if let Some(name) = &cli.mdns {
        let id = mgr.mdns_listen(name, cli.mdns_ip)?;
        println!("{id} answering mDNS for {name} with {}", cli.mdns_ip);
    }

    mgr.add_timer(10_000, TimerFlags::REPEAT, move || {
        log::info!("{} bytes echoed", echoed.get());
    });

    println!("Press ctrl-c to stop");
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    while running.load(Ordering::SeqCst) {
        mgr.poll(100);
    }

    mgr.close_all();
    Ok(())
}
