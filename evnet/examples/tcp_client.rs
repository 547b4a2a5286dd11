//! TCP Client Example
//!
//! Connects to a server by URL, sends one line and prints whatever comes
//! back until the peer closes or the timeout expires. Host names are
//! resolved by the engine's built-in DNS client.
//!
//! # Usage
//!
//! ```
//! cargo run --package evnet --example tcp_client -- --url tcp://localhost:8000 --message hello
//! ```
//!
//! ```
//! cargo run --package evnet --example tcp_client -- --url http://example.com --message "GET / HTTP/1.0"
//! ```

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use evnet::{Event, Manager, ManagerConfig};

#[derive(Parser)]
#[command(name = "TCP Client")]
#[command(version = "0.1.0")]
#[command(about = "An example of tcp client using the evnet connection engine", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("tcp://127.0.0.1:8000"))]
    url: String,
    #[arg(long, default_value_t = format!("hello"))]
    message: String,
    /// DNS server, as udp://IP:PORT
    #[arg(long, default_value_t = format!("udp://8.8.8.8:53"))]
    resolver: String,
    /// Give up after this many seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    #[arg(long)]
    hexdump: bool,
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

    let config = ManagerConfig::default().with_resolver_url(cli.resolver.clone());
    let mut mgr = Manager::new(config)?;

    let done = Rc::new(Cell::new(false));
    let finished = Rc::clone(&done);
    let mut line = cli.message.into_bytes();
    line.extend_from_slice(b"\r\n\r\n");
    let hexdump = cli.hexdump;

    let id = mgr.connect(&cli.url, move |conn, event| match event {
        Event::Open => conn.set_hexdump(hexdump),
        Event::Resolve => println!("{} resolved to {}", conn.id(), conn.peer()),
        Event::Connect => {
            println!("{} connected from {}", conn.id(), conn.local());
            if let Err(err) = conn.send(&line) {
                eprintln!("{} send: {err}", conn.id());
            }
        }
        Event::Read(data) => {
            print!("{}", String::from_utf8_lossy(data));
            let n = conn.recv().len();
            conn.recv_mut().delete(0, n);
        }
        Event::Error(msg) => eprintln!("{} error: {msg}", conn.id()),
        Event::Close => {
            println!("\n{} closed", conn.id());
            finished.set(true);
        }
        _ => {}
    })?;
    log::info!("{id} connecting to {}", cli.url);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    let deadline = Instant::now() + Duration::from_secs(cli.timeout);
    while running.load(Ordering::SeqCst) && !done.get() && Instant::now() < deadline {
        mgr.poll(100);
    }

    mgr.close_all();
    Ok(())
}
