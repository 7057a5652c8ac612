#[macro_use]
extern crate log;

use std::env;
use std::process;

use cast_control::channel::{self, DEFAULT_DESTINATION_ID};
use cast_control::{Config, Connection, Error, Poll};
use serde_json::Value;

fn usage() -> ! {
    eprintln!("usage: cast-control <host> [port]");
    process::exit(2);
}

fn run(host: &str, port: u16) -> Result<(), Error> {
    let mut cast = Connection::new(Config::default());
    cast.connect(host, port)?;
    info!(
        "connected to {} from {}",
        host,
        cast.local_ip().unwrap_or("unknown address")
    );
    cast.connect_channel(DEFAULT_DESTINATION_ID)?;
    cast.receiver_status()?;
    cast.launch()?;
    loop {
        let frame = match cast.poll() {
            Ok(Poll::Complete(frame)) => frame,
            Ok(Poll::Pending) => continue,
            Ok(Poll::Dead) => {
                error!("cast device stopped responding");
                return Ok(());
            }
            Err(Error::FrameTooLarge(len)) => {
                warn!("skipped frame of {} bytes", len);
                continue;
            }
            Err(err) => return Err(err),
        };
        let message = frame.message()?;
        info!(
            "{} -> {}: {}",
            message.get_source_id(),
            message.get_namespace(),
            message.get_payload_utf8()
        );
        if message.get_namespace() == channel::heartbeat::NAMESPACE {
            let payload = serde_json::from_str::<Value>(message.get_payload_utf8())?;
            if payload["type"] == "PING" {
                cast.pong()?;
            }
        }
    }
}

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| usage());
    let port = match args.next().map(|port| port.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(_)) => usage(),
        None => 0,
    };
    if let Err(err) = run(&host, port) {
        eprintln!("cast-control: {}", err);
        process::exit(1);
    }
}
