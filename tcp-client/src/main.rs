//! Entry point for `tcp-client`.
//!
//! Parses CLI arguments and dispatches into **send** or **dump** mode.
//! All socket work is delegated to the library; `main.rs` owns only process
//! setup (logging, argument parsing, exit status).

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tcp_client::{Connection, DEFAULT_RECEIVE_SIZE};

/// Blocking raw-TCP client.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

/// Where to connect and how much to read per receive call.
#[derive(Args)]
struct Target {
    /// Remote host name or address.
    #[arg(long)]
    host: String,
    /// Remote TCP port.
    #[arg(short, long)]
    port: u16,
    /// Upper bound for a single receive call; at least 1.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_RECEIVE_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
    )]
    max_bytes: usize,
}

#[derive(Subcommand)]
enum Mode {
    /// Send one message and print a single reply.
    Send {
        #[command(flatten)]
        target: Target,
        /// Do not append a trailing newline to MESSAGE.
        #[arg(long)]
        no_newline: bool,
        /// Exit right after sending instead of waiting for a reply.
        #[arg(long)]
        no_reply: bool,
        /// Text to send.
        message: String,
    },
    /// Copy everything the peer sends to stdout until it closes.
    Dump {
        #[command(flatten)]
        target: Target,
    },
}

fn connect(target: &Target) -> Result<Connection> {
    let mut conn = Connection::new();
    conn.connect(&target.host, target.port)
        .with_context(|| format!("connecting to {}:{}", target.host, target.port))?;
    if let Some(peer) = conn.peer_addr() {
        log::info!("Connected to {peer}");
    }
    Ok(conn)
}

fn run(cli: Cli) -> Result<()> {
    match cli.mode {
        Mode::Send {
            target,
            no_newline,
            no_reply,
            mut message,
        } => {
            let mut conn = connect(&target)?;
            if !no_newline {
                message.push('\n');
            }
            let sent = conn.send_str(&message).context("sending message")?;
            log::info!("Sent {sent} byte(s)");

            if !no_reply {
                let reply = conn.receive(target.max_bytes).context("receiving reply")?;
                if reply.is_empty() && !conn.is_connected() {
                    log::info!("Peer closed the connection without replying");
                }
                println!("{}", String::from_utf8_lossy(&reply));
            }
            conn.close();
        }
        Mode::Dump { target } => {
            let mut conn = connect(&target)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let mut total = 0usize;
            while conn.is_connected() {
                let chunk = conn.receive(target.max_bytes).context("receiving")?;
                total += chunk.len();
                out.write_all(&chunk).context("writing to stdout")?;
            }
            out.flush().context("flushing stdout")?;
            log::info!("Peer closed the connection after {total} byte(s)");
        }
    }
    Ok(())
}

fn main() {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
