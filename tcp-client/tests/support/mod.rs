//! Shared helpers for the integration tests.
//!
//! [`ScriptedSockets`] wraps the host's [`SystemSockets`] and intercepts
//! calls, applying a configurable fault model:
//!
//! | Fault              | Effect                                          |
//! |--------------------|-------------------------------------------------|
//! | Startup failure    | `startup` fails with `PlatformInit` until cleared. |
//! | Scripted resolver  | `resolve` returns a fixed candidate list/error. |
//! | Open failure       | `open` fails for the listed addresses.          |
//! | Send failure       | every `send` fails with the given kind.         |
//! | Zero send          | every `send` reports 0 bytes accepted.          |
//! | Receive failure    | every `recv` fails with the given kind.         |
//!
//! Anything not scripted goes to the real socket, so peers on loopback see
//! real traffic.  Every call is counted in [`Stats`].

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;
use std::thread::{self, JoinHandle};

use tcp_client::{ClientError, SocketApi, SystemSockets};

type Handle = <SystemSockets as SocketApi>::Handle;

/// Per-call ceiling of [`ScriptedSockets`], far below any OS limit.
pub const SMALL_CHUNK: usize = 1000;

#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub startups: usize,
    pub resolves: usize,
    pub opens: usize,
    pub connects: usize,
    pub sends: usize,
    pub recvs: usize,
    pub closes: usize,
    /// Handles returned by `open` and not yet closed.
    pub live_handles: usize,
    /// Largest buffer ever handed to a single `send`.
    pub largest_send: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedSockets {
    candidates: Rc<RefCell<Option<Vec<SocketAddr>>>>,
    fail_startup: Rc<Cell<bool>>,
    resolve_error: Option<String>,
    fail_open: HashSet<SocketAddr>,
    fail_send: Option<io::ErrorKind>,
    zero_send: bool,
    fail_recv: Option<io::ErrorKind>,
    stats: Rc<RefCell<Stats>>,
}

impl ScriptedSockets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every host to `addrs`, in this order.
    pub fn with_candidates(self, addrs: Vec<SocketAddr>) -> Self {
        self.set_candidates(addrs);
        self
    }

    /// Replace the candidate list; clones made earlier see the change.
    pub fn set_candidates(&self, addrs: Vec<SocketAddr>) {
        *self.candidates.borrow_mut() = Some(addrs);
    }

    pub fn failing_startup(self) -> Self {
        self.fail_startup.set(true);
        self
    }

    /// Let `startup` through again; clones made earlier see the change.
    pub fn clear_startup_failure(&self) {
        self.fail_startup.set(false);
    }

    pub fn failing_resolution(mut self, message: &str) -> Self {
        self.resolve_error = Some(message.to_string());
        self
    }

    pub fn failing_open(mut self, addr: SocketAddr) -> Self {
        self.fail_open.insert(addr);
        self
    }

    pub fn failing_sends(mut self, kind: io::ErrorKind) -> Self {
        self.fail_send = Some(kind);
        self
    }

    pub fn zero_sends(mut self) -> Self {
        self.zero_send = true;
        self
    }

    pub fn failing_recvs(mut self, kind: io::ErrorKind) -> Self {
        self.fail_recv = Some(kind);
        self
    }

    pub fn stats(&self) -> Stats {
        self.stats.borrow().clone()
    }
}

impl SocketApi for ScriptedSockets {
    type Handle = Handle;
    const MAX_IO_CHUNK: usize = SMALL_CHUNK;

    fn startup(&self) -> tcp_client::Result<()> {
        self.stats.borrow_mut().startups += 1;
        if self.fail_startup.get() {
            return Err(ClientError::PlatformInit(
                "network subsystem unavailable".into(),
            ));
        }
        SystemSockets.startup()
    }

    fn resolve(&self, host: &str, port: u16) -> tcp_client::Result<Vec<SocketAddr>> {
        self.stats.borrow_mut().resolves += 1;
        if let Some(msg) = &self.resolve_error {
            return Err(ClientError::Resolution(msg.clone()));
        }
        match &*self.candidates.borrow() {
            Some(addrs) => Ok(addrs.clone()),
            None => SystemSockets.resolve(host, port),
        }
    }

    fn open(&self, addr: &SocketAddr) -> io::Result<Handle> {
        self.stats.borrow_mut().opens += 1;
        if self.fail_open.contains(addr) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "address family not supported",
            ));
        }
        let handle = SystemSockets.open(addr)?;
        self.stats.borrow_mut().live_handles += 1;
        Ok(handle)
    }

    fn connect(&self, handle: Handle, addr: &SocketAddr) -> io::Result<()> {
        self.stats.borrow_mut().connects += 1;
        SystemSockets.connect(handle, addr)
    }

    fn send(&self, handle: Handle, buf: &[u8]) -> io::Result<usize> {
        {
            let mut stats = self.stats.borrow_mut();
            stats.sends += 1;
            stats.largest_send = stats.largest_send.max(buf.len());
        }
        if let Some(kind) = self.fail_send {
            return Err(io::Error::new(kind, "scripted send failure"));
        }
        if self.zero_send {
            return Ok(0);
        }
        SystemSockets.send(handle, buf)
    }

    fn recv(&self, handle: Handle, buf: &mut [u8]) -> io::Result<usize> {
        self.stats.borrow_mut().recvs += 1;
        if let Some(kind) = self.fail_recv {
            return Err(io::Error::new(kind, "scripted receive failure"));
        }
        SystemSockets.recv(handle, buf)
    }

    fn close(&self, handle: Handle) {
        {
            let mut stats = self.stats.borrow_mut();
            stats.closes += 1;
            stats.live_handles -= 1;
        }
        SystemSockets.close(handle);
    }
}

// ---------------------------------------------------------------------------
// Loopback peers
// ---------------------------------------------------------------------------

/// Bind a listener on an OS-assigned loopback port.
pub fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    (listener, addr)
}

/// A loopback address nobody listens on.
pub fn closed_port() -> SocketAddr {
    let (listener, addr) = listener();
    drop(listener);
    addr
}

/// Accept one peer, read until it closes, and return everything it sent.
pub fn spawn_sink(listener: TcpListener) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut received = Vec::new();
        stream.read_to_end(&mut received).expect("sink read");
        received
    })
}

/// Accept one peer and echo its bytes back until it closes.
pub fn spawn_echo(listener: TcpListener) -> JoinHandle<()> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stream.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Accept one peer, run `f` on its stream, then close it.
pub fn spawn_peer<F>(listener: TcpListener, f: F) -> JoinHandle<()>
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        f(&mut stream);
    })
}
