//! Blocking TCP connection.
//!
//! A [`Connection`] owns at most one OS socket handle.  Its lifecycle is:
//!
//! ```text
//!  new() ──connect()──▶ connected ──send()/receive()──▶ connected
//!    ▲                      │
//!    │   close() / drop / take() / peer shutdown seen by receive()
//!    └──────────────────────┘
//! ```
//!
//! Every call blocks the calling thread until the OS returns.  There are no
//! timeouts and no internal retries: `connect` makes one pass over the
//! resolved candidates and `receive` makes exactly one receive call.

use std::io;
use std::net::SocketAddr;

use crate::error::{ClientError, Result};
use crate::sys::{SocketApi, SystemSockets};

/// Buffer size used by [`Connection::receive_default`].
pub const DEFAULT_RECEIVE_SIZE: usize = 4096;

/// An exclusively owned, blocking TCP client socket.
///
/// `Connection` is move-only: it is not `Clone`, and [`Connection::take`]
/// transfers the handle out explicitly, leaving the source disconnected.
/// Dropping a connection closes its handle.
pub struct Connection<S: SocketApi = SystemSockets> {
    api: S,
    /// `Some` exactly while connected.
    handle: Option<S::Handle>,
    peer: Option<SocketAddr>,
    /// Set when a receive saw orderly shutdown; cleared by `connect`.
    peer_shutdown: bool,
}

impl Connection<SystemSockets> {
    /// A disconnected connection backed by the host's sockets.
    pub fn new() -> Self {
        Self::with_api(SystemSockets)
    }
}

impl Default for Connection<SystemSockets> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SocketApi> Connection<S> {
    /// A disconnected connection driven by `api`.
    pub fn with_api(api: S) -> Self {
        Self {
            api,
            handle: None,
            peer: None,
            peer_shutdown: false,
        }
    }

    /// Resolve `host` and connect to the first candidate address that accepts.
    ///
    /// Any existing connection is closed first.  Candidates are tried once
    /// each, in resolver order; sockets for failed attempts are closed before
    /// the next one is tried.  On failure the connection is left
    /// disconnected.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if host.is_empty() {
            return Err(ClientError::InvalidArgument("host must not be empty"));
        }

        self.close();
        self.peer_shutdown = false;
        self.api.startup()?;

        let candidates = self.api.resolve(host, port)?;
        if candidates.is_empty() {
            return Err(ClientError::Resolution("no addresses resolved".into()));
        }
        log::debug!("[conn] {host}:{port} resolved to {} candidate(s)", candidates.len());

        let mut last_err = None;
        for addr in candidates {
            let handle = match self.api.open(&addr) {
                Ok(h) => h,
                Err(e) => {
                    log::debug!("[conn] socket for {addr} failed: {e}");
                    last_err = Some(e);
                    continue;
                }
            };

            match self.api.connect(handle, &addr) {
                Ok(()) => {
                    log::debug!("[conn] connected to {addr}");
                    self.handle = Some(handle);
                    self.peer = Some(addr);
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("[conn] connect to {addr} failed: {e}");
                    self.api.close(handle);
                    last_err = Some(e);
                }
            }
        }

        Err(ClientError::Connect(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no candidate accepted")
        })))
    }

    /// Send all of `data`, issuing as many OS calls as needed.
    ///
    /// Returns `data.len()` on success; a short write is never reported, any
    /// failure is an error.
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        let handle = self.connected_handle()?;

        let mut total = 0;
        while total < data.len() {
            let chunk = (data.len() - total).min(S::MAX_IO_CHUNK);
            match self.api.send(handle, &data[total..total + chunk]) {
                Ok(0) => {
                    return Err(ClientError::Send(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "send accepted zero bytes",
                    )));
                }
                Ok(n) => total += n,
                Err(e) => return Err(ClientError::Send(e)),
            }
        }
        Ok(total)
    }

    /// Send the bytes of `text`.  An empty string returns `Ok(0)` without
    /// touching the socket, even when disconnected.
    pub fn send_str(&mut self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        self.send(text.as_bytes())
    }

    /// Make one receive call for up to `max_bytes`.
    ///
    /// The result holds exactly the bytes the OS returned and may be shorter
    /// than `max_bytes`.  An empty result means either `max_bytes == 0` or
    /// that the peer shut down its side; in the latter case the connection is
    /// closed and [`Connection::is_connected`] turns false.  An OS error, or
    /// a buffer that cannot be allocated, leaves the connection as it was.
    pub fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let handle = self.connected_handle()?;
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        let len = max_bytes.min(S::MAX_IO_CHUNK);
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| {
            ClientError::Receive(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "receive buffer could not be allocated",
            ))
        })?;
        buf.resize(len, 0);

        let n = self.recv_into(handle, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// [`Connection::receive`] with [`DEFAULT_RECEIVE_SIZE`].
    pub fn receive_default(&mut self) -> Result<Vec<u8>> {
        self.receive(DEFAULT_RECEIVE_SIZE)
    }

    /// Release the handle, if any.  Safe to call repeatedly.
    pub fn close(&mut self) {
        let peer = self.peer.take();
        if let Some(handle) = self.handle.take() {
            self.api.close(handle);
            if let Some(peer) = peer {
                log::debug!("[conn] closed connection to {peer}");
            }
        }
    }

    /// Whether a handle is held; performs no I/O.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Move the handle into a new `Connection`, leaving `self` disconnected.
    pub fn take(&mut self) -> Self
    where
        S: Clone,
    {
        Self {
            api: self.api.clone(),
            handle: self.handle.take(),
            peer: self.peer.take(),
            peer_shutdown: std::mem::take(&mut self.peer_shutdown),
        }
    }

    /// One OS receive into `buf`; on orderly shutdown closes the handle and
    /// returns `Ok(0)`.
    fn recv_into(&mut self, handle: S::Handle, buf: &mut [u8]) -> Result<usize> {
        match self.api.recv(handle, buf) {
            Ok(0) => {
                log::debug!("[conn] peer closed the connection");
                self.close();
                self.peer_shutdown = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(ClientError::Receive(e)),
        }
    }

    fn connected_handle(&self) -> Result<S::Handle> {
        self.handle.ok_or(ClientError::NotConnected)
    }
}

impl<S: SocketApi> Drop for Connection<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: SocketApi> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("peer", &self.peer)
            .field("peer_shutdown", &self.peer_shutdown)
            .finish()
    }
}

impl<S: SocketApi> io::Read for Connection<S> {
    /// One receive call into `buf`.  Once the peer has shut down every
    /// further read returns `Ok(0)`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let handle = match self.handle {
            Some(h) => h,
            None if self.peer_shutdown => return Ok(0),
            None => return Err(ClientError::NotConnected.into()),
        };
        if buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min(S::MAX_IO_CHUNK);
        Ok(self.recv_into(handle, &mut buf[..len])?)
    }
}

impl<S: SocketApi> io::Write for Connection<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.send(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
