//! Platform socket layer.
//!
//! [`SocketApi`] is the capability set a [`crate::connection::Connection`]
//! needs from the operating system: resolve, create, connect, send, receive
//! and close.  Each platform gets one implementation, exported here as
//! [`SystemSockets`].  All connection logic lives elsewhere; this module owns
//! only the raw calls.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::error::Result;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::SystemSockets;
#[cfg(windows)]
pub use windows::SystemSockets;

#[cfg(unix)]
pub(crate) use unix::startup;
#[cfg(windows)]
pub(crate) use windows::startup;

/// Raw socket operations used by a connection.
///
/// Handles are plain values; ownership is tracked by the caller, which must
/// pass every handle returned by [`SocketApi::open`] to [`SocketApi::close`]
/// exactly once.
pub trait SocketApi {
    /// OS identifier for an open socket.
    type Handle: Copy + fmt::Debug;

    /// Largest byte count a single `send`/`recv` call may be asked for.
    const MAX_IO_CHUNK: usize;

    /// Bring up whatever process-wide state the socket calls depend on.
    fn startup(&self) -> Result<()> {
        Ok(())
    }

    /// Resolve `host` and `port` into stream-socket candidates, in resolver order.
    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>>;

    /// Create an unconnected TCP socket matching the family of `addr`.
    fn open(&self, addr: &SocketAddr) -> io::Result<Self::Handle>;

    /// Connect `handle` to `addr`, blocking until the OS answers.
    fn connect(&self, handle: Self::Handle, addr: &SocketAddr) -> io::Result<()>;

    /// One send call; returns how many bytes the OS accepted.
    fn send(&self, handle: Self::Handle, buf: &[u8]) -> io::Result<usize>;

    /// One receive call; `Ok(0)` signals orderly shutdown by the peer.
    fn recv(&self, handle: Self::Handle, buf: &mut [u8]) -> io::Result<usize>;

    /// Release `handle`; errors from the OS are ignored.
    fn close(&self, handle: Self::Handle);
}
