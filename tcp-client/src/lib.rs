//! `tcp-client`: a minimal blocking TCP client over raw platform sockets.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  connect / send / receive / close
//!  ┌───▼───────────────────────────────┐
//!  │           Connection              │
//!  │  (owns one handle, move-only)     │
//!  └───┬───────────────────────────────┘
//!      │ resolve / open / connect / send / recv / close
//!  ┌───▼───────┐      ┌────────────┐
//!  │ SocketApi │─────▶│  platform  │  (one-time subsystem startup)
//!  └───┬───────┘      └────────────┘
//!      │ libc (POSIX) or windows-sys (Winsock)
//!      ▼
//!     OS
//! ```
//!
//! Each module has a single responsibility:
//! - [`connection`] : connection lifecycle and the byte-level API
//! - [`sys`]        : the [`sys::SocketApi`] capability trait and per-OS impls
//! - [`platform`]   : lazy process-wide networking initialisation
//! - [`error`]      : [`ClientError`] and the crate `Result` alias
//!
//! ```no_run
//! use tcp_client::Connection;
//!
//! let mut conn = Connection::new();
//! conn.connect("example.com", 80)?;
//! conn.send_str("HEAD / HTTP/1.0\r\n\r\n")?;
//! let reply = conn.receive_default()?;
//! println!("{}", String::from_utf8_lossy(&reply));
//! conn.close();
//! # Ok::<(), tcp_client::ClientError>(())
//! ```

pub mod connection;
pub mod error;
pub mod platform;
pub mod sys;

pub use connection::{Connection, DEFAULT_RECEIVE_SIZE};
pub use error::{ClientError, Result};
pub use sys::{SocketApi, SystemSockets};
