//! Winsock via `windows-sys`.

use std::ffi::CString;
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;

use windows_sys::Win32::Networking::WinSock::{
    self as ws, ADDRINFOA, AF_INET, AF_INET6, AF_UNSPEC, INVALID_SOCKET, IPPROTO_TCP, SOCKADDR,
    SOCKADDR_IN, SOCKADDR_IN6, SOCKADDR_STORAGE, SOCKET, SOCKET_ERROR, SOCK_STREAM, WSADATA,
};

use crate::error::{ClientError, Result};
use crate::platform;

use super::SocketApi;

/// Winsock 2.2.
const WINSOCK_VERSION: u16 = 0x0202;

extern "C" fn cleanup_at_exit() {
    // SAFETY: paired with the successful WSAStartup in `startup`.
    unsafe {
        ws::WSACleanup();
    }
}

/// Run `WSAStartup` and register `WSACleanup` for process exit.
pub(crate) fn startup() -> std::result::Result<(), String> {
    // SAFETY: WSADATA is plain old data filled in by the call.
    let mut data: WSADATA = unsafe { mem::zeroed() };
    let rc = unsafe { ws::WSAStartup(WINSOCK_VERSION, &mut data) };
    if rc != 0 {
        return Err(format!("WSAStartup failed with error {rc}"));
    }
    // SAFETY: registering a plain extern "C" callback.
    if unsafe { libc::atexit(cleanup_at_exit) } != 0 {
        log::warn!("[platform] could not register WSACleanup at exit");
    }
    Ok(())
}

fn last_error() -> io::Error {
    // SAFETY: no preconditions.
    io::Error::from_raw_os_error(unsafe { ws::WSAGetLastError() })
}

/// The host's Winsock API.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSockets;

impl SocketApi for SystemSockets {
    type Handle = SOCKET;

    // send/recv take an `int` length.
    const MAX_IO_CHUNK: usize = i32::MAX as usize;

    fn startup(&self) -> Result<()> {
        platform::ensure_initialized()
    }

    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        let node = CString::new(host)
            .map_err(|_| ClientError::InvalidArgument("host must not contain NUL bytes"))?;
        let service = CString::new(port.to_string())
            .map_err(|_| ClientError::InvalidArgument("service must not contain NUL bytes"))?;

        // SAFETY: ADDRINFOA is plain old data; all-zero means "no hints".
        let mut hints: ADDRINFOA = unsafe { mem::zeroed() };
        hints.ai_family = AF_UNSPEC as i32;
        hints.ai_socktype = SOCK_STREAM as i32;
        hints.ai_protocol = IPPROTO_TCP as i32;

        let mut head: *mut ADDRINFOA = ptr::null_mut();
        // SAFETY: both strings are NUL-terminated and outlive the call.
        let rc = unsafe {
            ws::getaddrinfo(
                node.as_ptr() as *const u8,
                service.as_ptr() as *const u8,
                &hints,
                &mut head,
            )
        };
        if rc != 0 {
            return Err(ClientError::Resolution(
                io::Error::from_raw_os_error(rc).to_string(),
            ));
        }
        let list = AddrInfoList(head);

        let mut candidates = Vec::new();
        let mut cur = list.0;
        while !cur.is_null() {
            // SAFETY: `cur` is a node of the list returned by getaddrinfo, freed only on drop.
            let ai = unsafe { &*cur };
            if let Some(addr) = unsafe { from_raw(ai.ai_addr) } {
                candidates.push(addr);
            }
            cur = ai.ai_next;
        }
        Ok(candidates)
    }

    fn open(&self, addr: &SocketAddr) -> io::Result<SOCKET> {
        let family = match addr {
            SocketAddr::V4(_) => AF_INET,
            SocketAddr::V6(_) => AF_INET6,
        };
        // SAFETY: plain call, no pointers.
        let handle = unsafe { ws::socket(family as i32, SOCK_STREAM, IPPROTO_TCP as i32) };
        if handle == INVALID_SOCKET {
            return Err(last_error());
        }
        Ok(handle)
    }

    fn connect(&self, handle: SOCKET, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = to_raw(addr);
        // SAFETY: `storage` holds a sockaddr of `len` bytes matching the family.
        let rc = unsafe {
            ws::connect(
                handle,
                &storage as *const SOCKADDR_STORAGE as *const SOCKADDR,
                len,
            )
        };
        if rc == SOCKET_ERROR {
            return Err(last_error());
        }
        Ok(())
    }

    fn send(&self, handle: SOCKET, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(Self::MAX_IO_CHUNK) as i32;
        // SAFETY: `buf` is valid for `len` bytes of reads.
        let n = unsafe { ws::send(handle, buf.as_ptr(), len, 0) };
        if n == SOCKET_ERROR {
            return Err(last_error());
        }
        Ok(n as usize)
    }

    fn recv(&self, handle: SOCKET, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(Self::MAX_IO_CHUNK) as i32;
        // SAFETY: `buf` is valid for `len` bytes of writes.
        let n = unsafe { ws::recv(handle, buf.as_mut_ptr(), len, 0) };
        if n == SOCKET_ERROR {
            return Err(last_error());
        }
        Ok(n as usize)
    }

    fn close(&self, handle: SOCKET) {
        // SAFETY: the caller hands over ownership of `handle`.
        unsafe {
            ws::closesocket(handle);
        }
    }
}

struct AddrInfoList(*mut ADDRINFOA);

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from a successful getaddrinfo call.
            unsafe { ws::freeaddrinfo(self.0) };
        }
    }
}

/// # Safety
///
/// `sa` must be null or point to a sockaddr whose length matches its family.
unsafe fn from_raw(sa: *const SOCKADDR) -> Option<SocketAddr> {
    if sa.is_null() {
        return None;
    }
    match (*sa).sa_family {
        AF_INET => {
            let sin = &*(sa as *const SOCKADDR_IN);
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.S_un.S_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        AF_INET6 => {
            let sin6 = &*(sa as *const SOCKADDR_IN6);
            let ip = Ipv6Addr::from(sin6.sin6_addr.u.Byte);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.Anonymous.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

fn to_raw(addr: &SocketAddr) -> (SOCKADDR_STORAGE, i32) {
    // SAFETY: SOCKADDR_STORAGE is plain old data.
    let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(a) => {
            // SAFETY: SOCKADDR_STORAGE is large and aligned enough for SOCKADDR_IN.
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut SOCKADDR_IN) };
            sin.sin_family = AF_INET;
            sin.sin_port = a.port().to_be();
            sin.sin_addr.S_un.S_addr = u32::from(*a.ip()).to_be();
            mem::size_of::<SOCKADDR_IN>()
        }
        SocketAddr::V6(a) => {
            // SAFETY: SOCKADDR_STORAGE is large and aligned enough for SOCKADDR_IN6.
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut SOCKADDR_IN6) };
            sin6.sin6_family = AF_INET6;
            sin6.sin6_port = a.port().to_be();
            sin6.sin6_flowinfo = a.flowinfo();
            sin6.sin6_addr.u.Byte = a.ip().octets();
            sin6.Anonymous.sin6_scope_id = a.scope_id();
            mem::size_of::<SOCKADDR_IN6>()
        }
    };
    (storage, len as i32)
}
