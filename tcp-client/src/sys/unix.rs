//! POSIX sockets via `libc`.

use std::ffi::{CStr, CString};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;
use std::ptr;

use crate::error::{ClientError, Result};
use crate::platform;

use super::SocketApi;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SOCKET_TYPE: libc::c_int = libc::SOCK_STREAM | libc::SOCK_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SOCKET_TYPE: libc::c_int = libc::SOCK_STREAM;

/// POSIX needs no subsystem startup.
pub(crate) fn startup() -> std::result::Result<(), String> {
    Ok(())
}

/// The host's BSD socket API.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSockets;

impl SocketApi for SystemSockets {
    type Handle = RawFd;

    // send/recv return ssize_t.
    const MAX_IO_CHUNK: usize = isize::MAX as usize;

    fn startup(&self) -> Result<()> {
        platform::ensure_initialized()
    }

    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        let node = CString::new(host)
            .map_err(|_| ClientError::InvalidArgument("host must not contain NUL bytes"))?;
        let service = CString::new(port.to_string())
            .map_err(|_| ClientError::InvalidArgument("service must not contain NUL bytes"))?;

        // SAFETY: addrinfo is plain old data; all-zero is the documented "no hints" value.
        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;
        hints.ai_protocol = libc::IPPROTO_TCP;

        let mut head: *mut libc::addrinfo = ptr::null_mut();
        // SAFETY: both strings are NUL-terminated and outlive the call.
        let rc = unsafe { libc::getaddrinfo(node.as_ptr(), service.as_ptr(), &hints, &mut head) };
        if rc != 0 {
            return Err(ClientError::Resolution(gai_message(rc)));
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

    fn open(&self, addr: &SocketAddr) -> io::Result<RawFd> {
        let family = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        // SAFETY: plain syscall, no pointers.
        let fd = unsafe { libc::socket(family, SOCKET_TYPE, libc::IPPROTO_TCP) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(fd)
    }

    fn connect(&self, handle: RawFd, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = to_raw(addr);
        // SAFETY: `storage` holds a sockaddr of `len` bytes matching the family.
        let rc = unsafe {
            libc::connect(
                handle,
                &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn send(&self, handle: RawFd, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for `buf.len()` bytes of reads.
        let n = unsafe {
            libc::send(handle, buf.as_ptr() as *const libc::c_void, buf.len(), SEND_FLAGS)
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn recv(&self, handle: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for `buf.len()` bytes of writes.
        let n = unsafe { libc::recv(handle, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn close(&self, handle: RawFd) {
        // SAFETY: the caller hands over ownership of `handle`.
        unsafe {
            libc::close(handle);
        }
    }
}

/// Owns a getaddrinfo result list and frees it on drop.
struct AddrInfoList(*mut libc::addrinfo);

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from a successful getaddrinfo call.
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

fn gai_message(rc: libc::c_int) -> String {
    if rc == libc::EAI_SYSTEM {
        return io::Error::last_os_error().to_string();
    }
    // SAFETY: gai_strerror returns a static NUL-terminated string.
    unsafe { CStr::from_ptr(libc::gai_strerror(rc)) }
        .to_string_lossy()
        .into_owned()
}

/// Decode an IPv4 or IPv6 sockaddr; other families yield `None`.
///
/// # Safety
///
/// `sa` must be null or point to a sockaddr whose length matches its family.
unsafe fn from_raw(sa: *const libc::sockaddr) -> Option<SocketAddr> {
    if sa.is_null() {
        return None;
    }
    match (*sa).sa_family as libc::c_int {
        libc::AF_INET => {
            let sin = &*(sa as *const libc::sockaddr_in);
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        libc::AF_INET6 => {
            let sin6 = &*(sa as *const libc::sockaddr_in6);
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

/// Encode `addr` as a sockaddr suitable for `connect`.
fn to_raw(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    // SAFETY: sockaddr_storage is plain old data.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(a) => {
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in.
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = a.port().to_be();
            sin.sin_addr.s_addr = u32::from(*a.ip()).to_be();
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(a) => {
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in6.
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = a.port().to_be();
            sin6.sin6_flowinfo = a.flowinfo();
            sin6.sin6_addr.s6_addr = a.ip().octets();
            sin6.sin6_scope_id = a.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(addr: SocketAddr) -> Option<SocketAddr> {
        let (storage, _) = to_raw(&addr);
        unsafe { from_raw(&storage as *const libc::sockaddr_storage as *const libc::sockaddr) }
    }

    #[test]
    fn sockaddr_conversion_preserves_v4_and_v6() {
        let v4: SocketAddr = "192.0.2.7:8080".parse().unwrap();
        assert_eq!(round_trip(v4), Some(v4));

        let v6 = SocketAddr::V6(SocketAddrV6::new("2001:db8::1".parse().unwrap(), 443, 0, 3));
        assert_eq!(round_trip(v6), Some(v6));
    }

    #[test]
    fn resolve_numeric_loopback() {
        let addrs = SystemSockets.resolve("127.0.0.1", 7).expect("numeric host resolves");
        assert_eq!(addrs, vec!["127.0.0.1:7".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn resolve_rejects_interior_nul() {
        let err = SystemSockets.resolve("local\0host", 80).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)), "got {err:?}");
    }

    #[test]
    fn resolve_unknown_host_reports_resolver_text() {
        let err = SystemSockets
            .resolve("does-not-exist.invalid", 80)
            .unwrap_err();
        match err {
            ClientError::Resolution(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Resolution, got {other:?}"),
        }
    }
}
