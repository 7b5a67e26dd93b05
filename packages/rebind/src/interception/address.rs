// packages/rebind/src/interception/address.rs
//! Socket addresses seen by the bind hook
//!
//! Raw `sockaddr` pointers coming from the caller are decoded into a
//! [`SocketAddress`], a tagged union over the two families the shim knows
//! how to redirect. Redirected requests are rebuilt in a private
//! [`RewrittenAddress`] buffer so the caller's structure is never written.

use libc::{c_int, sa_family_t, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t};
use std::fmt;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;

/// IPv4 loopback expressed as an IPv4-mapped IPv6 address (`::ffff:127.0.0.1`)
pub const V4_MAPPED_LOOPBACK: Ipv6Addr = Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0x7f00, 0x0001);

/// Shortest `AF_INET6` structure the kernel accepts: RFC 2133 layout,
/// without `sin6_scope_id`
pub const SIN6_LEN_RFC2133: usize = mem::offset_of!(sockaddr_in6, sin6_scope_id);

/// A decoded IPv4 or IPv6 socket address
#[derive(Clone, Copy)]
pub enum SocketAddress {
    V4(sockaddr_in),
    V6(sockaddr_in6),
}

impl SocketAddress {
    /// Decode a caller-supplied address.
    ///
    /// Returns `None` for a null pointer, for families other than
    /// `AF_INET`/`AF_INET6`, for `AF_INET` lengths below `sockaddr_in`, and
    /// for `AF_INET6` lengths below [`SIN6_LEN_RFC2133`]. The kernel rejects
    /// those itself, so they are left for the real `bind` to report.
    ///
    /// An `AF_INET6` structure without a scope id decodes with scope 0.
    ///
    /// # Safety
    ///
    /// `addr` must be null or point to at least `len` readable bytes.
    pub unsafe fn from_raw(addr: *const sockaddr, len: socklen_t) -> Option<Self> {
        let len = len as usize;
        if addr.is_null() || len < mem::size_of::<sockaddr_in>() {
            return None;
        }

        let family = ptr::read_unaligned(ptr::addr_of!((*addr).sa_family));
        match c_int::from(family) {
            libc::AF_INET => Some(Self::V4(ptr::read_unaligned(addr.cast::<sockaddr_in>()))),
            libc::AF_INET6 if len >= SIN6_LEN_RFC2133 => {
                let mut sin6: sockaddr_in6 = mem::zeroed();
                ptr::copy_nonoverlapping(
                    addr.cast::<u8>(),
                    ptr::addr_of_mut!(sin6).cast::<u8>(),
                    len.min(mem::size_of::<sockaddr_in6>()),
                );
                Some(Self::V6(sin6))
            }
            _ => None,
        }
    }

    /// Build the C representation of a standard library address
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => {
                // SAFETY: sockaddr_in is plain old data; all-zero is valid
                let mut sin: sockaddr_in = unsafe { mem::zeroed() };
                sin.sin_family = libc::AF_INET as sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr.s_addr = u32::from(*v4.ip()).to_be();
                #[cfg(any(
                    target_os = "macos",
                    target_os = "ios",
                    target_os = "freebsd",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "dragonfly"
                ))]
                {
                    sin.sin_len = mem::size_of::<sockaddr_in>() as u8;
                }
                Self::V4(sin)
            }
            SocketAddr::V6(v6) => {
                // SAFETY: sockaddr_in6 is plain old data; all-zero is valid
                let mut sin6: sockaddr_in6 = unsafe { mem::zeroed() };
                sin6.sin6_family = libc::AF_INET6 as sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr.s6_addr = v6.ip().octets();
                sin6.sin6_scope_id = v6.scope_id();
                #[cfg(any(
                    target_os = "macos",
                    target_os = "ios",
                    target_os = "freebsd",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "dragonfly"
                ))]
                {
                    sin6.sin6_len = mem::size_of::<sockaddr_in6>() as u8;
                }
                Self::V6(sin6)
            }
        }
    }

    /// Convert back to a standard library address
    pub fn to_socket_addr(&self) -> SocketAddr {
        match self {
            Self::V4(sin) => SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)),
                u16::from_be(sin.sin_port),
            )),
            Self::V6(sin6) => SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )),
        }
    }

    pub fn family(&self) -> c_int {
        match self {
            Self::V4(_) => libc::AF_INET,
            Self::V6(_) => libc::AF_INET6,
        }
    }

    /// Requested port in host byte order
    pub fn port(&self) -> u16 {
        match self {
            Self::V4(sin) => u16::from_be(sin.sin_port),
            Self::V6(sin6) => u16::from_be(sin6.sin6_port),
        }
    }

    /// Requested IP, for diagnostics
    pub fn ip(&self) -> IpAddr {
        self.to_socket_addr().ip()
    }

    /// Size of the family's C structure
    pub fn struct_len(&self) -> socklen_t {
        match self {
            Self::V4(_) => mem::size_of::<sockaddr_in>() as socklen_t,
            Self::V6(_) => mem::size_of::<sockaddr_in6>() as socklen_t,
        }
    }

    /// Same address moved onto the loopback interface at `port`.
    ///
    /// IPv6 requests get `::ffff:127.0.0.1` with a zero scope id so the
    /// socket stays reachable from IPv4 clients once `IPV6_V6ONLY` is off.
    pub fn redirect_to_loopback(&self, port: u16) -> Self {
        match *self {
            Self::V4(mut sin) => {
                sin.sin_addr.s_addr = u32::from(Ipv4Addr::LOCALHOST).to_be();
                sin.sin_port = port.to_be();
                Self::V4(sin)
            }
            Self::V6(mut sin6) => {
                sin6.sin6_addr.s6_addr = V4_MAPPED_LOOPBACK.octets();
                sin6.sin6_port = port.to_be();
                sin6.sin6_scope_id = 0;
                Self::V6(sin6)
            }
        }
    }

    pub fn as_ptr(&self) -> *const sockaddr {
        match self {
            Self::V4(sin) => (sin as *const sockaddr_in).cast(),
            Self::V6(sin6) => (sin6 as *const sockaddr_in6).cast(),
        }
    }
}

impl fmt::Debug for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(_) => f.debug_tuple("V4").field(&self.to_socket_addr()).finish(),
            Self::V6(_) => f.debug_tuple("V6").field(&self.to_socket_addr()).finish(),
        }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_socket_addr(), f)
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::from_socket_addr(&addr)
    }
}

/// Private copy of a caller's address with the redirect applied.
///
/// The copy is capped at [`RewrittenAddress::CAPACITY`] bytes. A longer
/// declared length is truncated to the capacity rather than rejected, and
/// the truncated length is what gets passed on to the real `bind`.
pub struct RewrittenAddress {
    storage: sockaddr_storage,
    len: socklen_t,
}

impl RewrittenAddress {
    /// Bytes available in the private buffer
    pub const CAPACITY: usize = mem::size_of::<sockaddr_storage>();

    /// Copy the caller's structure and overlay `rewritten` on top of it.
    ///
    /// # Safety
    ///
    /// `original` must point to at least `len` readable bytes.
    pub unsafe fn new(original: *const sockaddr, len: socklen_t, rewritten: &SocketAddress) -> Self {
        let mut storage: sockaddr_storage = mem::zeroed();
        let copy_len = (len as usize).min(Self::CAPACITY);

        ptr::copy_nonoverlapping(
            original.cast::<u8>(),
            ptr::addr_of_mut!(storage).cast::<u8>(),
            copy_len,
        );

        match rewritten {
            SocketAddress::V4(sin) => {
                ptr::write(ptr::addr_of_mut!(storage).cast::<sockaddr_in>(), *sin)
            }
            SocketAddress::V6(sin6) => {
                ptr::write(ptr::addr_of_mut!(storage).cast::<sockaddr_in6>(), *sin6)
            }
        }

        Self {
            storage,
            len: copy_len as socklen_t,
        }
    }

    pub fn as_ptr(&self) -> *const sockaddr {
        ptr::addr_of!(self.storage).cast()
    }

    /// Length passed to the real `bind`, possibly truncated
    pub fn len(&self) -> socklen_t {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the rewritten buffer again
    pub fn address(&self) -> Option<SocketAddress> {
        // SAFETY: storage is owned and `len` never exceeds its size
        unsafe { SocketAddress::from_raw(self.as_ptr(), self.len) }
    }
}
