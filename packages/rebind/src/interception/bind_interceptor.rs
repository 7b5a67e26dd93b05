// packages/rebind/src/interception/bind_interceptor.rs
//! Bind interceptor
//!
//! Decides, per call, whether a bind request is forwarded untouched or moved
//! onto the loopback interface, then delegates to the real `bind`. The real
//! call's return value and `errno` always reach the caller unchanged.

use crate::interception::address::{RewrittenAddress, SocketAddress};
use crate::interception::symbol::{real_bind, BindFn};
use crate::utils::config::RebindConfig;
use crate::utils::errors::Result;
use libc::{c_int, sa_family_t, sockaddr, socklen_t};
use nix::errno::Errno;
use std::mem;
use tracing::{debug, trace, warn};

/// Why a request was forwarded untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Null address, a family other than IPv4/IPv6, or a structure the
    /// kernel would reject: `AF_INET` shorter than `sockaddr_in`, `AF_INET6`
    /// shorter than `SIN6_LEN_RFC2133` (24 bytes, no scope id)
    UnsupportedFamily,

    /// Redirect variables missing, empty, or malformed
    NotConfigured,

    /// Requested port differs from the configured old port
    PortMismatch,
}

/// Outcome of inspecting one bind request
#[derive(Debug, Clone, Copy)]
pub enum BindDecision {
    PassThrough(PassReason),
    Redirect {
        from: SocketAddress,
        to: SocketAddress,
    },
}

/// Decide what to do with a decoded IPv4/IPv6 request
pub fn decide(request: &SocketAddress, config: Result<RebindConfig>) -> BindDecision {
    let rule = match config.and_then(|config| config.redirect_rule()) {
        Ok(rule) => rule,
        Err(e) => {
            trace!("Redirect disabled: {}", e);
            return BindDecision::PassThrough(PassReason::NotConfigured);
        }
    };

    if !rule.applies_to(request.port()) {
        return BindDecision::PassThrough(PassReason::PortMismatch);
    }

    BindDecision::Redirect {
        from: *request,
        to: request.redirect_to_loopback(rule.new_port.get()),
    }
}

/// Stands in for `bind(2)` in front of the real implementation
#[derive(Clone, Copy)]
pub struct BindInterceptor {
    real: BindFn,
}

impl BindInterceptor {
    /// Wrap an explicit `bind` implementation
    pub fn new(real: BindFn) -> Self {
        Self { real }
    }

    /// Wrap the next `bind` after this object in load order
    pub fn resolve() -> Result<Self> {
        Ok(Self::new(real_bind()?))
    }

    /// Intercept one call, reading the redirect settings from the environment.
    ///
    /// # Safety
    ///
    /// Same contract as `bind(2)`: `addr` must be null or point to `addrlen`
    /// readable bytes.
    pub unsafe fn bind(&self, sockfd: c_int, addr: *const sockaddr, addrlen: socklen_t) -> c_int {
        self.bind_with(sockfd, addr, addrlen, RebindConfig::load)
    }

    /// Intercept one call with an explicit settings loader.
    ///
    /// The loader only runs for IPv4/IPv6 requests.
    ///
    /// # Safety
    ///
    /// Same contract as `bind(2)`.
    pub unsafe fn bind_with<F>(
        &self,
        sockfd: c_int,
        addr: *const sockaddr,
        addrlen: socklen_t,
        load_config: F,
    ) -> c_int
    where
        F: FnOnce() -> Result<RebindConfig>,
    {
        let request = SocketAddress::from_raw(addr, addrlen);

        match request {
            Some(ref req) => debug!(
                ">> bind({}, family {}, len {}), askaddr {}, askport {}",
                sockfd,
                req.family(),
                addrlen,
                req.ip(),
                req.port()
            ),
            None => debug!(
                ">> bind({}, family {}, len {})",
                sockfd,
                raw_family(addr, addrlen),
                addrlen
            ),
        }

        let decision = match request {
            Some(ref req) => decide(req, load_config()),
            None => BindDecision::PassThrough(PassReason::UnsupportedFamily),
        };

        match decision {
            BindDecision::PassThrough(reason) => {
                let ret = (self.real)(sockfd, addr, addrlen);
                let errno = SavedErrno::capture();
                debug!("<< bind({}, _, {}) ret {} ({:?})", sockfd, addrlen, ret, reason);
                errno.restore();
                ret
            }
            BindDecision::Redirect { from, to } => {
                debug!("Binding fd {} on {} instead of {}", sockfd, to, from);

                if let SocketAddress::V6(_) = to {
                    // Best-effort: without this only IPv6 clients could reach
                    // the mapped loopback address.
                    if let Err(e) = clear_v6_only(sockfd) {
                        warn!("Could not clear IPV6_V6ONLY on fd {}: {}", sockfd, e);
                    }
                }

                let rewritten = RewrittenAddress::new(addr, addrlen, &to);
                let ret = (self.real)(sockfd, rewritten.as_ptr(), rewritten.len());
                let errno = SavedErrno::capture();
                debug!("<< bind({}, _, {}) ret {}", sockfd, rewritten.len(), ret);
                errno.restore();
                ret
            }
        }
    }
}

/// Allow IPv4-mapped traffic on an IPv6 socket
pub fn clear_v6_only(sockfd: c_int) -> Result<()> {
    let off: c_int = 0;

    // SAFETY: the option value is a live c_int of the advertised size
    let ret = unsafe {
        libc::setsockopt(
            sockfd,
            libc::IPPROTO_IPV6,
            libc::IPV6_V6ONLY,
            (&off as *const c_int).cast(),
            mem::size_of::<c_int>() as socklen_t,
        )
    };
    Errno::result(ret)?;

    Ok(())
}

/// Family of a raw address, for diagnostics
unsafe fn raw_family(addr: *const sockaddr, addrlen: socklen_t) -> c_int {
    let needed = mem::offset_of!(sockaddr, sa_family) + mem::size_of::<sa_family_t>();
    if addr.is_null() || (addrlen as usize) < needed {
        return libc::AF_UNSPEC;
    }
    c_int::from(std::ptr::read_unaligned(std::ptr::addr_of!((*addr).sa_family)))
}

/// `errno` as left by the real call
struct SavedErrno(c_int);

impl SavedErrno {
    fn capture() -> Self {
        Self(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }

    fn restore(self) {
        // SAFETY: errno_location points at this thread's errno
        unsafe { *errno_location() = self.0 }
    }
}

#[cfg(target_os = "linux")]
unsafe fn errno_location() -> *mut c_int {
    libc::__errno_location()
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
unsafe fn errno_location() -> *mut c_int {
    libc::__error()
}

#[cfg(any(target_os = "android", target_os = "netbsd", target_os = "openbsd"))]
unsafe fn errno_location() -> *mut c_int {
    libc::__errno()
}
