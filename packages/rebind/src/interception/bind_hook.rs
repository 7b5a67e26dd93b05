// packages/rebind/src/interception/bind_hook.rs
//! Exported C entry points
//!
//! When the cdylib is loaded through `LD_PRELOAD` these unmangled
//! definitions shadow the C library's for every caller in the process.

use crate::interception::bind_interceptor::BindInterceptor;
use libc::{c_char, c_int, sockaddr, socklen_t};
use std::io::Write;
use tracing::error;

const VERSION_CSTR: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")\0");

/// Replacement for `bind(2)`.
///
/// A missing real `bind` leaves the process with no way to bind sockets at
/// all, so that case is reported on stderr and the process aborts.
///
/// # Safety
///
/// Same contract as `bind(2)`.
#[no_mangle]
pub unsafe extern "C" fn bind(sockfd: c_int, addr: *const sockaddr, addrlen: socklen_t) -> c_int {
    #[cfg(feature = "diagnostics")]
    crate::observability::ensure_tracing();

    match BindInterceptor::resolve() {
        Ok(interceptor) => interceptor.bind(sockfd, addr, addrlen),
        Err(e) => {
            error!("Cannot continue: {}", e);
            let _ = writeln!(std::io::stderr(), "rebind: {}", e);
            std::process::abort()
        }
    }
}

/// Version of the preloaded shim as a static NUL-terminated string
#[no_mangle]
pub extern "C" fn rebind_version() -> *const c_char {
    VERSION_CSTR.as_ptr().cast()
}
