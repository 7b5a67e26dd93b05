// packages/rebind/src/interception/symbol.rs
//! Lookup of the libc definitions the shim shadows
//!
//! The shim's own `bind` hides the C library's. The original is found with
//! `dlsym(RTLD_NEXT, ...)`, which returns the next definition in load order
//! after this object. The result is cached for the life of the process.

use crate::utils::errors::{RebindError, Result};
use libc::{c_int, sockaddr, socklen_t};
use once_cell::sync::OnceCell;
use std::ffi::CStr;
use std::mem;
use tracing::debug;

/// Signature of `bind(2)`
pub type BindFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;

const BIND_SYMBOL: &CStr = c"bind";

static REAL_BIND: OnceCell<BindFn> = OnceCell::new();

/// The real `bind`, resolved on first use.
///
/// Concurrent first callers are serialized by the cell, so every caller
/// observes the same pointer. A failed lookup is not cached.
pub fn real_bind() -> Result<BindFn> {
    REAL_BIND
        .get_or_try_init(|| {
            // SAFETY: BindFn matches the C prototype of bind(2)
            let func = unsafe { resolve_next::<BindFn>(BIND_SYMBOL)? };
            debug!("Resolved real bind at {:p}", func as *const ());
            Ok(func)
        })
        .copied()
}

/// Look up the next definition of `symbol` after this object.
///
/// Resolution is idempotent: repeated lookups of the same name return the
/// same address.
///
/// # Safety
///
/// `F` must be a function pointer type matching the symbol's C prototype.
pub unsafe fn resolve_next<F: Copy>(symbol: &CStr) -> Result<F> {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut libc::c_void>());

    // Clear any stale error so the message below belongs to this lookup
    libc::dlerror();

    let handle = libc::dlsym(libc::RTLD_NEXT, symbol.as_ptr());
    if handle.is_null() {
        let error = libc::dlerror();
        let reason = if error.is_null() {
            "no next definition".to_string()
        } else {
            CStr::from_ptr(error).to_string_lossy().into_owned()
        };

        return Err(RebindError::SymbolNotFound {
            symbol: symbol.to_string_lossy().into_owned(),
            reason,
        });
    }

    Ok(mem::transmute_copy(&handle))
}
