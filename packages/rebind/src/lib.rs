// packages/rebind/src/lib.rs
//! rebind: move a listening port onto a private loopback port
//!
//! Built as a `cdylib`, this crate is loaded into an unmodified program with
//! `LD_PRELOAD`. Its `bind` shadows the C library's: requests for
//! `REBIND_OLD_PORT` are bound on the loopback interface at
//! `REBIND_NEW_PORT` instead, leaving the public port free for a proxy.
//!
//! ```text
//! LD_PRELOAD=./librebind.so \
//!     REBIND_OLD_PORT=23 \
//!     REBIND_NEW_PORT=2023 \
//!     program
//! ```
//!
//! # Architecture
//!
//! - **interception**: exported hook, real symbol lookup, redirect logic
//! - **observability**: tracing subscriber for the `diagnostics` feature
//! - **utils**: configuration and error types

pub mod interception;
pub mod observability;
pub mod utils;

// Re-export commonly used types
pub use interception::{BindDecision, BindInterceptor, SocketAddress};
pub use utils::config::{RebindConfig, RedirectRule};
pub use utils::errors::{RebindError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Identity of the loaded shim, logged once when diagnostics start
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rebind {} ({}, {})", self.version, self.git_hash, self.rustc_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = BuildInfo::current();
        assert!(!info.git_hash.is_empty());
        assert!(!info.rustc_version.is_empty());

        let line = info.to_string();
        assert!(line.starts_with(&format!("rebind {} (", VERSION)));
        assert!(line.contains(GIT_HASH));
    }
}
