// packages/rebind/src/interception/mod.rs
//! Bind interception layer
//!
//! This module moves a service's listening socket off a public port without
//! touching the service's code:
//!
//! - **Bind Hook**: exported `bind` symbol that shadows the C library's
//! - **Symbol Lookup**: `dlsym(RTLD_NEXT)` resolution of the real `bind`
//! - **Bind Interceptor**: per-call redirect decision and delegation
//! - **Address**: IPv4/IPv6 decoding and loopback rewriting
//!
//! # Architecture
//!
//! ```text
//! Service Code (Unmodified)
//!     │
//!     └─ bind(fd, 0.0.0.0:OLD) → Bind Hook → Bind Interceptor
//!                                               │
//!                      REBIND_OLD_PORT matches? ├─ no  → real bind(fd, 0.0.0.0:OLD)
//!                                               └─ yes → real bind(fd, 127.0.0.1:NEW)
//! ```

pub mod address;
pub mod bind_hook;
pub mod bind_interceptor;
pub mod symbol;

// Re-export commonly used types
pub use address::{RewrittenAddress, SocketAddress, SIN6_LEN_RFC2133, V4_MAPPED_LOOPBACK};
pub use bind_interceptor::{decide, BindDecision, BindInterceptor, PassReason};
pub use symbol::{real_bind, BindFn};
