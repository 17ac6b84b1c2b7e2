// SPDX-License-Identifier: Apache-2.0
//! `LD_PRELOAD` interception library for Ekam rule-invocation children
//! (§4.5, §6). Client side of the rule-invocation RPC: intercepts the
//! filesystem calls a rule process makes, rewrites paths through
//! [`remap::remap`], and forwards to the real libc implementation.
//!
//! Platform-specific by nature (§9 "Interceptor"): this crate is Linux-only
//! and talks to the engine strictly through `ekam-rpc`'s wire format.
#![allow(unsafe_code)]

mod client;
mod hooks;
mod remap;
mod seccomp;

pub use client::{ShimClient, Transport, CALL_FD, RETURN_FD};
pub use remap::{remap, Remapped, Usage};

/// Runs once when this shared object is loaded via `LD_PRELOAD`, before
/// `main` in the preloaded process. Installs the `statx` seccomp filter;
/// logged and ignored on failure (older kernels, or a sandbox that already
/// restricts `prctl`) rather than aborting the child.
#[used]
#[link_section = ".init_array"]
static SHIM_CTOR: extern "C" fn() = shim_init;

extern "C" fn shim_init() {
    // Safety: runs once, before any other thread in this process exists.
    if let Err(err) = unsafe { seccomp::install_statx_filter() } {
        tracing::debug!(error = %err, "statx seccomp filter not installed");
    }
}
