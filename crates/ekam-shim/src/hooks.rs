//! Intercepted libc entry points. Every wrapper here resolves the real
//! symbol via `dlsym(RTLD_NEXT, ..)`, runs the path through
//! [`crate::remap::remap`], and forwards to the real call with whatever
//! path `remap` decided on.
#![allow(unsafe_code, non_camel_case_types)]

use crate::client::{ShimClient, Transport};
use crate::remap::{remap, Remapped, Usage};
use libc::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::sync::{Mutex, OnceLock};

static CLIENT: OnceLock<Mutex<ShimClient>> = OnceLock::new();

fn client() -> &'static Mutex<ShimClient> {
    CLIENT.get_or_init(|| Mutex::new(ShimClient::new()))
}

/// Resolve a real libc symbol via `dlsym(RTLD_NEXT, name)`. `name` must be
/// a NUL-terminated static string.
unsafe fn real_symbol(name: &CStr) -> *mut c_void {
    libc::dlsym(libc::RTLD_NEXT, name.as_ptr())
}

/// Rewrite a NUL-terminated `path` for `usage`, returning the `CString` to
/// pass to the real call, or `None` if the call should fail (ENOENT /
/// EACCES, decided by the caller based on `usage`).
fn remapped_cstring(path: *const c_char, usage: Usage) -> Option<CString> {
    if path.is_null() {
        return None;
    }
    // Safety: `path` is whatever the intercepted caller passed to a libc
    // path-taking function; those are always NUL-terminated C strings.
    let text = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    let mut guard = client().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    match remap(&mut *guard, &text, usage) {
        Remapped::Passthrough(p) | Remapped::Rewritten(p) => CString::new(p).ok(),
        Remapped::NotFound | Remapped::Rejected => None,
    }
}

macro_rules! real_fn {
    ($cache:ident, $name:expr, $ty:ty) => {{
        static $cache: OnceLock<usize> = OnceLock::new();
        let addr = *$cache.get_or_init(|| {
            // Safety: `name` is a valid NUL-terminated literal below.
            unsafe { real_symbol(CStr::from_bytes_with_nul_unchecked($name)) as usize }
        });
        std::mem::transmute::<usize, $ty>(addr)
    }};
}

/// Interposed `open`/`open64`: rewrites the path, then fails with ENOENT if
/// `remap` decided the call cannot proceed.
///
/// # Safety
/// Must only be called the way the dynamic loader calls an interposed
/// libc symbol: `path` a valid NUL-terminated C string, `flags`/`mode`
/// exactly as the original caller supplied them.
#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: c_int) -> c_int {
    let usage = if flags & libc::O_WRONLY != 0 || flags & libc::O_RDWR != 0 || flags & libc::O_CREAT != 0 {
        Usage::Write
    } else {
        Usage::Read
    };
    let Some(rewritten) = remapped_cstring(path, usage) else {
        *errno_location() = libc::ENOENT;
        return -1;
    };
    type OpenFn = unsafe extern "C" fn(*const c_char, c_int, c_int) -> c_int;
    let real: OpenFn = real_fn!(OPEN_REAL, b"open\0", OpenFn);
    real(rewritten.as_ptr(), flags, mode)
}

/// Interposed `stat`.
///
/// # Safety
/// `path` must be a valid NUL-terminated C string; `buf` must be a valid
/// pointer to a `struct stat` the real `stat` can write through.
#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let Some(rewritten) = remapped_cstring(path, Usage::Read) else {
        *errno_location() = libc::ENOENT;
        return -1;
    };
    type StatFn = unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
    let real: StatFn = real_fn!(STAT_REAL, b"stat\0", StatFn);
    real(rewritten.as_ptr(), buf)
}

/// Interposed `lstat`.
///
/// # Safety
/// Same contract as [`stat`].
#[no_mangle]
pub unsafe extern "C" fn lstat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let Some(rewritten) = remapped_cstring(path, Usage::Read) else {
        *errno_location() = libc::ENOENT;
        return -1;
    };
    type LstatFn = unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
    let real: LstatFn = real_fn!(LSTAT_REAL, b"lstat\0", LstatFn);
    real(rewritten.as_ptr(), buf)
}

/// Interposed `access`.
///
/// # Safety
/// `path` must be a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn access(path: *const c_char, mode: c_int) -> c_int {
    let Some(rewritten) = remapped_cstring(path, Usage::Read) else {
        *errno_location() = libc::ENOENT;
        return -1;
    };
    type AccessFn = unsafe extern "C" fn(*const c_char, c_int) -> c_int;
    let real: AccessFn = real_fn!(ACCESS_REAL, b"access\0", AccessFn);
    real(rewritten.as_ptr(), mode)
}

/// Interposed `unlink`.
///
/// # Safety
/// `path` must be a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    let Some(rewritten) = remapped_cstring(path, Usage::Write) else {
        *errno_location() = libc::EACCES;
        return -1;
    };
    type UnlinkFn = unsafe extern "C" fn(*const c_char) -> c_int;
    let real: UnlinkFn = real_fn!(UNLINK_REAL, b"unlink\0", UnlinkFn);
    real(rewritten.as_ptr())
}

fn errno_location() -> *mut c_int {
    // Safety: `__errno_location` is glibc's standard thread-local errno
    // accessor; every call site here runs on the child's own thread.
    unsafe { libc::__errno_location() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remapped_cstring_rejects_null_path() {
        assert!(remapped_cstring(std::ptr::null(), Usage::Read).is_none());
    }
}
