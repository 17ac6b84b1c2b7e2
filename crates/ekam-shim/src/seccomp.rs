//! The seccomp filter that makes `statx` fail with `ENOSYS` (§4.5 "The shim
//! also installs a seccomp filter on Linux to return `ENOSYS` for `statx`,
//! since that syscall has no libc wrapper to interpose").
#![allow(unsafe_code)]

use libc::{c_ushort, c_void};

const BPF_LD: u16 = 0x00;
const BPF_W: u16 = 0x00;
const BPF_ABS: u16 = 0x20;
const BPF_JMP: u16 = 0x05;
const BPF_JEQ: u16 = 0x10;
const BPF_K: u16 = 0x00;
const BPF_RET: u16 = 0x06;

const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

#[repr(C)]
struct SockFilter {
    code: c_ushort,
    jt: u8,
    jf: u8,
    k: u32,
}

#[repr(C)]
struct SockFprog {
    len: c_ushort,
    filter: *const SockFilter,
}

fn insn(code: u16, jt: u8, jf: u8, k: u32) -> SockFilter {
    SockFilter { code, jt, jf, k }
}

/// Install a seccomp-bpf filter that returns `ENOSYS` for the `statx`
/// syscall and allows everything else. A no-op (returns `Err`) if the
/// kernel rejects it; callers treat that as "statx falls through
/// unintercepted" rather than aborting the build.
///
/// # Safety
/// Calls `prctl(PR_SET_SECCOMP, ...)`, which replaces this process's
/// syscall filter irreversibly. Must only be called once, before any
/// thread the filter should not apply to has been spawned.
pub unsafe fn install_statx_filter() -> std::io::Result<()> {
    let offset_nr = memoffset_nr();
    let program = [
        insn(BPF_LD | BPF_W | BPF_ABS, 0, 0, offset_nr),
        insn(BPF_JMP | BPF_JEQ | BPF_K, 0, 1, libc::SYS_statx as u32),
        insn(BPF_RET | BPF_K, 0, 0, SECCOMP_RET_ERRNO | (libc::ENOSYS as u32 & 0xffff)),
        insn(BPF_RET | BPF_K, 0, 0, SECCOMP_RET_ALLOW),
    ];
    let fprog = SockFprog {
        len: program.len() as c_ushort,
        filter: program.as_ptr(),
    };

    // NO_NEW_PRIVS is required before PR_SET_SECCOMP for an unprivileged process.
    if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let rc = libc::prctl(
        libc::PR_SET_SECCOMP,
        libc::SECCOMP_MODE_FILTER,
        std::ptr::addr_of!(fprog) as *const c_void,
        0,
        0,
    );
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Byte offset of `seccomp_data.nr` within the kernel's `struct
/// seccomp_data`: architecture-independent layout, always the first `u32`.
fn memoffset_nr() -> u32 {
    0
}
