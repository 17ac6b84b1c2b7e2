//! The RPC client half of §4.5: writes a request to the call pipe, reads
//! one reply line from the return pipe, under a lock held across both.

use ekam_rpc::{Frame, LineFrame, Request, Response, RpcError};
use std::collections::HashMap;
use std::io::Read;
use std::os::unix::io::RawFd;

/// Something that can round-trip one [`Request`] into a [`Response`].
/// Lets [`crate::remap::remap`] be exercised against a fake in tests
/// without an inherited pipe pair.
pub trait Transport {
    /// Send `req` and block for its reply.
    fn call(&mut self, req: Request) -> Result<Response, RpcError>;
}

/// The real client: file descriptors 3 (call pipe) and 4 (return pipe),
/// inherited from whatever spawned this rule-invocation child.
pub struct ShimClient {
    frame: LineFrame,
    call_fd: RawFd,
    return_fd: RawFd,
    cache: HashMap<(&'static str, String), Response>,
}

/// Dedicated call-pipe descriptor (§6).
pub const CALL_FD: RawFd = 3;
/// Dedicated return-pipe descriptor (§6).
pub const RETURN_FD: RawFd = 4;

impl ShimClient {
    /// Bind a client to the fixed call/return descriptors.
    #[must_use]
    pub fn new() -> Self {
        ShimClient {
            frame: LineFrame,
            call_fd: CALL_FD,
            return_fd: RETURN_FD,
            cache: HashMap::new(),
        }
    }

    fn write_locked(&self, bytes: &[u8]) -> Result<(), RpcError> {
        flock(self.call_fd)?;
        let result = write_all(self.call_fd, bytes);
        funlock(self.call_fd);
        result.map_err(RpcError::from)
    }

    fn read_reply(&self) -> Result<Response, RpcError> {
        flock(self.return_fd)?;
        let result = read_line(self.return_fd);
        funlock(self.return_fd);
        let line = result.map_err(RpcError::from)?;
        Ok(Response::parse(&line))
    }
}

impl Default for ShimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ShimClient {
    fn call(&mut self, req: Request) -> Result<Response, RpcError> {
        let cache_key = (req.verb(), req.arg().to_string());
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached.clone());
        }
        let bytes = self.frame.encode_request(&req);
        self.write_locked(&bytes)?;
        let resp = self.read_reply()?;
        self.cache.insert(cache_key, resp.clone());
        Ok(resp)
    }
}

fn flock(fd: RawFd) -> Result<(), RpcError> {
    // Safety: `fd` is one of our two fixed, always-open pipe descriptors.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX) };
    if rc != 0 {
        return Err(RpcError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn funlock(fd: RawFd) {
    // Safety: as above; failure to unlock is not actionable here.
    let _ = unsafe { libc::flock(fd, libc::LOCK_UN) };
}

fn write_all(fd: RawFd, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    // Safety: `fd` is a valid, open descriptor for the lifetime of the call.
    let mut file = unsafe { file_from_fd(fd) };
    let result = file.write_all(bytes);
    std::mem::forget(file);
    result
}

fn read_line(fd: RawFd) -> std::io::Result<String> {
    // Safety: as above.
    let mut file = unsafe { file_from_fd(fd) };
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let read = file.read(&mut byte)?;
        if read == 0 || byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    std::mem::forget(file);
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Safety: callers must ensure `fd` stays open for the borrowed `File`'s
/// use and never let the returned `File` run its `Drop` (which would close
/// `fd`); every call site `std::mem::forget`s it immediately after use.
unsafe fn file_from_fd(fd: RawFd) -> std::fs::File {
    use std::os::unix::io::FromRawFd;
    unsafe { std::fs::File::from_raw_fd(fd) }
}
