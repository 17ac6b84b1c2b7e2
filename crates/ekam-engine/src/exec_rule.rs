//! `ExecRuleFactory`: discovers rules as executables under a project-local
//! rules directory (distilled from the original's `ExecPluginActionFactory`)
//! instead of requiring every rule to be a compiled-in Rust
//! [`ActionFactory`]. A rule is asked for its trigger tags once, at
//! discovery time, then spawned as a child process per matching file with
//! the rule-invocation RPC pipes (§4.5) on file descriptors 3/4.
#![allow(unsafe_code)]

use ekam_core::Tag;
use ekam_driver::{Action, ActionContext, ActionFactory};
use ekam_fs::Artifact;
use ekam_rpc::{dispatch, Frame, LineFrame};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Environment variable the shim reads for its remap bypass list (§6).
const BYPASS_ENV: &str = "EKAM_REMAP_BYPASS_DIRS";

/// One rule discovered under `<root>/.ekam-rules/`.
#[derive(Debug, Clone)]
pub struct ExecRuleFactory {
    executable: PathBuf,
    trigger_tags: Vec<Tag>,
    bypass_dirs: Vec<PathBuf>,
    shim_path: PathBuf,
}

impl ExecRuleFactory {
    /// Scan `rules_dir` for executable files and ask each one for its
    /// trigger tags via `--ekam-trigger-tags` (one tag name per line of
    /// stdout). Rules that fail to run or report no tags are skipped with
    /// a warning rather than aborting discovery.
    pub fn discover(
        rules_dir: &Path,
        bypass_dirs: &[PathBuf],
        shim_path: &Path,
    ) -> std::io::Result<Vec<ExecRuleFactory>> {
        let mut factories = Vec::new();
        let entries = match fs::read_dir(rules_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(factories),
            Err(err) => return Err(err),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !is_executable(&path) {
                continue;
            }
            match query_trigger_tags(&path) {
                Ok(tags) if !tags.is_empty() => factories.push(ExecRuleFactory {
                    executable: path,
                    trigger_tags: tags,
                    bypass_dirs: bypass_dirs.to_vec(),
                    shim_path: shim_path.to_path_buf(),
                }),
                Ok(_) => tracing::warn!(rule = %path.display(), "reported no trigger tags, skipping"),
                Err(err) => tracing::warn!(rule = %path.display(), error = %err, "failed to query trigger tags"),
            }
        }
        Ok(factories)
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

fn query_trigger_tags(executable: &Path) -> std::io::Result<Vec<Tag>> {
    let output = Command::new(executable)
        .arg("--ekam-trigger-tags")
        .stdin(Stdio::null())
        .output()?;
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Tag::from_name)
        .collect())
}

impl ActionFactory for ExecRuleFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        self.trigger_tags.clone()
    }

    fn try_make_action(&self, _tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(ExecAction {
            executable: self.executable.clone(),
            source: artifact.clone_box(),
            bypass_dirs: self.bypass_dirs.clone(),
            shim_path: self.shim_path.clone(),
            child: None,
            call_read: None,
            return_write: None,
            frame: LineFrame,
            buf: Vec::new(),
        }))
    }
}

/// One running invocation of an exec-discovered rule.
struct ExecAction {
    executable: PathBuf,
    source: Box<dyn Artifact>,
    bypass_dirs: Vec<PathBuf>,
    shim_path: PathBuf,
    child: Option<Child>,
    call_read: Option<File>,
    return_write: Option<File>,
    frame: LineFrame,
    buf: Vec<u8>,
}

impl std::fmt::Debug for ExecAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecAction")
            .field("executable", &self.executable)
            .field("source", &self.source.canonical_name())
            .finish()
    }
}

/// A pipe's (read end, write end) as owned [`File`]s.
fn pipe() -> std::io::Result<(File, File)> {
    let mut fds = [0 as RawFd; 2];
    // Safety: `fds` is a valid 2-element buffer `pipe2` can write into.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Safety: both fds were just returned by a successful `pipe2` and are
    // not owned by anything else yet.
    Ok(unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) })
}

fn set_nonblocking(fd: RawFd) {
    // Safety: `fd` is open for the duration of this call.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

impl Action for ExecAction {
    fn verb(&self) -> &str {
        "run"
    }

    fn start(&mut self, ctx: &mut dyn ActionContext) {
        let result = (|| -> std::io::Result<()> {
            // call pipe: child writes requests (fd 3), engine reads them.
            let (call_read, call_write) = pipe()?;
            // return pipe: engine writes replies, child reads them (fd 4).
            let (return_read, return_write) = pipe()?;

            let child_call_fd = call_write.as_raw_fd();
            let child_return_fd = return_read.as_raw_fd();
            let bypass = self
                .bypass_dirs
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(":");

            let mut cmd = Command::new(&self.executable);
            cmd.env(BYPASS_ENV, bypass)
                .env("LD_PRELOAD", &self.shim_path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            if let Some(path) = self.source.as_disk_path() {
                cmd.arg(path);
            }
            // Safety: this closure runs in the forked child between fork
            // and exec, calling only async-signal-safe libc functions
            // (dup2) before handing control to exec.
            unsafe {
                cmd.pre_exec(move || {
                    if libc::dup2(child_call_fd, 3) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    if libc::dup2(child_return_fd, 4) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }

            let mut child = cmd.spawn()?;
            drop(call_write);
            drop(return_read);
            set_nonblocking(call_read.as_raw_fd());
            if let Some(stdout) = child.stdout.as_ref() {
                set_nonblocking(stdout.as_raw_fd());
            }
            if let Some(stderr) = child.stderr.as_ref() {
                set_nonblocking(stderr.as_raw_fd());
            }

            self.child = Some(child);
            self.call_read = Some(call_read);
            self.return_write = Some(return_write);
            Ok(())
        })();

        if let Err(err) = result {
            ctx.failed(&format!("failed to spawn rule {}: {err}", self.executable.display()));
        }
    }

    fn poll(&mut self, ctx: &mut dyn ActionContext) {
        self.service_requests(ctx);
        self.drain_child_output(ctx);

        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.service_requests(ctx);
                if status.success() {
                    ctx.done();
                } else {
                    ctx.failed(&format!("{} exited with {status}", self.executable.display()));
                }
            }
            Ok(None) => {}
            Err(err) => ctx.failed(&format!("failed waiting on {}: {err}", self.executable.display())),
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.call_read = None;
        self.return_write = None;
    }
}

impl ExecAction {
    fn service_requests(&mut self, ctx: &mut dyn ActionContext) {
        let Some(call_read) = self.call_read.as_mut() else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match call_read.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
        while let Ok(Some((req, consumed))) = self.frame.decode_request(&self.buf) {
            let resp = dispatch(ctx, &req);
            if let Some(writer) = self.return_write.as_mut() {
                let _ = writer.write_all(&self.frame.encode_response(&resp));
                let _ = writer.flush();
            }
            self.buf.drain(..consumed);
        }
    }

    fn drain_child_output(&mut self, ctx: &mut dyn ActionContext) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        for pipe in [child.stdout.as_mut().map(|s| s as &mut dyn Read), child.stderr.as_mut().map(|s| s as &mut dyn Read)]
            .into_iter()
            .flatten()
        {
            let mut buf = [0u8; 4096];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => ctx.log(&String::from_utf8_lossy(&buf[..n])),
                }
            }
        }
    }
}
