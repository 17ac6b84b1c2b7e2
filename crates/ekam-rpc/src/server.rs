//! Binds decoded [`Request`]s to a running driver's [`ActionContext`]
//! (§4.5), and drives one call/return pipe pair to fixpoint for a single
//! child (§5 "the child holds a lock across write+read so concurrent
//! threads interleave cleanly" — enforced by the caller serializing calls
//! into [`dispatch`] per child, never by this function itself).

use crate::error::RpcError;
use crate::frame::Frame;
use crate::request::Request;
use crate::response::Response;
use ekam_core::Tag;
use ekam_driver::ActionContext;
use std::io::{BufRead, Write};

/// Handle one decoded request against `ctx`, producing the reply to send
/// back on the return pipe.
pub fn dispatch(ctx: &mut dyn ActionContext, req: &Request) -> Response {
    match req {
        Request::FindProvider { tag } => path_or_empty(ctx.find_provider(Tag::from_name(tag))),
        Request::FindInput { path } => path_or_empty(ctx.find_input(path)),
        Request::NewProvider { tag } => match ctx.new_provider(Tag::from_name(tag)) {
            Ok(artifact) => Response::Path(artifact_path_string(artifact.as_ref())),
            Err(err) => {
                tracing::warn!(tag, error = %err, "newProvider failed");
                Response::Empty
            }
        },
        Request::NewOutput { path } => match ctx.new_output(path) {
            Ok(artifact) => Response::Path(artifact_path_string(artifact.as_ref())),
            Err(err) => {
                tracing::warn!(path, error = %err, "newOutput failed");
                Response::Empty
            }
        },
        Request::NoteInput { path } => {
            ctx.note_input(path);
            Response::Empty
        }
    }
}

fn path_or_empty(artifact: Option<Box<dyn ekam_fs::Artifact>>) -> Response {
    match artifact {
        Some(artifact) => Response::Path(artifact_path_string(artifact.as_ref())),
        None => Response::Empty,
    }
}

/// The path a reply should carry for `artifact`: its real disk path when it
/// has one (so the shim can hand it straight to the wrapped libc call),
/// falling back to the project-relative canonical name for artifacts with
/// no disk backing (e.g. an in-memory test fixture).
fn artifact_path_string(artifact: &dyn ekam_fs::Artifact) -> String {
    artifact
        .as_disk_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| artifact.canonical_name().to_string())
}

/// Read one request from `reader`, dispatch it against `ctx`, and write the
/// reply to `writer`. Returns `false` on a clean EOF (the child closed its
/// end of the call pipe); callers loop on `true` until that happens or an
/// error propagates (§7 "broken pipe to a child is fatal to the build").
pub fn serve_one<F: Frame>(
    frame: &F,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    ctx: &mut dyn ActionContext,
) -> Result<bool, RpcError> {
    let mut line = Vec::new();
    let read = read_line(reader, &mut line)?;
    if read == 0 {
        return Ok(false);
    }
    let Some((req, _consumed)) = frame.decode_request(&line)? else {
        return Err(RpcError::Protocol("request line missing terminator".to_string()));
    };
    let resp = dispatch(ctx, &req);
    writer.write_all(&frame.encode_response(&resp))?;
    writer.flush()?;
    Ok(true)
}

fn read_line(reader: &mut impl BufRead, out: &mut Vec<u8>) -> std::io::Result<usize> {
    let read = reader.read_until(b'\n', out)?;
    if read > 0 && !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    Ok(read)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::LineFrame;
    use ekam_driver::{ActionContextImpl, ActionDriver};
    use ekam_fs::{DiskArtifact, ProjectLayout};
    use ekam_graph::{DriverId, Graph};
    use std::io::Cursor;
    use std::sync::Arc;

    #[test]
    fn find_provider_replies_with_empty_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().to_path_buf());
        let scratch = layout.scratch_dir("1");
        scratch.ensure().unwrap();
        let source = DiskArtifact::new(Arc::new(dir.path().to_path_buf()), "a.cpp".to_string(), true);
        let mut driver = ActionDriver::new(DriverId::from_raw(1), "test".to_string(), Box::new(source), scratch);
        driver.start_running();
        let mut graph = Graph::new();
        let mut ctx = ActionContextImpl::new(&mut driver, &mut graph);

        let frame = LineFrame;
        let mut input = Cursor::new(b"findProvider header:missing.h\n".to_vec());
        let mut output = Vec::new();
        let more = serve_one(&frame, &mut input, &mut output, &mut ctx).unwrap();
        assert!(more);
        assert_eq!(output, b"\n");
    }

    #[test]
    fn eof_on_the_call_pipe_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().to_path_buf());
        let scratch = layout.scratch_dir("1");
        scratch.ensure().unwrap();
        let source = DiskArtifact::new(Arc::new(dir.path().to_path_buf()), "a.cpp".to_string(), true);
        let mut driver = ActionDriver::new(DriverId::from_raw(1), "test".to_string(), Box::new(source), scratch);
        driver.start_running();
        let mut graph = Graph::new();
        let mut ctx = ActionContextImpl::new(&mut driver, &mut graph);

        let frame = LineFrame;
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let more = serve_one(&frame, &mut input, &mut output, &mut ctx).unwrap();
        assert!(!more);
    }
}
