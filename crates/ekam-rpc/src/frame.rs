//! Wire framing, isolated behind a trait (§9 "RPC framing" design note): the
//! spec pins down a literal newline-terminated protocol, but call sites
//! never parse bytes directly, so a length-prefixed `Frame` impl (in the
//! style of `echo-session-proto::wire::Packet`) could replace [`LineFrame`]
//! without touching [`crate::server`] or the shim client.

use crate::error::RpcError;
use crate::request::Request;
use crate::response::Response;

/// Encodes/decodes requests and responses to/from a byte stream.
///
/// `decode_*` take whatever bytes have been read so far and return `Ok(None)`
/// if that prefix doesn't yet hold a complete frame, matching the
/// `Packet::decode(stream) -> (Message, usize)` "consumed so far" idiom.
pub trait Frame {
    /// Encode `req` as bytes ready to write to the call pipe.
    fn encode_request(&self, req: &Request) -> Vec<u8>;
    /// Decode one request from the front of `buf`. Returns the request and
    /// the number of bytes it consumed, or `None` if `buf` is incomplete.
    fn decode_request(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, RpcError>;
    /// Encode `resp` as bytes ready to write to the return pipe.
    fn encode_response(&self, resp: &Response) -> Vec<u8>;
    /// Decode one response from the front of `buf`.
    fn decode_response(&self, buf: &[u8]) -> Result<Option<(Response, usize)>, RpcError>;
}

/// The literal wire format from §4.5: each message is one line, terminated
/// by `\n`, the argument running to end of line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFrame;

fn find_line(buf: &[u8]) -> Option<(&str, usize)> {
    let newline_at = buf.iter().position(|&b| b == b'\n')?;
    let text = std::str::from_utf8(&buf[..newline_at]).ok()?;
    Some((text, newline_at + 1))
}

impl Frame for LineFrame {
    fn encode_request(&self, req: &Request) -> Vec<u8> {
        let mut out = req.render().into_bytes();
        out.push(b'\n');
        out
    }

    fn decode_request(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, RpcError> {
        let Some((line, consumed)) = find_line(buf) else {
            return Ok(None);
        };
        Ok(Some((Request::parse(line)?, consumed)))
    }

    fn encode_response(&self, resp: &Response) -> Vec<u8> {
        let mut out = resp.render().into_bytes();
        out.push(b'\n');
        out
    }

    fn decode_response(&self, buf: &[u8]) -> Result<Option<(Response, usize)>, RpcError> {
        let Some((line, consumed)) = find_line(buf) else {
            return Ok(None);
        };
        Ok(Some((Response::parse(line), consumed)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_the_wire() {
        let frame = LineFrame;
        let req = Request::FindProvider { tag: "header:x.h".to_string() };
        let bytes = frame.encode_request(&req);
        let (decoded, consumed) = frame.decode_request(&bytes).unwrap().unwrap();
        assert_eq!(decoded, req);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn incomplete_buffer_is_not_yet_a_frame() {
        let frame = LineFrame;
        assert!(frame.decode_request(b"findProvider header:x.h").unwrap().is_none());
    }

    #[test]
    fn response_round_trips_through_the_wire() {
        let frame = LineFrame;
        let resp = Response::Path("tmp/a.cpp/a.o".to_string());
        let bytes = frame.encode_response(&resp);
        let (decoded, consumed) = frame.decode_response(&bytes).unwrap().unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(consumed, bytes.len());
    }
}
