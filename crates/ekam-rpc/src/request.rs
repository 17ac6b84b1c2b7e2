//! The five request shapes a rule-invocation child can send (§4.5).

use crate::error::RpcError;

/// One call-pipe request. Argument strings are already stripped of their
/// trailing newline by the time they reach here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `findProvider <tag>`
    FindProvider {
        /// The tag name to resolve.
        tag: String,
    },
    /// `findInput <path>`
    FindInput {
        /// Path relative to the driver's scratch directory.
        path: String,
    },
    /// `newProvider <tag>`
    NewProvider {
        /// The tag the allocated scratch path should carry.
        tag: String,
    },
    /// `newOutput <path>`
    NewOutput {
        /// The requested relative scratch path.
        path: String,
    },
    /// `noteInput <path>`
    NoteInput {
        /// An absolute path outside the project, recorded without rewriting.
        path: String,
    },
}

fn reject_newline(arg: &str) -> Result<(), RpcError> {
    if arg.contains('\n') {
        return Err(RpcError::Protocol(format!(
            "argument {arg:?} contains an embedded newline"
        )));
    }
    Ok(())
}

impl Request {
    /// The verb this request serializes under.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Request::FindProvider { .. } => "findProvider",
            Request::FindInput { .. } => "findInput",
            Request::NewProvider { .. } => "newProvider",
            Request::NewOutput { .. } => "newOutput",
            Request::NoteInput { .. } => "noteInput",
        }
    }

    /// The single argument carried by this request.
    #[must_use]
    pub fn arg(&self) -> &str {
        match self {
            Request::FindProvider { tag } | Request::NewProvider { tag } => tag,
            Request::FindInput { path } | Request::NewOutput { path } | Request::NoteInput { path } => path,
        }
    }

    /// Parse one line (without its trailing `\n`) into a request.
    pub fn parse(line: &str) -> Result<Request, RpcError> {
        let (verb, rest) = line.split_once(' ').ok_or_else(|| {
            RpcError::Protocol(format!("missing argument in request {line:?}"))
        })?;
        reject_newline(rest)?;
        let arg = rest.to_string();
        match verb {
            "findProvider" => Ok(Request::FindProvider { tag: arg }),
            "findInput" => Ok(Request::FindInput { path: arg }),
            "newProvider" => Ok(Request::NewProvider { tag: arg }),
            "newOutput" => Ok(Request::NewOutput { path: arg }),
            "noteInput" => Ok(Request::NoteInput { path: arg }),
            other => Err(RpcError::Protocol(format!("unknown request verb {other:?}"))),
        }
    }

    /// Render back to wire form, without a trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{} {}", self.verb(), self.arg())
    }
}
