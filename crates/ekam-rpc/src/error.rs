//! `RpcError`: the two abort-the-build error kinds from the rule-invocation
//! RPC (§7 "RPC error", "Protocol error").

use thiserror::Error;

/// Failure talking to (or decoding requests from) a rule-invocation child.
#[derive(Debug, Error)]
pub enum RpcError {
    /// I/O failure reading or writing the call/return pipe.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed request: unknown verb, missing argument, or an argument
    /// containing an embedded newline.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The call pipe or return pipe was closed mid-build.
    #[error("rpc channel closed: {0}")]
    Closed(String),
}
