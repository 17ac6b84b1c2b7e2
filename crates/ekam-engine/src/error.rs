//! Errors the engine facade itself can raise, as opposed to per-driver
//! rule failures (which stay confined to the driver, §7 "Propagation
//! policy").

use thiserror::Error;

/// Failures that abort the current build loop (§7: everything but a
/// user/rule error is fatal to the run in progress).
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O failure setting up project directories, scratch space, or an
    /// install link.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RPC channel to a rule-invocation child broke mid-build.
    #[error("rpc error: {0}")]
    Rpc(#[from] ekam_rpc::RpcError),
    /// A driver reported `passed()`/`done()` while the graph was left in
    /// an inconsistent state (§7 "Graph consistency error").
    #[error("graph consistency error: {0}")]
    GraphConsistency(String),
}

/// Convenience alias for engine-facade operations.
pub type Result<T> = std::result::Result<T, EngineError>;
