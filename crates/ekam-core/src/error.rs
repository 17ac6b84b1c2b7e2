//! Shared error type for the engine crates.

use thiserror::Error;

/// Errors surfaced by core engine operations.
///
/// Follows `echo-app-core::config::ConfigError`'s shape: a small closed set
/// of variants, each with a `#[from]` conversion where the underlying error
/// is a standard one. `Protocol` and `GraphConsistency` correspond to the
/// two abort-the-build error kinds in the spec's error-handling design;
/// everything else is confined to the action that raised it.
#[derive(Debug, Error)]
pub enum EkamError {
    /// I/O failure touching an artifact or a pipe.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed RPC request: overlong path, embedded newline, unknown verb.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A driver invariant was violated (e.g. `passed()` while holding
    /// unresolved providers, or `failed()` after `passed()`).
    #[error("graph consistency error: {0}")]
    GraphConsistency(String),
    /// The broken-pipe case: RPC channel to a child died mid-build.
    #[error("rpc channel closed: {0}")]
    RpcClosed(String),
}

/// Convenience alias used throughout the engine crates.
pub type Result<T> = std::result::Result<T, EkamError>;
