// SPDX-License-Identifier: Apache-2.0
//! The rule-invocation RPC (§4.5): request/response types, the line-oriented
//! wire codec (isolated behind the [`Frame`] trait), and the engine-side
//! server that dispatches decoded requests against a running driver's
//! [`ekam_driver::ActionContext`].

mod error;
mod frame;
mod request;
mod response;
mod server;

pub use error::RpcError;
pub use frame::{Frame, LineFrame};
pub use request::Request;
pub use response::Response;
pub use server::{dispatch, serve_one};
