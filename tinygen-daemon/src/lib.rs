//! Request boundary: newline-delimited JSON over a Unix socket.
//!
//! Each line is one [`DaemonRequest`]; each answer is one [`DaemonResponse`].
//! `generate` runs the blocking pipeline on tokio's blocking pool, so requests
//! are served concurrently and share nothing but the pipeline's injected parts.

mod error;
pub mod logging;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use logging::init_tracing;
pub use protocol::{
    request_generate, request_query, request_status, request_stop, send_request, DaemonRequest,
    DaemonResponse, Generated,
};
pub use runtime::{run, start_blocking};
