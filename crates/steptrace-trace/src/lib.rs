//! Line-by-line execution tracing for submitted script functions.
//!
//! Given code text, a function name and one argument, this crate runs the
//! function under a line hook and returns every executed line together with
//! a snapshot of the local variables at that point, plus the return value.
//! [`protocol`] wraps that in the JSON request/response shape used by the
//! `steptrace` CLI and the HTTP server.

pub mod config;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod snapshot;
pub mod source_map;
pub mod trace;
pub mod tracer;

pub use config::TraceConfig;
pub use error::BoundaryError;
pub use protocol::{handle, handle_json, Request, Response};
pub use recorder::StepRecorder;
pub use snapshot::{Snapshot, SnapshotError, Snapshotter};
pub use source_map::{FunctionSource, SourceMap};
pub use trace::{Step, Trace, TraceResult};
pub use tracer::{TraceState, Tracer};
