//! HTTP front-end for the step tracer.
//!
//! Serves the same request/response protocol as the `steptrace` CLI over
//! `POST /trace`, for browser-based callers. Trace failures are part of the
//! protocol and come back as `200` with an `error` body; only server-side
//! faults use error status codes.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
