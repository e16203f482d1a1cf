//! HTTP handler modules.
//!
//! Handlers are thin: they move the request onto the blocking pool, hand it
//! to the tracer, and return the protocol response as JSON.

pub mod health;
pub mod trace;
