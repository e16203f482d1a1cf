//! Application state shared by the handlers.
//!
//! Each request builds its own [`Tracer`] from the shared [`TraceConfig`], so
//! a trace that never finishes ties up one blocking thread and nothing else.

use steptrace_trace::{TraceConfig, Tracer};

#[derive(Clone, Default)]
pub struct AppState {
    pub config: TraceConfig,
}

impl AppState {
    pub fn new(config: TraceConfig) -> Self {
        AppState { config }
    }

    /// A fresh tracer for one request.
    pub fn tracer(&self) -> Tracer {
        Tracer::new(self.config.clone())
    }
}
