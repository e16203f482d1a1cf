//! Tracer configuration.
//!
//! Reads from environment variables:
//! - `STEPTRACE_MAX_CALL_DEPTH`: nested script call limit (default: 100)
//! - `STEPTRACE_SNAPSHOT_DEPTH`: container nesting copied per value (default: 256)

use steptrace_core::InterpreterConfig;

use crate::snapshot::DEFAULT_MAX_DEPTH;

pub const MAX_CALL_DEPTH_VAR: &str = "STEPTRACE_MAX_CALL_DEPTH";
pub const SNAPSHOT_DEPTH_VAR: &str = "STEPTRACE_SNAPSHOT_DEPTH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    pub max_call_depth: usize,
    pub snapshot_max_depth: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            max_call_depth: InterpreterConfig::default().max_call_depth,
            snapshot_max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl TraceConfig {
    /// Defaults overridden by any valid `STEPTRACE_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`TraceConfig::from_env`], reading variables through `lookup`.
    /// Unparseable or zero values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = TraceConfig::default();
        if let Some(depth) = parse_positive(&lookup, MAX_CALL_DEPTH_VAR) {
            config.max_call_depth = depth;
        }
        if let Some(depth) = parse_positive(&lookup, SNAPSHOT_DEPTH_VAR) {
            config.snapshot_max_depth = depth;
        }
        config
    }

    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            max_call_depth: self.max_call_depth,
        }
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<usize> {
    let raw = lookup(name)?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(variable = name, value = %raw, "ignoring invalid setting");
            None
        }
    }
}
