//! The request/response protocol shared by the CLI and the HTTP server.
//!
//! A request names some code, a function in it and one JSON argument; the
//! response is either the trace or a single error string. Failures are
//! data: [`handle_json`] always produces a [`Response`].

use serde::{Deserialize, Serialize};
use steptrace_core::{compile_with, Value};

use crate::error::BoundaryError;
use crate::snapshot::Snapshot;
use crate::trace::{Step, TraceResult};
use crate::tracer::Tracer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub code: String,
    #[serde(rename = "functionName")]
    pub function_name: String,
    #[serde(rename = "parameterValue")]
    pub parameter_value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success { result: Snapshot, steps: Vec<Step> },
    Failure { error: String },
}

impl Response {
    pub fn failure(err: &BoundaryError) -> Self {
        Response::Failure {
            error: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

impl From<TraceResult> for Response {
    fn from(result: TraceResult) -> Self {
        let (result, steps, _) = result.into_parts();
        Response::Success { result, steps }
    }
}

/// Validates, compiles and traces one request.
pub fn execute(tracer: &mut Tracer, request: &Request) -> Result<TraceResult, BoundaryError> {
    if request.function_name.trim().is_empty() {
        return Err(BoundaryError::Validation(
            "function name is required".to_string(),
        ));
    }
    let namespace = compile_with(&request.code, tracer.config().interpreter_config())?;
    let callable = namespace.callable(&request.function_name)?;
    let argument = Value::from_json(&request.parameter_value);
    let result = tracer.run(&namespace, &callable, argument)?;
    if !result.output().is_empty() {
        tracing::debug!(lines = result.output().len(), "traced code printed output");
    }
    Ok(result)
}

pub fn handle(tracer: &mut Tracer, request: &Request) -> Response {
    match execute(tracer, request) {
        Ok(result) => result.into(),
        Err(err) => {
            tracing::debug!(error = %err, "request failed");
            Response::failure(&err)
        }
    }
}

/// Parses `input` as a [`Request`] and handles it.
pub fn handle_json(tracer: &mut Tracer, input: &str) -> Response {
    match serde_json::from_str::<Request>(input) {
        Ok(request) => handle(tracer, &request),
        Err(err) => {
            let err = BoundaryError::from(err);
            tracing::debug!(error = %err, "rejected request");
            Response::failure(&err)
        }
    }
}
