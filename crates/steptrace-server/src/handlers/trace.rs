//! Trace handler.

use axum::extract::State;
use axum::Json;
use steptrace_trace::{handle_json, Response};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Traces the request in the body.
///
/// `POST /trace`
///
/// The body is read as raw text so malformed JSON is reported in the
/// protocol's `{"error": ...}` shape instead of as an extractor rejection.
pub async fn trace(State(state): State<AppState>, body: String) -> Result<Json<Response>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("trace_request", %request_id);
    let mut tracer = state.tracer();

    let response = tokio::task::spawn_blocking(move || {
        let _enter = span.enter();
        let response = handle_json(&mut tracer, &body);
        tracing::info!(success = response.is_success(), "trace finished");
        response
    })
    .await?;

    Ok(Json(response))
}
