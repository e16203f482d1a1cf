//! Binary entrypoint for the step tracer HTTP server.
//!
//! Reads configuration from environment variables:
//! - `STEPTRACE_PORT`: Server listen port (default: "3000")
//! - `STEPTRACE_LOG`: log filter (default: "warn")
//! - `STEPTRACE_MAX_CALL_DEPTH`, `STEPTRACE_SNAPSHOT_DEPTH`: see `TraceConfig`

use steptrace_server::router::build_router;
use steptrace_server::state::AppState;
use steptrace_trace::TraceConfig;
use tracing_subscriber::EnvFilter;

/// Stack size for runtime threads; script calls recurse on the native stack.
const THREAD_STACK_SIZE: usize = 16 * 1024 * 1024;

fn main() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_env("STEPTRACE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(THREAD_STACK_SIZE)
        .build()?;
    runtime.block_on(serve())
}

async fn serve() -> std::io::Result<()> {
    let port = std::env::var("STEPTRACE_PORT").unwrap_or_else(|_| "3000".to_string());
    let state = AppState::new(TraceConfig::from_env());
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("steptrace server listening on {}", addr);
    axum::serve(listener, app).await
}
