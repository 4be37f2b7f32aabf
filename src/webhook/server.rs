use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use super::debounce::Debouncer;
use super::signal::{SignalGate, TradeSignal};

/// Shared state behind the routes
#[derive(Clone)]
pub struct AppState {
    pub gate: SignalGate,
    pub debouncer: Arc<Debouncer>,
}

impl AppState {
    pub fn new(gate: SignalGate, debouncer: Debouncer) -> Self {
        Self {
            gate,
            debouncer: Arc::new(debouncer),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/hook/:id", post(hook_handler))
        .with_state(state)
}

/// Serve until ctrl-c
pub async fn serve(port: u16, state: AppState) -> std::io::Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening for signals on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
}

async fn health_handler() -> &'static str {
    "Running."
}

async fn hook_handler(
    State(state): State<AppState>,
    Path(hook_id): Path<String>,
    Json(signal): Json<TradeSignal>,
) -> (StatusCode, String) {
    if let Err(rejection) = state.gate.check(&signal) {
        tracing::warn!(%hook_id, "Rejected signal: {}", rejection);
        return (StatusCode::BAD_REQUEST, rejection.to_string());
    }

    tracing::info!(
        %hook_id,
        instrument = %signal.instrument,
        side = %signal.side,
        entry = ?signal.entry,
        "Signal received"
    );
    state.debouncer.submit(signal);

    (StatusCode::OK, "Despatched".to_string())
}
