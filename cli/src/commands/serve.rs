//! Serve the proxy endpoints, the payment action and payment confirmation

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use colored::Colorize;
use nudge_engine::proxy::actions::{handle_action_get, handle_action_post, ACTION_PATH};
use nudge_engine::proxy::{ProxyReply, ProxyService, CONFIRM_PAYMENT_PATH};
use nudge_engine::rpc::proxy::{BALANCE_PATH, UNSHIELD_DATA_PATH};
use nudge_engine::{EngineConfig, LedgerConnections};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::payments::JsonlPaymentRecorder;

pub struct AppState {
    pub service: ProxyService,
    pub recorder: JsonlPaymentRecorder,
    pub host_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    pub id: Option<String>,
    pub amount: Option<String>,
}

pub fn into_response(reply: ProxyReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

async fn balance(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    into_response(state.service.handle_balance(&body).await)
}

async fn unshield_data(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    into_response(state.service.handle_unshield_data(&body).await)
}

async fn confirm_payment(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    into_response(
        state
            .service
            .handle_confirm_payment(&state.recorder, &body)
            .await,
    )
}

async fn action_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActionQuery>,
) -> Response {
    into_response(handle_action_get(&state.host_url, query.id.as_deref()))
}

async fn action_post(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActionQuery>,
    body: Bytes,
) -> Response {
    let reply = handle_action_post(
        state.service.connections(),
        query.id.as_deref(),
        query.amount.as_deref(),
        &body,
    )
    .await;
    into_response(reply)
}

async fn action_options() -> StatusCode {
    StatusCode::OK
}

/// Wallets look here to map page URLs onto action endpoints
async fn actions_json() -> Json<serde_json::Value> {
    Json(json!({
        "rules": [
            { "pathPattern": "/api/actions/**", "apiPath": "/api/actions/**" }
        ]
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(BALANCE_PATH, post(balance))
        .route(UNSHIELD_DATA_PATH, post(unshield_data))
        .route(CONFIRM_PAYMENT_PATH, post(confirm_payment))
        .route(
            ACTION_PATH,
            get(action_get).post(action_post).options(action_options),
        )
        .route("/actions.json", get(actions_json))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: EngineConfig, bind: &str, host_url: Option<&str>) -> Result<()> {
    let recorder_path =
        JsonlPaymentRecorder::default_path().context("Could not find home directory")?;
    let host_url = host_url
        .map(str::to_string)
        .unwrap_or_else(|| format!("http://{bind}"));

    let state = Arc::new(AppState {
        service: ProxyService::new(Arc::new(LedgerConnections::new(config))),
        recorder: JsonlPaymentRecorder::new(recorder_path),
        host_url,
    });

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    println!("{}", "Nudge server running".green().bold());
    println!("  Listening: {}", bind);
    println!("  Action:    {}{}", state.host_url, ACTION_PATH);
    println!("  Payments:  {}", state.recorder.path().display());
    info!(bind, "serving proxy endpoints");

    axum::serve(listener, router(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
