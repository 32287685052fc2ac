//! Callable HTTP surface.
//!
//! Speaks the Firebase callable protocol for the one function this service
//! exposes: the request body is `{"data": …}`, a success is
//! `{"result": …}` and a failure is `{"error": {"status", "message"}}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CallableError, CallableResult};
use crate::exchange::{ExchangeRequest, ExchangeResponse, TokenExchange};

/// Path of the exchange function.
pub const CALLABLE_PATH: &str = "/createFirebaseToken";

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
}

/// Callable request envelope.
#[derive(Debug, Deserialize)]
pub struct CallableRequest {
    /// Function input; must be present, may be null
    pub data: serde_json::Value,
}

/// Callable success envelope.
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    /// Function output
    pub result: T,
}

/// Build the router.
pub fn router(exchange: Arc<TokenExchange>) -> Router {
    Router::new()
        .route("/health", get(|| async { "" }))
        .route(CALLABLE_PATH, post(handle_create_firebase_token))
        .with_state(exchange)
}

async fn handle_create_firebase_token(
    State(exchange): State<Arc<TokenExchange>>,
    payload: Result<Json<CallableRequest>, JsonRejection>,
) -> CallableResult<Json<CallableResponse<ExchangeResponse>>> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!("Rejected callable request: {}", rejection);
        CallableError::invalid_argument("Bad Request")
    })?;

    let request = if payload.data.is_null() {
        ExchangeRequest::default()
    } else {
        serde_json::from_value(payload.data).map_err(|e| {
            warn!("Rejected callable data: {}", e);
            CallableError::invalid_argument("Bad Request")
        })?
    };
    debug!("createFirebaseToken called");

    let result = exchange.verify_and_issue_token(request).await?;
    Ok(Json(CallableResponse { result }))
}

pub async fn run(exchange: Arc<TokenExchange>, config: ServerConfig) -> anyhow::Result<()> {
    let app = router(exchange);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("starting token exchange server on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
