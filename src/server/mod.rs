//! HTTP endpoint that dispatches card actions.
//!
//! `POST /api/card-action` takes an action payload and answers with the
//! dispatcher's result. `GET /api/health` is a liveness probe.

use std::any::Any;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

use crate::actions::{ActionDispatcher, ActionError, ActionPayload};

pub const CARD_ACTION_ROUTE: &str = "/api/card-action";
pub const HEALTH_ROUTE: &str = "/api/health";

const INTERNAL_ERROR_MESSAGE: &str = "Failed to process card action";

#[derive(Clone, Copy, Default)]
pub struct ServerState {
    dispatcher: ActionDispatcher,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

fn error_response(status: StatusCode, message: &str, field: Option<&str>) -> Response {
    let body = ErrorBody {
        error: message,
        field,
    };
    (status, Json(body)).into_response()
}

fn rejected(err: &ActionError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    error_response(status, &err.to_string(), err.field())
}

pub(crate) fn internal_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE, None)
}

pub(crate) async fn card_action(
    State(state): State<ServerState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let value = match body {
        Ok(Json(value)) => value,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "unreadable card action body");
            return error_response(rejection.status(), &rejection.body_text(), None);
        }
    };

    let Some(payload) = ActionPayload::from_value(value) else {
        return rejected(&ActionError::InvalidPayload(
            "expected a JSON object".to_string(),
        ));
    };

    let result = match state.dispatcher.dispatch(&payload) {
        Ok(result) => result,
        Err(err) => {
            info!(action = ?payload.action(), error = %err, "card action rejected");
            return rejected(&err);
        }
    };
    info!(action = ?payload.action(), "card action dispatched");

    match serde_json::to_value(&result) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            error!(error = %err, "failed to serialize action result");
            internal_error()
        }
    }
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "card action handler panicked");
    internal_error()
}

/// Builds the application. With `allow_framing`, every response (errors
/// included) tells browsers the endpoint may be embedded in any frame.
pub fn router(state: ServerState, allow_framing: bool) -> Router {
    let mut app = Router::new()
        .route(CARD_ACTION_ROUTE, post(card_action))
        .route(HEALTH_ROUTE, get(health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response));

    if allow_framing {
        app = app
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("frame-ancestors *"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("ALLOWALL"),
            ));
    }
    app
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, allow_framing: bool) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, allow_framing, "card action endpoint listening");
    axum::serve(listener, router(ServerState::default(), allow_framing))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("shutting down card action endpoint");
}

#[cfg(test)]
mod tests;
