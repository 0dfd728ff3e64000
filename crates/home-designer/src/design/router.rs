use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::command::{Command, UserIntent};
use super::persistence::{DesignRepository, PersistenceError};
use super::rules::RuleEvaluator;
use super::service::{DesignServiceError, DesignSessionService, OpenSession, SessionId};

/// Router builder exposing the design session endpoints.
pub fn design_router<R, E>(service: Arc<DesignSessionService<R, E>>) -> Router
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    Router::new()
        .route("/api/v1/design/sessions", post(open_handler::<R, E>))
        .route(
            "/api/v1/design/sessions/:session_id",
            get(summary_handler::<R, E>),
        )
        .route(
            "/api/v1/design/sessions/:session_id/intents",
            post(intent_handler::<R, E>),
        )
        .route(
            "/api/v1/design/sessions/:session_id/filtered",
            get(filtered_handler::<R, E>),
        )
        .route(
            "/api/v1/design/sessions/:session_id/contracted",
            get(contracted_handler::<R, E>),
        )
        .route(
            "/api/v1/design/sessions/:session_id/price",
            get(price_handler::<R, E>),
        )
        .with_state(service)
}

pub(crate) fn error_response(error: DesignServiceError) -> Response {
    let status = match &error {
        DesignServiceError::SessionNotFound(_)
        | DesignServiceError::Persistence(PersistenceError::NotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        DesignServiceError::Persistence(PersistenceError::Timeout { .. }) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        DesignServiceError::Persistence(PersistenceError::Failed { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn open_handler<R, E>(
    State(service): State<Arc<DesignSessionService<R, E>>>,
    Json(request): Json<OpenSession>,
) -> Response
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    match service.open(request) {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn summary_handler<R, E>(
    State(service): State<Arc<DesignSessionService<R, E>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    match service.summary(&SessionId(session_id)) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn intent_handler<R, E>(
    State(service): State<Arc<DesignSessionService<R, E>>>,
    Path(session_id): Path<String>,
    Json(intent): Json<UserIntent>,
) -> Response
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    match service.dispatch(&SessionId(session_id), Command::from(intent)) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn filtered_handler<R, E>(
    State(service): State<Arc<DesignSessionService<R, E>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    match service.filtered_view(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, Json(view.as_ref().clone())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn contracted_handler<R, E>(
    State(service): State<Arc<DesignSessionService<R, E>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    match service.contracted_view(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, Json(view.as_ref().clone())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn price_handler<R, E>(
    State(service): State<Arc<DesignSessionService<R, E>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    match service.price_breakdown(&SessionId(session_id)) {
        Ok(breakdown) => (StatusCode::OK, Json(breakdown)).into_response(),
        Err(error) => error_response(error),
    }
}
