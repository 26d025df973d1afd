pub mod commands;
pub mod query;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use feed_core::CoreError;

// Map the core error taxonomy onto HTTP statuses. Domain-rule violations and
// authorization failures reach here unchanged from the aggregate; a 409 tells
// the client to reload and retry the whole command cycle.
pub(crate) fn error_response(err: CoreError) -> Response {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Concurrency { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
